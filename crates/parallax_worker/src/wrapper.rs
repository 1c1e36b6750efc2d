//! Adaptation of user callables to the scheduler.

use crate::failure::TaskFailure;
use crate::state::{SharedState, StateFlag, StateNotifier};
use crate::value::{CallArgs, NativeFn};
use parallax_log::{Level, LogSink, format_duration};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// Adapts a user callable to the scheduler: records timing, captures raised
/// errors and panics, reports cancellations, and emits one log line per
/// terminal event.
///
/// Constructing the wrapper initializes the task's state record; the task
/// then either runs to termination through [`invoke`](Self::invoke) or is
/// cancelled without running through [`cancel`](Self::cancel).
pub struct FunctionWrapper {
    name: String,
    target: NativeFn,
    state: Arc<SharedState>,
    notifier: Arc<StateNotifier>,
    sink: Arc<dyn LogSink>,
}

impl FunctionWrapper {
    pub fn new(
        name: impl Into<String>,
        target: NativeFn,
        state: Arc<SharedState>,
        notifier: Arc<StateNotifier>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        state.set_execution_time(SystemTime::now());
        Self {
            name: name.into(),
            target,
            state,
            notifier,
            sink,
        }
    }

    /// Records the given cancellation and marks the task terminal. The
    /// target is never invoked, so downstream consumers observe the task as
    /// terminated-and-failed.
    pub fn cancel(self, failure: TaskFailure) {
        self.sink.log(
            Level::Warn,
            &format!("Task '{}' is being canceled, due to {failure}", self.name),
        );
        self.state.set_failure(failure);
        self.state.set_flag(StateFlag::Finish);
        self.notifier.notify();
    }

    /// Invokes the target with the given arguments and records the outcome.
    ///
    /// All exit paths set `elapsed_time` and `finish`; `complete` is set
    /// before `finish` on the success path so that an observed `finish`
    /// implies the final `complete` answer.
    pub fn invoke(self, arguments: CallArgs) {
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.target)(arguments)));
        let elapsed = start.elapsed();
        self.state.set_elapsed_time(elapsed);

        match outcome {
            Ok(Ok(value)) => {
                self.sink.log(
                    Level::Info,
                    &format!(
                        "Task '{}' ran approximately {}",
                        self.name,
                        format_duration(elapsed)
                    ),
                );
                self.state.set_return_value(value);
                self.state.set_flag(StateFlag::Complete);
            }
            Ok(Err(error)) => {
                self.sink.log(
                    Level::Error,
                    &format!(
                        "Task '{}' failed after {}: {error:#}",
                        self.name,
                        format_duration(elapsed)
                    ),
                );
                self.state.set_failure(TaskFailure::raised(
                    format!("{error:#}"),
                    Some(format!("{error:?}")),
                ));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.sink.log(
                    Level::Error,
                    &format!(
                        "Task '{}' panicked after {}: {message}",
                        self.name,
                        format_duration(elapsed)
                    ),
                );
                self.state.set_failure(TaskFailure::raised(message, None));
            }
        }

        self.state.set_flag(StateFlag::Finish);
        self.notifier.notify();
    }
}

impl fmt::Debug for FunctionWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionWrapper")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, native_fn};
    use anyhow::anyhow;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub messages: Mutex<Vec<(Level, String)>>,
    }

    impl LogSink for RecordingSink {
        fn log(&self, level: Level, message: &str) {
            self.messages.lock().push((level, message.to_string()));
        }
    }

    fn wrapper(
        target: NativeFn,
    ) -> (FunctionWrapper, Arc<SharedState>, Arc<RecordingSink>) {
        let state = Arc::new(SharedState::new());
        let sink = Arc::new(RecordingSink::default());
        let wrapper = FunctionWrapper::new(
            "fixture",
            target,
            Arc::clone(&state),
            Arc::new(StateNotifier::default()),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        );
        (wrapper, state, sink)
    }

    #[test]
    fn construction_initializes_the_state_record() {
        let (_wrapper, state, _sink) = wrapper(native_fn(|_| Ok(Value::Unit)));
        assert!(state.execution_time().is_some());
        assert!(!state.has_finished());
        assert!(!state.is_complete());
    }

    #[test]
    fn successful_invocation_stores_the_return_value() {
        let (wrapper, state, sink) = wrapper(native_fn(|_| Ok(Value::Int(3))));
        wrapper.invoke(CallArgs::default());

        assert!(state.has_finished());
        assert!(state.is_complete());
        assert_eq!(state.return_value(), Some(Value::Int(3)));
        assert!(state.elapsed_time().is_some());
        assert!(state.failure().is_none());

        let messages = sink.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, Level::Info);
    }

    #[test]
    fn raised_errors_are_captured_without_completing() {
        let (wrapper, state, sink) = wrapper(native_fn(|_| Err(anyhow!("boom"))));
        wrapper.invoke(CallArgs::default());

        assert!(state.has_finished());
        assert!(!state.is_complete());
        assert!(state.elapsed_time().is_some());
        match state.failure() {
            Some(TaskFailure::Raised { message, trace }) => {
                assert_eq!(message, "boom");
                assert!(trace.is_some());
            }
            other => panic!("unexpected failure record: {other:?}"),
        }
        assert_eq!(sink.messages.lock()[0].0, Level::Error);
    }

    #[test]
    fn panics_are_captured_as_raised_failures() {
        let (wrapper, state, _sink) = wrapper(native_fn(|_| panic!("sudden")));
        wrapper.invoke(CallArgs::default());

        assert!(state.has_finished());
        assert!(!state.is_complete());
        match state.failure() {
            Some(TaskFailure::Raised { message, .. }) => assert_eq!(message, "sudden"),
            other => panic!("unexpected failure record: {other:?}"),
        }
    }

    #[test]
    fn cancellation_records_the_blocker_and_warns() {
        let (wrapper, state, sink) = wrapper(native_fn(|_| Ok(Value::Unit)));
        wrapper.cancel(TaskFailure::Dependency(crate::failure::DependencyError::new(
            ["upstream"],
        )));

        assert!(state.has_finished());
        assert!(!state.is_complete());
        assert!(state.elapsed_time().is_none());
        assert!(matches!(state.failure(), Some(TaskFailure::Dependency(_))));

        let messages = sink.messages.lock();
        assert_eq!(messages[0].0, Level::Warn);
        assert!(messages[0].1.contains("'upstream'"));
    }
}
