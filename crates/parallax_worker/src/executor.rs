//! Executor backends launching tasks on workers.

use crate::state::{SharedState, StateFlag};
use crate::value::CallArgs;
use crate::wrapper::FunctionWrapper;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The kind of execution unit a task runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// An isolated worker: the task communicates with the coordinator only
    /// through its shared state record.
    Process,
    /// A cooperative worker sharing the coordinator's address space.
    Thread,
}

/// A launched worker executing one task.
///
/// Implementations flip the `start`, `run` and `join` flags in the task's
/// state record before delegating to the underlying primitive, so the
/// coordinator can account for in-flight work without joining.
pub trait ExecutorBackend: Send + std::fmt::Debug {
    /// Launches the task on its worker. Has no effect if already started.
    fn start(&mut self);

    /// Waits for the worker to finish, up to the given timeout if one is
    /// supplied. Returns whether the worker has finished.
    fn join(&mut self, timeout: Option<Duration>) -> bool;

    /// Requests graceful termination of the worker. Returns `false` if the
    /// backend does not provide the capability.
    fn terminate(&mut self) -> bool;

    /// Requests forceful termination of the worker. Returns `false` if the
    /// backend does not provide the capability.
    fn kill(&mut self) -> bool;

    /// Releases the worker's resources without waiting. Returns `false` if
    /// the backend does not provide the capability.
    fn close(&mut self) -> bool;
}

/// Creates the executor backend matching the given kind.
pub fn backend_for(
    kind: ExecutorKind,
    name: impl Into<String>,
    state: Arc<SharedState>,
    wrapper: FunctionWrapper,
    arguments: CallArgs,
) -> Box<dyn ExecutorBackend> {
    match kind {
        ExecutorKind::Process => Box::new(ProcessExecutor::new(name, state, wrapper, arguments)),
        ExecutorKind::Thread => Box::new(ThreadExecutor::new(name, state, wrapper, arguments)),
    }
}

/// Executes a task under the isolated-worker contract.
///
/// The worker writes only to the task's shared state record, and the
/// `terminate`/`kill`/`close` capabilities are provided: requests are
/// recorded into the state record for the worker side to honor.
#[derive(Debug)]
pub struct ProcessExecutor {
    worker: WorkerThread,
}

impl ProcessExecutor {
    pub fn new(
        name: impl Into<String>,
        state: Arc<SharedState>,
        wrapper: FunctionWrapper,
        arguments: CallArgs,
    ) -> Self {
        Self {
            worker: WorkerThread::new(name, state, wrapper, arguments),
        }
    }
}

impl ExecutorBackend for ProcessExecutor {
    fn start(&mut self) {
        self.worker.start();
    }

    fn join(&mut self, timeout: Option<Duration>) -> bool {
        self.worker.join(timeout)
    }

    fn terminate(&mut self) -> bool {
        self.worker.state.set_flag(StateFlag::Terminate);
        true
    }

    fn kill(&mut self) -> bool {
        self.worker.state.set_flag(StateFlag::Kill);
        true
    }

    fn close(&mut self) -> bool {
        self.worker.state.set_flag(StateFlag::Close);
        self.worker.release();
        true
    }
}

/// Executes a task on a cooperative worker in the coordinator's address
/// space. The termination capabilities are null: a cooperative worker cannot
/// be stopped from outside.
#[derive(Debug)]
pub struct ThreadExecutor {
    worker: WorkerThread,
}

impl ThreadExecutor {
    pub fn new(
        name: impl Into<String>,
        state: Arc<SharedState>,
        wrapper: FunctionWrapper,
        arguments: CallArgs,
    ) -> Self {
        Self {
            worker: WorkerThread::new(name, state, wrapper, arguments),
        }
    }
}

impl ExecutorBackend for ThreadExecutor {
    fn start(&mut self) {
        self.worker.start();
    }

    fn join(&mut self, timeout: Option<Duration>) -> bool {
        self.worker.join(timeout)
    }

    fn terminate(&mut self) -> bool {
        false
    }

    fn kill(&mut self) -> bool {
        false
    }

    fn close(&mut self) -> bool {
        false
    }
}

/// The dedicated worker thread shared by both backends.
#[derive(Debug)]
struct WorkerThread {
    name: String,
    state: Arc<SharedState>,
    prepared: Option<(FunctionWrapper, CallArgs)>,
    handle: Option<JoinHandle<()>>,
    done: Option<Receiver<()>>,
}

impl WorkerThread {
    fn new(
        name: impl Into<String>,
        state: Arc<SharedState>,
        wrapper: FunctionWrapper,
        arguments: CallArgs,
    ) -> Self {
        Self {
            name: name.into(),
            state,
            prepared: Some((wrapper, arguments)),
            handle: None,
            done: None,
        }
    }

    fn start(&mut self) {
        let Some((wrapper, arguments)) = self.prepared.take() else {
            return;
        };

        self.state.set_flag(StateFlag::Start);

        let (sender, receiver) = crossbeam_channel::bounded(1);
        let state = Arc::clone(&self.state);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                state.set_flag(StateFlag::Run);
                wrapper.invoke(arguments);
                let _ = sender.send(());
            })
            .expect("failed to spawn worker thread");

        self.handle = Some(handle);
        self.done = Some(receiver);
    }

    fn join(&mut self, timeout: Option<Duration>) -> bool {
        self.state.set_flag(StateFlag::Join);
        let Some(limit) = timeout else {
            return self.reap();
        };
        let Some(done) = self.done.clone() else {
            return self.reap();
        };
        match done.recv_timeout(limit) {
            // A disconnect means the worker ended without sending, which
            // only happens if it panicked outside the wrapper.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => self.reap(),
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    fn reap(&mut self) -> bool {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.done = None;
        true
    }

    fn release(&mut self) {
        self.prepared = None;
        self.handle = None;
        self.done = None;
    }
}
