//! Shared per-task coordination state.

use crate::TaskId;
use crate::failure::TaskFailure;
use crate::value::Value;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

type NoHashMap<K, V> = hashbrown::HashMap<K, V, nohash_hasher::BuildNoHashHasher<K>>;

/// A boolean lifecycle slot in a [`SharedState`] record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateFlag {
    /// The executor's `start` was invoked.
    Start,
    /// The worker entered the wrapper body.
    Run,
    /// The executor's `join` was invoked.
    Join,
    /// The wrapper exited, for any reason.
    Finish,
    /// The wrapper exited without a failure.
    Complete,
    /// Graceful termination was requested.
    Terminate,
    /// Forceful termination was requested.
    Kill,
    /// The executor's resources were released.
    Close,
}

/// Coordination record for a single task, shared between the coordinator and
/// the worker executing the task.
///
/// Every slot is written by exactly one worker (that task's) and read by the
/// coordinator and by parameter binding for downstream consumers, so a lock
/// per value slot and an atomic per flag provide the required atomicity.
/// This record is the in-process realization of a cross-process capability:
/// callers may only rely on individual slot writes being atomic and
/// eventually visible, never on the backing technology.
#[derive(Debug, Default)]
pub struct SharedState {
    execution_time: Mutex<Option<SystemTime>>,
    elapsed_time: Mutex<Option<Duration>>,
    return_value: Mutex<Option<Value>>,
    failure: Mutex<Option<TaskFailure>>,
    start: AtomicBool,
    run: AtomicBool,
    join: AtomicBool,
    finish: AtomicBool,
    complete: AtomicBool,
    terminate: AtomicBool,
    kill: AtomicBool,
    close: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_flag(&self, flag: StateFlag) {
        self.flag(flag).store(true, Ordering::Release);
    }

    pub fn flag_is_set(&self, flag: StateFlag) -> bool {
        self.flag(flag).load(Ordering::Acquire)
    }

    /// Whether the executor has been started.
    pub fn has_started(&self) -> bool {
        self.flag_is_set(StateFlag::Start)
    }

    /// Whether the task is terminal.
    pub fn has_finished(&self) -> bool {
        self.flag_is_set(StateFlag::Finish)
    }

    /// Whether the task finished without a failure.
    ///
    /// The `complete` slot is written before `finish`, so once `finish` is
    /// observed this answer is final.
    pub fn is_complete(&self) -> bool {
        self.flag_is_set(StateFlag::Complete)
    }

    pub fn set_execution_time(&self, time: SystemTime) {
        *self.execution_time.lock() = Some(time);
    }

    pub fn execution_time(&self) -> Option<SystemTime> {
        *self.execution_time.lock()
    }

    pub fn set_elapsed_time(&self, elapsed: Duration) {
        *self.elapsed_time.lock() = Some(elapsed);
    }

    pub fn elapsed_time(&self) -> Option<Duration> {
        *self.elapsed_time.lock()
    }

    pub fn set_return_value(&self, value: Value) {
        *self.return_value.lock() = Some(value);
    }

    pub fn return_value(&self) -> Option<Value> {
        self.return_value.lock().clone()
    }

    pub fn set_failure(&self, failure: TaskFailure) {
        *self.failure.lock() = Some(failure);
    }

    pub fn failure(&self) -> Option<TaskFailure> {
        self.failure.lock().clone()
    }

    fn flag(&self, flag: StateFlag) -> &AtomicBool {
        match flag {
            StateFlag::Start => &self.start,
            StateFlag::Run => &self.run,
            StateFlag::Join => &self.join,
            StateFlag::Finish => &self.finish,
            StateFlag::Complete => &self.complete,
            StateFlag::Terminate => &self.terminate,
            StateFlag::Kill => &self.kill,
            StateFlag::Close => &self.close,
        }
    }
}

/// Wakes the coordinator when any task's state record advances.
///
/// The version counter makes waits race-free: a waiter that snapshots the
/// version before scanning cannot miss an update that happens during the
/// scan, since the wait returns immediately once the version has moved.
#[derive(Debug, Default)]
pub struct StateNotifier {
    version: Mutex<u64>,
    updated: Condvar,
}

impl StateNotifier {
    pub fn current_version(&self) -> u64 {
        *self.version.lock()
    }

    /// Records a state update and wakes all waiting threads.
    pub fn notify(&self) {
        let mut version = self.version.lock();
        *version += 1;
        // Notify while holding the lock so a waiter cannot check the version
        // and miss the wake-up in between.
        self.updated.notify_all();
    }

    /// Blocks until the version moves past `seen` or the timeout expires,
    /// returning the version at wake-up.
    pub fn wait_past(&self, seen: u64, timeout: Duration) -> u64 {
        let mut version = self.version.lock();
        if *version == seen {
            self.updated.wait_for(&mut version, timeout);
        }
        *version
    }
}

/// Owns the [`SharedState`] records for one scheduler run, keyed by task ID.
///
/// This is the manager behind the shared mapping: the coordinator allocates
/// a record per task, workers and binding code look records up, and the
/// coordinator reclaims each record once its content has been harvested.
#[derive(Debug, Default)]
pub struct SharedStateRegistry {
    states: Mutex<NoHashMap<TaskId, Arc<SharedState>>>,
    notifier: Arc<StateNotifier>,
}

impl SharedStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh record for the given task.
    pub fn allocate(&self, task: TaskId) -> Arc<SharedState> {
        let state = Arc::new(SharedState::new());
        self.states.lock().insert(task, Arc::clone(&state));
        state
    }

    pub fn get(&self, task: TaskId) -> Option<Arc<SharedState>> {
        self.states.lock().get(&task).cloned()
    }

    /// Releases the record for the given task.
    pub fn reclaim(&self, task: TaskId) {
        self.states.lock().remove(&task);
    }

    pub fn notifier(&self) -> Arc<StateNotifier> {
        Arc::clone(&self.notifier)
    }

    /// Drops every remaining record.
    pub fn shutdown(&self) {
        self.states.lock().clear();
    }
}
