//! Worker-side machinery for the Parallax scheduler: the dynamic values
//! exchanged between tasks, per-task failure records, the shared state
//! records workers report through, the executor backends that launch tasks,
//! and the wrapper adapting user callables to the scheduler.

pub mod executor;
pub mod failure;
pub mod ident;
pub mod state;
pub mod value;
pub mod wrapper;

pub use executor::{ExecutorBackend, ExecutorKind, ProcessExecutor, ThreadExecutor};
pub use failure::{DependencyError, ResourceError, TaskFailure, WorkerError};
pub use ident::TaskId;
pub use state::{SharedState, SharedStateRegistry, StateFlag, StateNotifier};
pub use value::{CallArgs, NativeFn, Value, native_fn};
pub use wrapper::FunctionWrapper;

/// The error type produced by user task targets.
pub type TaskError = anyhow::Error;
