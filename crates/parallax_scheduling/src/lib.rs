//! Dependency-aware task scheduling.
//!
//! A submission is a set of immutable [`ScheduledTask`] specifications with
//! priorities, prerequisite edges, and declared worker and resource demands.
//! The scheduler executes the submission on parallel workers, honoring the
//! dependency graph and the global budgets, wiring return values between
//! tasks through [`ReturnProxy`] arguments, and collecting timings, return
//! values and failures into a [`SchedulerResult`].
//!
//! # Examples
//! ```
//! use parallax_scheduling::{
//!     ExecutorKind, SchedulerOptions, Value, native_fn, scheduled_task, task_scheduler,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let producer = scheduled_task(
//!     ExecutorKind::Thread,
//!     "producer",
//!     native_fn(|_| Ok(Value::Int(21))),
//! )
//! .build()?;
//!
//! let doubler = scheduled_task(
//!     ExecutorKind::Thread,
//!     "doubler",
//!     native_fn(|call| {
//!         let value = call.arg(0)?.as_int().unwrap_or(0);
//!         Ok(Value::Int(value * 2))
//!     }),
//! )
//! // Consuming the producer's return value makes it a prerequisite.
//! .args([producer.return_value()])
//! .continual(true)
//! .build()?;
//!
//! let result = task_scheduler([producer, doubler], SchedulerOptions::default())?;
//! assert_eq!(result.return_value["doubler"], Value::Int(42));
//! # Ok(())
//! # }
//! ```

mod binder;
mod collections;
pub mod error;
mod graph;
mod ledger;
mod memory;
pub mod proxy;
pub mod result;
mod scheduler;
pub mod task;

pub use collections::IndexMap;
pub use error::{SchedulerError, ValidationError};
pub use proxy::{ReturnProxy, Transform};
pub use result::SchedulerResult;
pub use task::{Param, ScheduledTask, TaskBuilder, scheduled_task};

pub use parallax_log::{FacadeSink, Level, LogSink, format_duration};
pub use parallax_worker::{
    CallArgs, DependencyError, ExecutorKind, NativeFn, ResourceError, TaskError, TaskFailure,
    TaskId, Value, WorkerError, native_fn,
};

use crate::graph::DependencyGraph;
use crate::ledger::{ResourceLedger, ResourceUsage, WorkerLedger};
use crate::scheduler::TaskScheduler;
use collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Configuration for one scheduler run.
#[derive(Clone)]
pub struct SchedulerOptions {
    /// Global process budget; defaults to the number of logical CPUs.
    pub processes: Option<usize>,
    /// Global thread budget; defaults to the number of logical CPUs.
    pub threads: Option<usize>,
    /// Maximum combined system processor usage, as a percentage.
    pub system_processor: f64,
    /// Maximum combined system memory usage, as a percentage.
    pub system_memory: f64,
    /// Maximum combined graphics processor usage, as a percentage.
    pub graphics_processor: f64,
    /// Maximum combined graphics memory usage, as a percentage.
    pub graphics_memory: f64,
    /// Sink receiving the per-task lifecycle log lines; defaults to the
    /// [`log`] facade.
    pub logger: Option<Arc<dyn LogSink>>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            processes: None,
            threads: None,
            system_processor: 100.0,
            system_memory: 100.0,
            graphics_processor: 100.0,
            graphics_memory: 100.0,
            logger: None,
        }
    }
}

impl fmt::Debug for SchedulerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerOptions")
            .field("processes", &self.processes)
            .field("threads", &self.threads)
            .field("system_processor", &self.system_processor)
            .field("system_memory", &self.system_memory)
            .field("graphics_processor", &self.graphics_processor)
            .field("graphics_memory", &self.graphics_memory)
            .finish_non_exhaustive()
    }
}

/// Executes the given tasks concurrently and collects their outcomes.
///
/// The submission is validated up front: task names must be unique, every
/// prerequisite must be part of the submission, the prerequisite relation
/// must be acyclic, and the option quotas must be percentages. Validation
/// failures are returned synchronously, before any task runs; failures of
/// individual tasks during the run never unwind the scheduler and are
/// reported through the result record instead.
pub fn task_scheduler(
    tasks: impl IntoIterator<Item = ScheduledTask>,
    options: SchedulerOptions,
) -> Result<SchedulerResult, SchedulerError> {
    let tasks: Vec<ScheduledTask> = tasks.into_iter().collect();

    {
        let mut names: HashSet<&str> = HashSet::default();
        for task in &tasks {
            if !names.insert(task.name()) {
                return Err(SchedulerError::DuplicateName {
                    name: task.name().to_string(),
                });
            }
        }
    }

    let quotas = [
        ("system_processor", options.system_processor),
        ("system_memory", options.system_memory),
        ("graphics_processor", options.graphics_processor),
        ("graphics_memory", options.graphics_memory),
    ];
    for (quota, value) in quotas {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::QuotaOutOfRange { quota, value }.into());
        }
    }

    let graph = DependencyGraph::new(&tasks)?;

    let worker_ledger = WorkerLedger::new(
        options.processes.unwrap_or_else(logical_cpus),
        options.threads.unwrap_or_else(logical_cpus),
    );
    let resource_ledger = ResourceLedger::new(ResourceUsage {
        system_processor: options.system_processor,
        system_memory: options.system_memory,
        graphics_processor: options.graphics_processor,
        graphics_memory: options.graphics_memory,
    });
    let sink = options
        .logger
        .unwrap_or_else(|| Arc::new(FacadeSink));

    Ok(TaskScheduler::new(tasks, graph, worker_ledger, resource_ledger, sink).execute())
}

fn logical_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
