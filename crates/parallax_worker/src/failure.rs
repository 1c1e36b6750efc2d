//! Per-task failure records.

use std::error::Error;
use std::fmt;

/// Why a task ended without completing successfully.
///
/// A failure is recorded into the task's shared state record, either by the
/// worker that ran the task (for raised errors) or by the coordinator when
/// the task is cancelled before launch.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskFailure {
    /// The task's target returned an error or panicked.
    Raised {
        message: String,
        /// Formatted error chain and backtrace, when available.
        trace: Option<String>,
    },
    /// The task was cancelled because a prerequisite ended unsuccessfully.
    Dependency(DependencyError),
    /// The task was cancelled because its standalone worker demand exceeds
    /// the global budget.
    Worker(WorkerError),
    /// The task was cancelled because its standalone resource demand exceeds
    /// the global quota.
    Resource(ResourceError),
}

impl TaskFailure {
    pub fn raised(message: impl Into<String>, trace: Option<String>) -> Self {
        Self::Raised {
            message: message.into(),
            trace,
        }
    }

    /// Whether the task never ran because the scheduler cancelled it.
    pub fn is_cancellation(&self) -> bool {
        !matches!(self, Self::Raised { .. })
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raised { message, .. } => f.write_str(message),
            Self::Dependency(error) => error.fmt(f),
            Self::Worker(error) => error.fmt(f),
            Self::Resource(error) => error.fmt(f),
        }
    }
}

impl Error for TaskFailure {}

/// Cancellation record naming the prerequisite tasks that terminated without
/// completing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyError {
    pub tasks: Vec<String>,
}

impl DependencyError {
    pub fn new(tasks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tasks.len() == 1 {
            write!(f, "unsuccessful prerequisite task '{}'", self.tasks[0])
        } else {
            write!(f, "unsuccessful prerequisite tasks ")?;
            for (index, name) in self.tasks.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "'{name}'")?;
            }
            Ok(())
        }
    }
}

impl Error for DependencyError {}

/// Cancellation record carrying the worker counts missing from the global
/// budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerError {
    pub processes: usize,
    pub threads: usize,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("lack of ")?;
        match (self.processes, self.threads) {
            (0, 0) => f.write_str("workers"),
            (processes, 0) => write!(f, "{processes} {}", plural(processes, "process", "processes")),
            (0, threads) => write!(f, "{threads} {}", plural(threads, "thread", "threads")),
            (processes, threads) => write!(
                f,
                "{processes} {} and {threads} {}",
                plural(processes, "process", "processes"),
                plural(threads, "thread", "threads")
            ),
        }
    }
}

impl Error for WorkerError {}

/// Cancellation record carrying the deficit on each resource axis, as
/// percentage points.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceError {
    pub system_processor: f64,
    pub system_memory: f64,
    pub graphics_processor: f64,
    pub graphics_memory: f64,
}

impl ResourceError {
    /// The four axes with their deficits, in declaration order.
    pub fn axes(&self) -> [(&'static str, f64); 4] {
        [
            ("system_processor", self.system_processor),
            ("system_memory", self.system_memory),
            ("graphics_processor", self.graphics_processor),
            ("graphics_memory", self.graphics_memory),
        ]
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("lack of resources (")?;
        let mut first = true;
        for (name, deficit) in self.axes() {
            if deficit > 0.0 {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{name}: {deficit}%")?;
                first = false;
            }
        }
        f.write_str(")")
    }
}

impl Error for ResourceError {}

fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 { singular } else { plural }
}
