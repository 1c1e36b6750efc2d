//! Synchronous scheduler errors.
//!
//! These fail fast, before any task runs. Per-task failures observed during
//! a run are reported through the result record instead (see
//! [`TaskFailure`](parallax_worker::TaskFailure)).

use std::error::Error;
use std::fmt;

/// A type or range violation in a task specification or in the scheduler
/// options.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationError {
    /// The task name is empty.
    EmptyName,
    /// The task priority is NaN.
    PriorityNotANumber { task: String },
    /// A declared resource percentage lies outside `[0, 100]`.
    ResourceOutOfRange {
        task: String,
        resource: &'static str,
        value: f64,
    },
    /// A scheduler resource quota lies outside `[0, 100]`.
    QuotaOutOfRange { quota: &'static str, value: f64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Task names must not be empty"),
            Self::PriorityNotANumber { task } => {
                write!(f, "Priority of task '{task}' must not be NaN")
            }
            Self::ResourceOutOfRange {
                task,
                resource,
                value,
            } => write!(
                f,
                "Resource '{resource}' of task '{task}' must lie between 0 and 100, got {value}"
            ),
            Self::QuotaOutOfRange { quota, value } => write!(
                f,
                "Scheduler quota '{quota}' must lie between 0 and 100, got {value}"
            ),
        }
    }
}

impl Error for ValidationError {}

/// An error raised synchronously by the scheduler entry point; no task has
/// run when any of these is returned.
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerError {
    /// A task or option failed validation.
    Validation(ValidationError),
    /// Two submitted tasks share a name.
    DuplicateName { name: String },
    /// A declared prerequisite is not part of the submission.
    MissingDependency { task: String, dependency: String },
    /// The prerequisite relation contains a cycle.
    DependencyCycle,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(error) => error.fmt(f),
            Self::DuplicateName { name } => {
                write!(f, "Multiple submitted tasks are named '{name}'")
            }
            Self::MissingDependency { task, dependency } => write!(
                f,
                "Task '{task}' depends on '{dependency}', which is not part of the submission"
            ),
            Self::DependencyCycle => write!(f, "Task dependencies contain a cycle"),
        }
    }
}

impl Error for SchedulerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ValidationError> for SchedulerError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}
