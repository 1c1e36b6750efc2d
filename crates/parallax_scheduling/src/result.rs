//! The outcome of a scheduler run.

use crate::collections::IndexMap;
use parallax_worker::{TaskFailure, Value};
use std::time::{Duration, SystemTime};

/// The collected outcome of one scheduler run.
///
/// All four mappings are keyed by task name and ordered by ascending
/// `execution_time` (the moment each task's wrapper was entered), giving a
/// deterministic chronology across launched and cancelled tasks alike.
#[derive(Clone, Debug, Default)]
pub struct SchedulerResult {
    /// When each task's wrapper was entered; contains every submitted task.
    pub execution_time: IndexMap<String, SystemTime>,
    /// How long each launched task ran; cancelled tasks are absent.
    pub elapsed_time: IndexMap<String, Duration>,
    /// The failure recorded for each cancelled or raising task.
    pub raise_exception: IndexMap<String, TaskFailure>,
    /// The return value of each `continual` task that completed.
    pub return_value: IndexMap<String, Value>,
}
