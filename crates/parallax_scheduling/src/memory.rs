//! Harvesting of terminal task state.

use crate::collections::NoHashMap;
use crate::result::SchedulerResult;
use parallax_worker::{SharedState, TaskFailure, TaskId, Value};
use std::time::{Duration, SystemTime};

/// Accumulates the durable outcome of each terminal task.
///
/// The scheduling loop decides *when* a record may be drained (only once
/// every dependent of the task has been admitted, so no consumer can still
/// need the stored return value); this handler performs the drain and the
/// final assembly of the result record.
#[derive(Debug, Default)]
pub(crate) struct SharedMemoryHandler {
    execution_time: NoHashMap<TaskId, SystemTime>,
    elapsed_time: NoHashMap<TaskId, Duration>,
    raise_exception: NoHashMap<TaskId, TaskFailure>,
    return_value: NoHashMap<TaskId, Value>,
}

impl SharedMemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the durable slots of a terminal task's record into the
    /// accumulators. Return values are retained only for `continual` tasks
    /// that did not fail.
    pub fn harvest(&mut self, task: TaskId, continual: bool, state: &SharedState) {
        if let Some(time) = state.execution_time() {
            self.execution_time.insert(task, time);
        }
        if let Some(elapsed) = state.elapsed_time() {
            self.elapsed_time.insert(task, elapsed);
        }
        if let Some(failure) = state.failure() {
            self.raise_exception.insert(task, failure);
        } else if continual {
            if let Some(value) = state.return_value() {
                self.return_value.insert(task, value);
            }
        }
    }

    /// Assembles the result record, with every mapping ordered by ascending
    /// `execution_time`. `tasks` supplies the id-to-name mapping and the
    /// tie-breaking order.
    pub fn into_result(mut self, tasks: Vec<(TaskId, String)>) -> SchedulerResult {
        let mut ordered: Vec<(TaskId, String, SystemTime)> = tasks
            .into_iter()
            .filter_map(|(id, name)| {
                self.execution_time
                    .get(&id)
                    .map(|&time| (id, name, time))
            })
            .collect();
        ordered.sort_by_key(|&(_, _, time)| time);

        let mut result = SchedulerResult::default();
        for (id, name, time) in ordered {
            result.execution_time.insert(name.clone(), time);
            if let Some(elapsed) = self.elapsed_time.remove(&id) {
                result.elapsed_time.insert(name.clone(), elapsed);
            }
            if let Some(failure) = self.raise_exception.remove(&id) {
                result.raise_exception.insert(name.clone(), failure);
            }
            if let Some(value) = self.return_value.remove(&id) {
                result.return_value.insert(name, value);
            }
        }
        result
    }
}
