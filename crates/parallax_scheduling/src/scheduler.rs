//! The scheduling loop.

use crate::binder::ParameterBinder;
use crate::collections::NoHashMap;
use crate::graph::DependencyGraph;
use crate::ledger::{ResourceLedger, ResourceUsage, WorkerAllocation, WorkerLedger};
use crate::memory::SharedMemoryHandler;
use crate::result::SchedulerResult;
use crate::task::ScheduledTask;
use parallax_log::LogSink;
use parallax_worker::{
    DependencyError, ExecutorBackend, FunctionWrapper, SharedStateRegistry, StateFlag, TaskFailure,
    TaskId, executor,
};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on how long the coordinator sleeps between scans when no
/// state update arrives to wake it.
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// The coordinator: runs the priority-ordered scheduling loop over one
/// submission until every task is terminal.
pub(crate) struct TaskScheduler {
    entries: Vec<TaskEntry>,
    by_id: NoHashMap<TaskId, usize>,
    graph: DependencyGraph,
    worker_ledger: WorkerLedger,
    resource_ledger: ResourceLedger,
    registry: SharedStateRegistry,
    memory: SharedMemoryHandler,
    sink: Arc<dyn LogSink>,
}

/// A submitted task together with its runtime bookkeeping. A task is
/// *admitted* once its state record exists, which happens exactly when it is
/// launched or cancelled.
struct TaskEntry {
    task: ScheduledTask,
    state: Option<Arc<parallax_worker::SharedState>>,
    backend: Option<Box<dyn ExecutorBackend>>,
    harvested: bool,
}

impl TaskEntry {
    fn admitted(&self) -> bool {
        self.state.is_some()
    }

    fn running(&self) -> bool {
        self.state
            .as_deref()
            .is_some_and(|state| state.has_started() && !state.has_finished())
    }

    fn finished(&self) -> bool {
        self.state.as_deref().is_some_and(|state| state.has_finished())
    }
}

impl TaskScheduler {
    pub fn new(
        mut tasks: Vec<ScheduledTask>,
        graph: DependencyGraph,
        worker_ledger: WorkerLedger,
        resource_ledger: ResourceLedger,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        // Stable sort: tasks with equal priority keep submission order.
        tasks.sort_by(|a, b| a.priority().total_cmp(&b.priority()));

        let by_id = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| (task.id(), index))
            .collect();
        let entries = tasks
            .into_iter()
            .map(|task| TaskEntry {
                task,
                state: None,
                backend: None,
                harvested: false,
            })
            .collect();

        Self {
            entries,
            by_id,
            graph,
            worker_ledger,
            resource_ledger,
            registry: SharedStateRegistry::new(),
            memory: SharedMemoryHandler::new(),
            sink,
        }
    }

    /// Runs the submission to completion and returns the collected result.
    pub fn execute(mut self) -> SchedulerResult {
        self.preflight();

        let notifier = self.registry.notifier();
        loop {
            let version = notifier.current_version();
            if self.finished() {
                break;
            }
            if !self.scan() {
                notifier.wait_past(version, IDLE_WAIT);
            }
        }

        self.teardown()
    }

    /// Cancels, up front, every task whose standalone demand can never fit
    /// the global budgets. Cancelled tasks still participate in dependency
    /// checks, so their dependents cascade-cancel during the main loop.
    fn preflight(&mut self) {
        for index in 0..self.entries.len() {
            let task = self.entries[index].task.clone();
            if let Err(error) = self.worker_ledger.feasible(&task) {
                self.cancel(index, TaskFailure::Worker(error));
            } else if let Err(error) = self.resource_ledger.feasible(&task) {
                self.cancel(index, TaskFailure::Resource(error));
            }
        }
    }

    fn finished(&self) -> bool {
        self.entries.iter().all(TaskEntry::finished)
    }

    /// One pass over the tasks in priority order. Returns whether a task was
    /// launched; after a launch the pass is abandoned so the next decision
    /// re-evaluates budgets from the highest-priority task down.
    fn scan(&mut self) -> bool {
        for index in 0..self.entries.len() {
            if self.entries[index].admitted() {
                self.try_harvest(index);
                continue;
            }

            let task = self.entries[index].task.clone();
            if !self
                .resource_ledger
                .admissible(&task, self.resources_in_flight())
            {
                continue;
            }
            if !self
                .worker_ledger
                .admissible(&task, self.workers_in_flight())
            {
                continue;
            }
            if self.is_blocked(&task, StateFlag::Finish) {
                continue;
            }
            if self.is_blocked(&task, StateFlag::Complete) {
                // A prerequisite terminated unsuccessfully.
                let blocking = self.blocking_task_names(&task);
                self.cancel(index, TaskFailure::Dependency(DependencyError::new(blocking)));
                continue;
            }

            self.launch(index);
            return true;
        }
        false
    }

    /// Whether some prerequisite of the task has not reached the given flag.
    /// Prerequisites that have not been admitted yet count as blocking.
    fn is_blocked(&self, task: &ScheduledTask, flag: StateFlag) -> bool {
        self.graph
            .is_blocked(task.id(), |prerequisite| self.reached(prerequisite, flag))
    }

    fn reached(&self, task: TaskId, flag: StateFlag) -> bool {
        self.by_id
            .get(&task)
            .and_then(|&index| self.entries[index].state.as_deref())
            .is_some_and(|state| state.flag_is_set(flag))
    }

    /// The prerequisites that terminated without completing, by name.
    fn blocking_task_names(&self, task: &ScheduledTask) -> Vec<String> {
        self.graph
            .blocking_tasks(task.id(), |prerequisite| {
                self.reached(prerequisite, StateFlag::Finish)
                    && !self.reached(prerequisite, StateFlag::Complete)
            })
            .into_iter()
            .filter_map(|id| self.by_id.get(&id))
            .map(|&index| self.entries[index].task.name().to_string())
            .collect()
    }

    fn workers_in_flight(&self) -> WorkerAllocation {
        let mut total = WorkerAllocation::default();
        for entry in &self.entries {
            if entry.running() {
                total.add(WorkerLedger::demand(&entry.task));
            }
        }
        total
    }

    fn resources_in_flight(&self) -> ResourceUsage {
        let mut total = ResourceUsage::default();
        for entry in &self.entries {
            if entry.running() {
                total.add(ResourceUsage::of(&entry.task));
            }
        }
        total
    }

    /// Admits the task as cancelled: its state record is created and the
    /// blocker recorded, so dependents observe it as terminated-and-failed,
    /// but no executor is ever constructed.
    fn cancel(&mut self, index: usize, failure: TaskFailure) {
        let task = self.entries[index].task.clone();
        let state = self.registry.allocate(task.id());
        let wrapper = FunctionWrapper::new(
            task.name(),
            task.target().clone(),
            Arc::clone(&state),
            self.registry.notifier(),
            Arc::clone(&self.sink),
        );
        wrapper.cancel(failure);
        self.entries[index].state = Some(state);
    }

    /// Binds the task's arguments and starts its executor. A failed bind
    /// admits the task as cancelled instead; the scheduler never unwinds.
    fn launch(&mut self, index: usize) {
        let task = self.entries[index].task.clone();
        let state = self.registry.allocate(task.id());
        let wrapper = FunctionWrapper::new(
            task.name(),
            task.target().clone(),
            Arc::clone(&state),
            self.registry.notifier(),
            Arc::clone(&self.sink),
        );

        match ParameterBinder::new(&self.registry).bind(&task) {
            Ok(arguments) => {
                let mut backend = executor::backend_for(
                    task.kind(),
                    task.name(),
                    Arc::clone(&state),
                    wrapper,
                    arguments,
                );
                backend.start();
                self.entries[index].backend = Some(backend);
            }
            Err(error) => {
                wrapper.cancel(TaskFailure::raised(format!("{error:#}"), None));
            }
        }
        self.entries[index].state = Some(state);
    }

    /// Drains a terminal task's record and reclaims it. A record may only
    /// be drained once every dependent has been admitted: at that point each
    /// consumer has either bound the return value already or will never run.
    fn try_harvest(&mut self, index: usize) {
        if self.entries[index].harvested || !self.entries[index].finished() {
            return;
        }

        let id = self.entries[index].task.id();
        let dependents_admitted = self.graph.dependents(id).iter().all(|dependent| {
            self.by_id
                .get(dependent)
                .is_some_and(|&dependent_index| self.entries[dependent_index].admitted())
        });
        if !dependents_admitted {
            return;
        }

        let continual = self.entries[index].task.continual();
        let Some(state) = self.entries[index].state.clone() else {
            return;
        };
        self.memory.harvest(id, continual, &state);
        self.registry.reclaim(id);
        self.entries[index].harvested = true;
    }

    /// Joins every launched executor, runs the final harvest, and shuts the
    /// registry down.
    fn teardown(mut self) -> SchedulerResult {
        for entry in &mut self.entries {
            if let Some(backend) = entry.backend.as_mut() {
                backend.join(None);
            }
        }
        for index in 0..self.entries.len() {
            self.try_harvest(index);
        }
        self.registry.shutdown();

        let tasks = self
            .entries
            .iter()
            .map(|entry| (entry.task.id(), entry.task.name().to_string()))
            .collect();
        self.memory.into_result(tasks)
    }
}
