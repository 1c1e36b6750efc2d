//! Worker and resource budget ledgers.
//!
//! Both ledgers answer the same two questions about a task: whether it could
//! run with the whole budget to itself (*feasible*), and whether it fits
//! next to what is currently running (*admissible*). Demands are declared
//! estimates; nothing here measures actual usage.

use crate::task::ScheduledTask;
use parallax_worker::{ExecutorKind, ResourceError, WorkerError};

/// A worker allocation: OS processes and threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct WorkerAllocation {
    pub processes: usize,
    pub threads: usize,
}

impl WorkerAllocation {
    pub fn add(&mut self, other: Self) {
        self.processes += other.processes;
        self.threads += other.threads;
    }
}

/// Tracks the global process and thread budgets.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WorkerLedger {
    budget: WorkerAllocation,
}

impl WorkerLedger {
    pub fn new(processes: usize, threads: usize) -> Self {
        Self {
            budget: WorkerAllocation { processes, threads },
        }
    }

    /// The worker demand of the given task, including its own execution
    /// unit: a Process-kind task occupies one process plus its declared
    /// internal processes, a Thread-kind task occupies one thread plus its
    /// declared internal workers.
    pub fn demand(task: &ScheduledTask) -> WorkerAllocation {
        match task.kind() {
            ExecutorKind::Process => WorkerAllocation {
                processes: task.processes() + 1,
                threads: 0,
            },
            ExecutorKind::Thread => WorkerAllocation {
                processes: task.processes(),
                threads: task.threads() + 1,
            },
        }
    }

    /// Whether the task could run with the whole budget to itself. On
    /// failure, the error carries the missing worker counts.
    pub fn feasible(&self, task: &ScheduledTask) -> Result<(), WorkerError> {
        let demand = Self::demand(task);
        if demand.processes <= self.budget.processes && demand.threads <= self.budget.threads {
            Ok(())
        } else {
            Err(WorkerError {
                processes: demand.processes.saturating_sub(self.budget.processes),
                threads: demand.threads.saturating_sub(self.budget.threads),
            })
        }
    }

    /// Whether the task fits next to the given in-flight allocation.
    pub fn admissible(&self, task: &ScheduledTask, in_flight: WorkerAllocation) -> bool {
        let demand = Self::demand(task);
        in_flight.processes + demand.processes <= self.budget.processes
            && in_flight.threads + demand.threads <= self.budget.threads
    }
}

/// Declared usage on the four resource axes, as percentages.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct ResourceUsage {
    pub system_processor: f64,
    pub system_memory: f64,
    pub graphics_processor: f64,
    pub graphics_memory: f64,
}

impl ResourceUsage {
    pub fn of(task: &ScheduledTask) -> Self {
        Self {
            system_processor: task.system_processor(),
            system_memory: task.system_memory(),
            graphics_processor: task.graphics_processor(),
            graphics_memory: task.graphics_memory(),
        }
    }

    pub fn add(&mut self, other: Self) {
        self.system_processor += other.system_processor;
        self.system_memory += other.system_memory;
        self.graphics_processor += other.graphics_processor;
        self.graphics_memory += other.graphics_memory;
    }

    fn fits_within(&self, quota: Self) -> bool {
        self.system_processor <= quota.system_processor
            && self.system_memory <= quota.system_memory
            && self.graphics_processor <= quota.graphics_processor
            && self.graphics_memory <= quota.graphics_memory
    }
}

/// Tracks the global resource quotas.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResourceLedger {
    quota: ResourceUsage,
}

impl ResourceLedger {
    pub fn new(quota: ResourceUsage) -> Self {
        Self { quota }
    }

    /// Whether the task could run with the whole quota to itself. On
    /// failure, the error carries the deficit on each axis.
    pub fn feasible(&self, task: &ScheduledTask) -> Result<(), ResourceError> {
        let demand = ResourceUsage::of(task);
        if demand.fits_within(self.quota) {
            Ok(())
        } else {
            Err(ResourceError {
                system_processor: deficit(demand.system_processor, self.quota.system_processor),
                system_memory: deficit(demand.system_memory, self.quota.system_memory),
                graphics_processor: deficit(
                    demand.graphics_processor,
                    self.quota.graphics_processor,
                ),
                graphics_memory: deficit(demand.graphics_memory, self.quota.graphics_memory),
            })
        }
    }

    /// Whether the task fits next to the given in-flight usage.
    pub fn admissible(&self, task: &ScheduledTask, in_flight: ResourceUsage) -> bool {
        let mut combined = ResourceUsage::of(task);
        combined.add(in_flight);
        combined.fits_within(self.quota)
    }
}

fn deficit(demand: f64, quota: f64) -> f64 {
    (demand - quota).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::scheduled_task;
    use parallax_worker::{Value, native_fn};

    fn worker_task(kind: ExecutorKind, processes: usize, threads: usize) -> ScheduledTask {
        scheduled_task(kind, "fixture", native_fn(|_| Ok(Value::Unit)))
            .processes(processes)
            .threads(threads)
            .build()
            .unwrap()
    }

    #[test]
    fn process_tasks_demand_their_own_process_and_no_threads() {
        let task = worker_task(ExecutorKind::Process, 3, 5);
        assert_eq!(
            WorkerLedger::demand(&task),
            WorkerAllocation {
                processes: 4,
                threads: 0,
            }
        );
    }

    #[test]
    fn thread_tasks_demand_their_own_thread() {
        let task = worker_task(ExecutorKind::Thread, 2, 3);
        assert_eq!(
            WorkerLedger::demand(&task),
            WorkerAllocation {
                processes: 2,
                threads: 4,
            }
        );
    }

    #[test]
    fn a_task_filling_the_whole_budget_is_feasible() {
        let ledger = WorkerLedger::new(4, 4);
        assert!(ledger.feasible(&worker_task(ExecutorKind::Process, 3, 0)).is_ok());
    }

    #[test]
    fn oversubscription_reports_the_missing_workers() {
        let ledger = WorkerLedger::new(2, 2);
        let error = ledger
            .feasible(&worker_task(ExecutorKind::Process, 3, 0))
            .unwrap_err();
        assert_eq!(
            error,
            WorkerError {
                processes: 2,
                threads: 0,
            }
        );
    }

    #[test]
    fn admissibility_accounts_for_in_flight_workers() {
        let ledger = WorkerLedger::new(4, 4);
        let task = worker_task(ExecutorKind::Process, 1, 0);

        assert!(ledger.admissible(&task, WorkerAllocation::default()));
        assert!(ledger.admissible(
            &task,
            WorkerAllocation {
                processes: 2,
                threads: 0,
            }
        ));
        assert!(!ledger.admissible(
            &task,
            WorkerAllocation {
                processes: 3,
                threads: 0,
            }
        ));
    }

    #[test]
    fn thread_admissibility_checks_both_axes() {
        let ledger = WorkerLedger::new(2, 2);
        let task = worker_task(ExecutorKind::Thread, 1, 1);

        assert!(ledger.admissible(&task, WorkerAllocation::default()));
        assert!(!ledger.admissible(
            &task,
            WorkerAllocation {
                processes: 2,
                threads: 0,
            }
        ));
        assert!(!ledger.admissible(
            &task,
            WorkerAllocation {
                processes: 0,
                threads: 1,
            }
        ));
    }

    fn resource_task(system_memory: f64) -> ScheduledTask {
        scheduled_task(ExecutorKind::Thread, "fixture", native_fn(|_| Ok(Value::Unit)))
            .system_memory(system_memory)
            .build()
            .unwrap()
    }

    #[test]
    fn resource_oversubscription_reports_per_axis_deficits() {
        let ledger = ResourceLedger::new(ResourceUsage {
            system_memory: 50.0,
            ..quota_of(100.0)
        });
        let error = ledger.feasible(&resource_task(80.0)).unwrap_err();
        assert_eq!(
            error,
            ResourceError {
                system_memory: 30.0,
                ..ResourceError::default()
            }
        );
    }

    #[test]
    fn resource_admissibility_sums_in_flight_usage() {
        let ledger = ResourceLedger::new(quota_of(100.0));
        let task = resource_task(60.0);

        assert!(ledger.admissible(&task, ResourceUsage::default()));
        assert!(ledger.admissible(
            &task,
            ResourceUsage {
                system_memory: 40.0,
                ..ResourceUsage::default()
            }
        ));
        assert!(!ledger.admissible(
            &task,
            ResourceUsage {
                system_memory: 41.0,
                ..ResourceUsage::default()
            }
        ));
    }

    fn quota_of(value: f64) -> ResourceUsage {
        ResourceUsage {
            system_processor: value,
            system_memory: value,
            graphics_processor: value,
            graphics_memory: value,
        }
    }
}
