//! Dependency graph over a task submission.

use crate::collections::NoHashMap;
use crate::error::SchedulerError;
use crate::task::ScheduledTask;
use parallax_worker::TaskId;
use petgraph::{algo, graphmap::DiGraphMap};

/// The prerequisite relation of one submission, validated to be closed and
/// acyclic before the scheduler runs.
///
/// Edges are directed from prerequisite to dependent. Both the prerequisite
/// lists and their reverses are precomputed, since the scheduling loop
/// queries them on every scan.
#[derive(Debug)]
pub(crate) struct DependencyGraph {
    prerequisites: NoHashMap<TaskId, Vec<TaskId>>,
    dependents: NoHashMap<TaskId, Vec<TaskId>>,
}

impl DependencyGraph {
    /// Builds the graph for the given submission.
    ///
    /// Fails if a prerequisite is missing from the submission or if the
    /// prerequisite relation contains a cycle.
    pub fn new(tasks: &[ScheduledTask]) -> Result<Self, SchedulerError> {
        let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();
        let mut prerequisites: NoHashMap<TaskId, Vec<TaskId>> = NoHashMap::default();
        let mut dependents: NoHashMap<TaskId, Vec<TaskId>> = NoHashMap::default();

        for task in tasks {
            graph.add_node(task.id());
            prerequisites.entry(task.id()).or_default();
            dependents.entry(task.id()).or_default();
        }

        for task in tasks {
            for prerequisite in task.prerequisites() {
                if !prerequisites.contains_key(&prerequisite.id()) {
                    return Err(SchedulerError::MissingDependency {
                        task: task.name().to_string(),
                        dependency: prerequisite.name().to_string(),
                    });
                }
                if prerequisite.id() == task.id() {
                    // A self-edge, possible through name aliasing.
                    return Err(SchedulerError::DependencyCycle);
                }
                graph.add_edge(prerequisite.id(), task.id(), ());
                prerequisites
                    .entry(task.id())
                    .or_default()
                    .push(prerequisite.id());
                dependents
                    .entry(prerequisite.id())
                    .or_default()
                    .push(task.id());
            }
        }

        if algo::toposort(&graph, None).is_err() {
            return Err(SchedulerError::DependencyCycle);
        }

        Ok(Self {
            prerequisites,
            dependents,
        })
    }

    /// The prerequisites of the given task, deduplicated.
    pub fn prerequisites(&self, task: TaskId) -> &[TaskId] {
        self.prerequisites
            .get(&task)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The tasks that list the given task among their prerequisites.
    pub fn dependents(&self, task: TaskId) -> &[TaskId] {
        self.dependents
            .get(&task)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether some prerequisite of the task has not yet reached the state
    /// probed by `has_reached`.
    pub fn is_blocked(&self, task: TaskId, has_reached: impl Fn(TaskId) -> bool) -> bool {
        self.prerequisites(task)
            .iter()
            .any(|&prerequisite| !has_reached(prerequisite))
    }

    /// The prerequisites of the task selected by `is_blocking`, in
    /// declaration order.
    pub fn blocking_tasks(
        &self,
        task: TaskId,
        is_blocking: impl Fn(TaskId) -> bool,
    ) -> Vec<TaskId> {
        self.prerequisites(task)
            .iter()
            .copied()
            .filter(|&prerequisite| is_blocking(prerequisite))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::scheduled_task;
    use parallax_worker::{ExecutorKind, Value, native_fn};

    fn task(name: &str, dependencies: &[&ScheduledTask]) -> ScheduledTask {
        scheduled_task(ExecutorKind::Thread, name, native_fn(|_| Ok(Value::Unit)))
            .dependencies(dependencies.iter().map(|&task| task.clone()))
            .build()
            .unwrap()
    }

    #[test]
    fn an_empty_submission_is_valid() {
        let graph = DependencyGraph::new(&[]).unwrap();
        assert!(graph.prerequisites(parallax_worker::TaskId::from_name("x")).is_empty());
    }

    #[test]
    fn prerequisites_and_dependents_are_mirrored() {
        let root = task("root", &[]);
        let left = task("left", &[&root]);
        let right = task("right", &[&root]);
        let merge = task("merge", &[&left, &right]);

        let graph =
            DependencyGraph::new(&[root.clone(), left.clone(), right.clone(), merge.clone()])
                .unwrap();

        assert_eq!(graph.prerequisites(merge.id()), [left.id(), right.id()]);
        assert_eq!(graph.dependents(root.id()), [left.id(), right.id()]);
        assert!(graph.dependents(merge.id()).is_empty());
    }

    #[test]
    fn proxy_arguments_contribute_edges() {
        let producer = task("producer", &[]);
        let consumer = scheduled_task(
            ExecutorKind::Thread,
            "consumer",
            native_fn(|_| Ok(Value::Unit)),
        )
        .args([producer.return_value()])
        .build()
        .unwrap();

        let graph = DependencyGraph::new(&[producer.clone(), consumer.clone()]).unwrap();
        assert_eq!(graph.prerequisites(consumer.id()), [producer.id()]);
    }

    #[test]
    fn missing_prerequisites_are_rejected() {
        let outside = task("outside", &[]);
        let dependent = task("dependent", &[&outside]);

        let result = DependencyGraph::new(&[dependent]);
        assert_eq!(
            result.unwrap_err(),
            SchedulerError::MissingDependency {
                task: "dependent".to_string(),
                dependency: "outside".to_string(),
            }
        );
    }

    #[test]
    fn cycles_through_name_aliases_are_rejected() {
        // "first" depends on a stand-in for "second", and the submitted
        // "second" depends on "first"; identity by name closes the loop.
        let second_alias = task("second", &[]);
        let first = task("first", &[&second_alias]);
        let second = task("second", &[&first]);

        let result = DependencyGraph::new(&[first, second]);
        assert_eq!(result.unwrap_err(), SchedulerError::DependencyCycle);
    }

    #[test]
    fn self_dependencies_are_rejected() {
        let alias = task("looped", &[]);
        let looped = task("looped", &[&alias]);

        let result = DependencyGraph::new(&[looped]);
        assert_eq!(result.unwrap_err(), SchedulerError::DependencyCycle);
    }

    #[test]
    fn blocking_queries_consult_the_given_predicate() {
        let root = task("root", &[]);
        let other = task("other", &[]);
        let merge = task("merge", &[&root, &other]);

        let graph = DependencyGraph::new(&[root.clone(), other.clone(), merge.clone()]).unwrap();

        assert!(graph.is_blocked(merge.id(), |id| id == root.id()));
        assert!(!graph.is_blocked(merge.id(), |_| true));
        assert_eq!(
            graph.blocking_tasks(merge.id(), |id| id == other.id()),
            vec![other.id()]
        );
    }
}
