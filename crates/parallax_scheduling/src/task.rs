//! Scheduled task specifications.

use crate::error::ValidationError;
use crate::proxy::ReturnProxy;
use parallax_worker::{ExecutorKind, NativeFn, TaskId, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{self, Hash};
use std::sync::Arc;

/// An argument to a scheduled task: either a plain value, or a proxy for
/// another task's eventual return value.
#[derive(Clone, Debug)]
pub enum Param {
    Value(Value),
    Proxy(ReturnProxy),
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ReturnProxy> for Param {
    fn from(proxy: ReturnProxy) -> Self {
        Self::Proxy(proxy)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Value(Value::Int(value))
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Value(Value::Float(value))
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

/// Immutable description of one scheduled unit of work.
///
/// A task's identity is its name: two tasks compare equal exactly when their
/// names match, so dependency sets deduplicate by name and edges stay
/// coherent across the scheduler's internal bookkeeping. Handles are
/// cheaply cloneable and share one underlying specification.
#[derive(Clone)]
pub struct ScheduledTask {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    kind: ExecutorKind,
    name: String,
    id: TaskId,
    target: NativeFn,
    args: Vec<Param>,
    kwargs: BTreeMap<String, Param>,
    dependencies: Vec<ScheduledTask>,
    priority: f64,
    processes: usize,
    threads: usize,
    system_processor: f64,
    system_memory: f64,
    graphics_processor: f64,
    graphics_memory: f64,
    continual: bool,
}

impl ScheduledTask {
    pub fn kind(&self) -> ExecutorKind {
        self.inner.kind
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn target(&self) -> &NativeFn {
        &self.inner.target
    }

    pub fn args(&self) -> &[Param] {
        &self.inner.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Param> {
        &self.inner.kwargs
    }

    /// The explicitly declared prerequisite tasks.
    pub fn dependencies(&self) -> &[ScheduledTask] {
        &self.inner.dependencies
    }

    /// Execution priority; smaller values run earlier.
    pub fn priority(&self) -> f64 {
        self.inner.priority
    }

    /// Additional processes the task will spawn internally.
    pub fn processes(&self) -> usize {
        self.inner.processes
    }

    /// Additional threads the task will spawn internally.
    pub fn threads(&self) -> usize {
        self.inner.threads
    }

    pub fn system_processor(&self) -> f64 {
        self.inner.system_processor
    }

    pub fn system_memory(&self) -> f64 {
        self.inner.system_memory
    }

    pub fn graphics_processor(&self) -> f64 {
        self.inner.graphics_processor
    }

    pub fn graphics_memory(&self) -> f64 {
        self.inner.graphics_memory
    }

    /// Whether the task's return value is retained in the final result.
    pub fn continual(&self) -> bool {
        self.inner.continual
    }

    /// Returns a proxy for this task's eventual return value. Passing the
    /// proxy as an argument of another task makes this task a prerequisite
    /// of that consumer.
    pub fn return_value(&self) -> ReturnProxy {
        ReturnProxy::new(self.clone())
    }

    /// Every task whose return value this task consumes through a proxy
    /// argument, deduplicated, in argument order.
    pub(crate) fn parameter_producers(&self) -> Vec<ScheduledTask> {
        let mut producers = Vec::new();
        let params = self.inner.args.iter().chain(self.inner.kwargs.values());
        for param in params {
            if let Param::Proxy(proxy) = param {
                let producer = proxy.producer();
                if !producers.contains(producer) {
                    producers.push(producer.clone());
                }
            }
        }
        producers
    }

    /// The full prerequisite set: explicit dependencies and parameter
    /// producers, deduplicated by task identity.
    pub(crate) fn prerequisites(&self) -> Vec<ScheduledTask> {
        let mut prerequisites = self.inner.dependencies.clone();
        for producer in self.parameter_producers() {
            if !prerequisites.contains(&producer) {
                prerequisites.push(producer);
            }
        }
        prerequisites
    }
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for ScheduledTask {}

impl Hash for ScheduledTask {
    fn hash<H: hash::Hasher>(&self, hasher: &mut H) {
        self.inner.name.hash(hasher);
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("kind", &self.inner.kind)
            .field("name", &self.inner.name)
            .field("args", &self.inner.args.len())
            .field("kwargs", &self.inner.kwargs.len())
            .field("dependencies", &self.inner.dependencies.len())
            .field("priority", &self.inner.priority)
            .field("processes", &self.inner.processes)
            .field("threads", &self.inner.threads)
            .field("continual", &self.inner.continual)
            .finish_non_exhaustive()
    }
}

/// Creates a builder for a scheduled task running the given target on the
/// given kind of execution unit.
pub fn scheduled_task(
    kind: ExecutorKind,
    name: impl Into<String>,
    target: NativeFn,
) -> TaskBuilder {
    TaskBuilder {
        kind,
        name: name.into(),
        target,
        args: Vec::new(),
        kwargs: BTreeMap::new(),
        dependencies: Vec::new(),
        priority: f64::INFINITY,
        processes: 0,
        threads: 0,
        system_processor: 0.0,
        system_memory: 0.0,
        graphics_processor: 0.0,
        graphics_memory: 0.0,
        continual: false,
    }
}

/// Configures and validates a [`ScheduledTask`].
pub struct TaskBuilder {
    kind: ExecutorKind,
    name: String,
    target: NativeFn,
    args: Vec<Param>,
    kwargs: BTreeMap<String, Param>,
    dependencies: Vec<ScheduledTask>,
    priority: f64,
    processes: usize,
    threads: usize,
    system_processor: f64,
    system_memory: f64,
    graphics_processor: f64,
    graphics_memory: f64,
    continual: bool,
}

impl TaskBuilder {
    /// Sets the positional arguments passed to the target.
    pub fn args<P>(mut self, args: impl IntoIterator<Item = P>) -> Self
    where
        P: Into<Param>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the keyword arguments passed to the target.
    pub fn kwargs<N, P>(mut self, kwargs: impl IntoIterator<Item = (N, P)>) -> Self
    where
        N: Into<String>,
        P: Into<Param>,
    {
        self.kwargs = kwargs
            .into_iter()
            .map(|(name, param)| (name.into(), param.into()))
            .collect();
        self
    }

    /// Declares prerequisite tasks. Duplicates are dropped.
    pub fn dependencies(mut self, dependencies: impl IntoIterator<Item = ScheduledTask>) -> Self {
        self.dependencies.clear();
        for dependency in dependencies {
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        self
    }

    /// Sets the execution priority; smaller values run earlier. Defaults to
    /// positive infinity.
    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    /// Declares how many additional processes the target spawns internally.
    pub fn processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    /// Declares how many additional threads the target spawns internally.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Estimated system processor usage, as a percentage.
    pub fn system_processor(mut self, percentage: f64) -> Self {
        self.system_processor = percentage;
        self
    }

    /// Estimated system memory usage, as a percentage.
    pub fn system_memory(mut self, percentage: f64) -> Self {
        self.system_memory = percentage;
        self
    }

    /// Estimated graphics processor usage, as a percentage.
    pub fn graphics_processor(mut self, percentage: f64) -> Self {
        self.graphics_processor = percentage;
        self
    }

    /// Estimated graphics memory usage, as a percentage.
    pub fn graphics_memory(mut self, percentage: f64) -> Self {
        self.graphics_memory = percentage;
        self
    }

    /// Whether the task's return value should survive into the final result.
    pub fn continual(mut self, continual: bool) -> Self {
        self.continual = continual;
        self
    }

    /// Validates the configuration and produces the immutable task.
    pub fn build(self) -> Result<ScheduledTask, ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.priority.is_nan() {
            return Err(ValidationError::PriorityNotANumber { task: self.name });
        }
        let resources = [
            ("system_processor", self.system_processor),
            ("system_memory", self.system_memory),
            ("graphics_processor", self.graphics_processor),
            ("graphics_memory", self.graphics_memory),
        ];
        for (resource, value) in resources {
            if !(0.0..=100.0).contains(&value) {
                return Err(ValidationError::ResourceOutOfRange {
                    task: self.name,
                    resource,
                    value,
                });
            }
        }

        let id = TaskId::from_name(&self.name);
        Ok(ScheduledTask {
            inner: Arc::new(TaskInner {
                kind: self.kind,
                name: self.name,
                id,
                target: self.target,
                args: self.args,
                kwargs: self.kwargs,
                dependencies: self.dependencies,
                priority: self.priority,
                processes: self.processes,
                threads: self.threads,
                system_processor: self.system_processor,
                system_memory: self.system_memory,
                graphics_processor: self.graphics_processor,
                graphics_memory: self.graphics_memory,
                continual: self.continual,
            }),
        })
    }
}

impl fmt::Debug for TaskBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBuilder")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_worker::native_fn;

    fn task(name: &str) -> ScheduledTask {
        scheduled_task(ExecutorKind::Thread, name, native_fn(|_| Ok(Value::Unit)))
            .build()
            .unwrap()
    }

    #[test]
    fn identity_is_the_name() {
        let first = task("same");
        let second = task("same");
        let other = task("other");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let built = task("defaults");
        assert_eq!(built.priority(), f64::INFINITY);
        assert_eq!(built.processes(), 0);
        assert_eq!(built.threads(), 0);
        assert_eq!(built.system_processor(), 0.0);
        assert!(!built.continual());
        assert!(built.args().is_empty());
        assert!(built.dependencies().is_empty());
    }

    #[test]
    fn empty_names_are_rejected() {
        let result = scheduled_task(ExecutorKind::Thread, "", native_fn(|_| Ok(Value::Unit)))
            .build();
        assert_eq!(result.unwrap_err(), ValidationError::EmptyName);
    }

    #[test]
    fn nan_priorities_are_rejected() {
        let result = scheduled_task(ExecutorKind::Thread, "t", native_fn(|_| Ok(Value::Unit)))
            .priority(f64::NAN)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ValidationError::PriorityNotANumber { .. }
        ));
    }

    #[test]
    fn resource_percentages_outside_the_range_are_rejected() {
        let result = scheduled_task(ExecutorKind::Thread, "t", native_fn(|_| Ok(Value::Unit)))
            .system_memory(120.0)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ValidationError::ResourceOutOfRange {
                resource: "system_memory",
                ..
            }
        ));
    }

    #[test]
    fn dependencies_deduplicate_by_identity() {
        let upstream = task("upstream");
        let alias = task("upstream");
        let built = scheduled_task(ExecutorKind::Thread, "t", native_fn(|_| Ok(Value::Unit)))
            .dependencies([upstream.clone(), alias, upstream])
            .build()
            .unwrap();
        assert_eq!(built.dependencies().len(), 1);
    }

    #[test]
    fn proxy_arguments_imply_prerequisites() {
        let producer = task("producer");
        let explicit = task("explicit");
        let consumer = scheduled_task(ExecutorKind::Thread, "consumer", native_fn(|_| Ok(Value::Unit)))
            .args([producer.return_value()])
            .kwargs([("again", producer.return_value())])
            .dependencies([explicit.clone()])
            .build()
            .unwrap();

        let producers = consumer.parameter_producers();
        assert_eq!(producers, vec![producer.clone()]);

        let prerequisites = consumer.prerequisites();
        assert_eq!(prerequisites, vec![explicit, producer]);
    }
}
