//! Resolution of proxy arguments at launch time.

use crate::proxy::ReturnProxy;
use crate::task::{Param, ScheduledTask};
use anyhow::anyhow;
use parallax_worker::{CallArgs, SharedStateRegistry, TaskError, Value};
use std::collections::BTreeMap;

/// Resolves every proxy argument of a task against the producing tasks'
/// stored return values, just before launch.
///
/// The scheduling loop only launches a task once all prerequisites are
/// complete, so each producer's return value is present for a non-cancelled
/// chain; a transformation can still fail when the produced value has the
/// wrong shape, in which case the error is surfaced as the consuming task's
/// failure.
#[derive(Debug)]
pub(crate) struct ParameterBinder<'a> {
    registry: &'a SharedStateRegistry,
}

impl<'a> ParameterBinder<'a> {
    pub fn new(registry: &'a SharedStateRegistry) -> Self {
        Self { registry }
    }

    /// Produces the concrete invocation arguments for the task.
    pub fn bind(&self, task: &ScheduledTask) -> Result<CallArgs, TaskError> {
        let args = task
            .args()
            .iter()
            .map(|param| self.resolve(param))
            .collect::<Result<Vec<_>, _>>()?;
        let kwargs = task
            .kwargs()
            .iter()
            .map(|(name, param)| Ok((name.clone(), self.resolve(param)?)))
            .collect::<Result<BTreeMap<_, _>, TaskError>>()?;
        Ok(CallArgs::new(args, kwargs))
    }

    fn resolve(&self, param: &Param) -> Result<Value, TaskError> {
        match param {
            Param::Value(value) => Ok(value.clone()),
            Param::Proxy(proxy) => self.resolve_proxy(proxy),
        }
    }

    fn resolve_proxy(&self, proxy: &ReturnProxy) -> Result<Value, TaskError> {
        let producer = proxy.producer();
        let state = self
            .registry
            .get(producer.id())
            .ok_or_else(|| anyhow!("no state record for task '{}'", producer.name()))?;
        let mut value = state
            .return_value()
            .ok_or_else(|| anyhow!("task '{}' has no stored return value", producer.name()))?;

        for transform in proxy.transforms() {
            value = transform.apply(&value).map_err(|error| {
                error.context(format!(
                    "transforming the return value of task '{}'",
                    producer.name()
                ))
            })?;
        }
        Ok(value)
    }
}
