//! Deferred references to task return values.

use crate::task::ScheduledTask;
use parallax_worker::{CallArgs, TaskError, Value};
use std::collections::BTreeMap;

/// A single deferred transformation applied to a produced value when the
/// consuming task launches.
#[derive(Clone, Debug)]
pub enum Transform {
    /// Invoke the value with the recorded arguments.
    Call {
        args: Vec<Value>,
        kwargs: BTreeMap<String, Value>,
    },
    /// Replace the value with its named field.
    Attr { name: String },
    /// Replace the value with the element at the key.
    Index { key: Value },
}

impl Transform {
    /// Applies the transformation to the given value.
    pub(crate) fn apply(&self, value: &Value) -> Result<Value, TaskError> {
        match self {
            Self::Call { args, kwargs } => value.call(CallArgs::new(args.clone(), kwargs.clone())),
            Self::Attr { name } => value.attr(name),
            Self::Index { key } => value.index(key),
        }
    }
}

/// A placeholder for the eventual return value of another task.
///
/// The proxy records a chain of transformations without evaluating anything;
/// the chain is interpreted against the producer's stored return value just
/// before the consuming task launches. Using a proxy as an argument of
/// another task implicitly makes the producer a prerequisite of that task.
#[derive(Clone, Debug)]
pub struct ReturnProxy {
    producer: ScheduledTask,
    transforms: Vec<Transform>,
}

impl ReturnProxy {
    pub(crate) fn new(producer: ScheduledTask) -> Self {
        Self {
            producer,
            transforms: Vec::new(),
        }
    }

    /// The task whose return value this proxy stands for.
    pub fn producer(&self) -> &ScheduledTask {
        &self.producer
    }

    /// The recorded transformations, in application order.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Appends an invocation of the value with the given arguments.
    pub fn call<A, N, K>(
        mut self,
        args: impl IntoIterator<Item = A>,
        kwargs: impl IntoIterator<Item = (N, K)>,
    ) -> Self
    where
        A: Into<Value>,
        N: Into<String>,
        K: Into<Value>,
    {
        self.transforms.push(Transform::Call {
            args: args.into_iter().map(Into::into).collect(),
            kwargs: kwargs
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        });
        self
    }

    /// Appends an access of the named field of the value.
    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.transforms.push(Transform::Attr { name: name.into() });
        self
    }

    /// Appends a lookup of the element at the given key.
    pub fn index(mut self, key: impl Into<Value>) -> Self {
        self.transforms.push(Transform::Index { key: key.into() });
        self
    }
}
