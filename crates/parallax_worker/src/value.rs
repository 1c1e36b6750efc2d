//! Dynamic values exchanged between tasks.

use crate::TaskError;
use anyhow::{anyhow, bail};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The type of callables invoked as task targets, and of callable [`Value`]s.
pub type NativeFn = Arc<dyn Fn(CallArgs) -> Result<Value, TaskError> + Send + Sync>;

/// Wraps the given closure into a [`NativeFn`].
pub fn native_fn<F>(function: F) -> NativeFn
where
    F: Fn(CallArgs) -> Result<Value, TaskError> + Send + Sync + 'static,
{
    Arc::new(function)
}

/// Positional and keyword arguments passed to a [`NativeFn`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>, kwargs: BTreeMap<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Creates arguments holding only the given positional values.
    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Returns the positional argument at the given index.
    pub fn arg(&self, index: usize) -> Result<&Value, TaskError> {
        self.args
            .get(index)
            .ok_or_else(|| anyhow!("missing positional argument {index}"))
    }

    /// Returns the keyword argument with the given name.
    pub fn kwarg(&self, name: &str) -> Result<&Value, TaskError> {
        self.kwargs
            .get(name)
            .ok_or_else(|| anyhow!("missing keyword argument {name:?}"))
    }
}

/// A dynamically typed value produced or consumed by a task.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
    Func(NativeFn),
}

impl Value {
    /// Creates a list value from the given elements.
    pub fn list(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::List(elements.into_iter().collect())
    }

    /// Creates a record value from the given fields.
    pub fn record<N>(fields: impl IntoIterator<Item = (N, Value)>) -> Self
    where
        N: Into<String>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Invokes the value with the given arguments.
    ///
    /// Fails unless the value is callable.
    pub fn call(&self, arguments: CallArgs) -> Result<Value, TaskError> {
        match self {
            Self::Func(function) => function(arguments),
            other => bail!("value of type {} is not callable", other.type_name()),
        }
    }

    /// Returns the named field of a record value.
    pub fn attr(&self, name: &str) -> Result<Value, TaskError> {
        match self {
            Self::Record(fields) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("record has no field named {name:?}")),
            other => bail!("value of type {} has no fields", other.type_name()),
        }
    }

    /// Returns the element selected by the given key: an integer position
    /// within a list, or a string key within a record.
    pub fn index(&self, key: &Value) -> Result<Value, TaskError> {
        match (self, key) {
            (Self::List(elements), Value::Int(position)) => {
                let position = usize::try_from(*position)
                    .map_err(|_| anyhow!("negative list index {position}"))?;
                elements.get(position).cloned().ok_or_else(|| {
                    anyhow!(
                        "list index {position} is out of bounds (length {})",
                        elements.len()
                    )
                })
            }
            (Self::Record(fields), Value::Str(name)) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("record has no entry for key {name:?}")),
            (value, key) => bail!(
                "value of type {} cannot be indexed with {}",
                value.type_name(),
                key.type_name()
            ),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Record(_) => "record",
            Self::Func(_) => "func",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Func(a), Self::Func(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Self::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Self::List(elements) => f.debug_tuple("List").field(elements).finish(),
            Self::Record(fields) => f.debug_tuple("Record").field(fields).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Self::List(elements)
    }
}

impl From<NativeFn> for Value {
    fn from(function: NativeFn) -> Self {
        Self::Func(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexing_a_list_by_position_works() {
        let list = Value::list([Value::Int(10), Value::Int(20), Value::Int(30)]);
        assert_eq!(list.index(&Value::Int(1)).unwrap(), Value::Int(20));
    }

    #[test]
    fn indexing_a_list_out_of_bounds_fails() {
        let list = Value::list([Value::Int(10)]);
        assert!(list.index(&Value::Int(3)).is_err());
        assert!(list.index(&Value::Int(-1)).is_err());
    }

    #[test]
    fn indexing_a_record_by_key_works() {
        let record = Value::record([("k", Value::Int(7))]);
        assert_eq!(record.index(&Value::Str("k".into())).unwrap(), Value::Int(7));
        assert!(record.index(&Value::Str("missing".into())).is_err());
    }

    #[test]
    fn indexing_with_a_mismatched_key_type_fails() {
        let list = Value::list([Value::Int(10)]);
        assert!(list.index(&Value::Str("k".into())).is_err());
    }

    #[test]
    fn field_access_on_a_record_works() {
        let record = Value::record([("inner", Value::Bool(true))]);
        assert_eq!(record.attr("inner").unwrap(), Value::Bool(true));
        assert!(record.attr("other").is_err());
        assert!(Value::Int(1).attr("inner").is_err());
    }

    #[test]
    fn calling_a_callable_value_works() {
        let doubler = Value::Func(native_fn(|call| {
            let value = call.arg(0)?.as_int().unwrap_or(0);
            Ok(Value::Int(value * 2))
        }));
        let result = doubler
            .call(CallArgs::positional([Value::Int(21)]))
            .unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn calling_a_plain_value_fails() {
        assert!(Value::Int(1).call(CallArgs::default()).is_err());
    }

    #[test]
    fn equality_ignores_function_contents_but_respects_identity() {
        let function = native_fn(|_| Ok(Value::Unit));
        assert_eq!(
            Value::Func(Arc::clone(&function)),
            Value::Func(Arc::clone(&function))
        );
        assert_ne!(
            Value::Func(function),
            Value::Func(native_fn(|_| Ok(Value::Unit)))
        );
    }
}
