// fwgen-schema - validators, schema combinators and the symbol registry
//
// A validator turns an untyped `Value` into a normalized `Setting`, recording
// every problem in the shared report. Mapping schemas compose validators and
// keep going past a failing key so one run shows every mistake.

pub mod blocks;
pub mod context;
pub mod cv;
pub mod error;
pub mod schema;
pub mod symbols;

pub use context::{Context, Invalid, Rejected};
pub use error::SchemaError;
pub use schema::{Check, KeyRule, Schema};
pub use symbols::{IdType, InstanceId, SymbolTable};

use fwgen_diagnostics::{ConfigPath, ValidationReport};
use fwgen_value::{Setting, Value};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Shape of the values a validator produces, used to detect conflicting
/// option types when schemas are merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Any,
    Bool,
    Int,
    Float,
    String,
    Enum,
    Duration,
    Byte,
    DeclareId(&'static str),
    UseId(&'static str),
    List(Box<ValueType>),
    Map,
    Lambda,
}

impl ValueType {
    /// Types are compatible when equal or when either side accepts anything
    pub fn compatible(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Any, _) | (_, ValueType::Any) => true,
            (ValueType::List(a), ValueType::List(b)) => a.compatible(b),
            (a, b) => a == b,
        }
    }

    /// The more specific of two compatible types
    pub fn meet(&self, other: &ValueType) -> Option<ValueType> {
        match (self, other) {
            (ValueType::Any, t) | (t, ValueType::Any) => Some(t.clone()),
            (ValueType::List(a), ValueType::List(b)) => {
                a.meet(b).map(|t| ValueType::List(Box::new(t)))
            }
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Bool => write!(f, "boolean"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
            ValueType::Enum => write!(f, "enum"),
            ValueType::Duration => write!(f, "duration"),
            ValueType::Byte => write!(f, "byte"),
            ValueType::DeclareId(class) => write!(f, "declare_id({})", class),
            ValueType::UseId(class) => write!(f, "use_id({})", class),
            ValueType::List(item) => write!(f, "list[{}]", item),
            ValueType::Map => write!(f, "mapping"),
            ValueType::Lambda => write!(f, "lambda"),
        }
    }
}

/// A value validator
pub trait Validate: Send + Sync {
    /// Normalize `value`, or record why it is wrong and return `Rejected`
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected>;

    fn value_type(&self) -> ValueType;

    /// Stable textual signature
    fn describe(&self) -> String {
        self.value_type().to_string()
    }
}

/// Shared, immutable validator handle
#[derive(Clone)]
pub struct Validator(Arc<dyn Validate>);

impl Validator {
    pub fn new(inner: impl Validate + 'static) -> Self {
        Self(Arc::new(inner))
    }
}

impl Deref for Validator {
    type Target = dyn Validate;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validator({})", self.describe())
    }
}

impl<T: Validate + 'static> From<T> for Validator {
    fn from(inner: T) -> Self {
        Validator::new(inner)
    }
}

/// Validate a standalone value against a throwaway symbol table
pub fn check(validator: &dyn Validate, value: &Value) -> Result<Setting, ValidationReport> {
    let mut symbols = SymbolTable::new();
    check_with(validator, value, &mut symbols, InstanceId(0))
}

/// Validate a value as instance `owner`, declaring ids into `symbols`
pub fn check_with(
    validator: &dyn Validate,
    value: &Value,
    symbols: &mut SymbolTable,
    owner: InstanceId,
) -> Result<Setting, ValidationReport> {
    let mut report = ValidationReport::new();
    let result = {
        let mut cx = Context::new(ConfigPath::root(), &mut report, symbols, owner);
        validator.validate(value, &mut cx)
    };
    match result {
        Ok(setting) if !report.has_errors() => Ok(setting),
        _ => Err(report),
    }
}
