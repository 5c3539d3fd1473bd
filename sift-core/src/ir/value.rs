//! Value module.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::ir::relation::Type;
use crate::ir::value::double::Double;

pub mod double;

/// SQL-like value of the plan constants.
#[derive(Clone, Debug, Deserialize, Hash, PartialEq, Serialize)]
pub enum Value {
    /// Boolean type.
    Boolean(bool),
    /// Floating point type.
    Double(Double),
    /// Signed integer type.
    Integer(i64),
    /// SQL NULL (unknown in the terms of three-valued logic).
    Null,
    /// String type.
    String(SmolStr),
    /// Unsigned integer type.
    Unsigned(u64),
}

/// `PartialEq` on the `Double` wrapper never returns `true` for NaN,
/// so the equivalence contract holds for all the values we can build
/// from the plan tree.
impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Null => write!(f, "NULL"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Unsigned(v) => write!(f, "{v}"),
        }
    }
}

impl Value {
    /// Type of the value, as observed by the planner.
    #[must_use]
    pub fn data_type(&self) -> Type {
        match self {
            Value::Boolean(_) => Type::Boolean,
            Value::Double(_) => Type::Double,
            Value::Integer(_) => Type::Integer,
            Value::Null => Type::Null,
            Value::String(_) => Type::String,
            Value::Unsigned(_) => Type::Unsigned,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(Double::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(SmolStr::from(v))
    }
}
