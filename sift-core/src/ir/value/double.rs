//! Double type module.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::format_smolstr;

use crate::errors::{Entity, SiftError};

/// Wrapper over the float64 type to support hashing.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Double {
    pub value: f64,
}

impl Eq for Double {}

#[allow(clippy::derived_hash_with_manual_eq)]
impl Hash for Double {
    /// We get hash from the internal float64 bit representation.
    /// As a side effect, `hash(NaN) == hash(NaN)` is true. We
    /// should manually care about this case in the code.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.to_bits().hash(state);
    }
}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<f64> for Double {
    fn from(f: f64) -> Self {
        Double { value: f }
    }
}

impl FromStr for Double {
    type Err = SiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Double {
            value: s.parse::<f64>().map_err(|_| {
                SiftError::Invalid(Entity::Type, Some(format_smolstr!("{s} is not a valid f64")))
            })?,
        })
    }
}
