use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use smol_str::format_smolstr;

use crate::errors::{Entity, SiftError};
use crate::ir::operator::OrderByElement;
use crate::ir::relation::Type;
use crate::ir::{NodeId, Plan};

/// The kind of aggregate function.
///
/// Examples: avg, sum, count, ..
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum AggregateKind {
    AVG,
    COUNT,
    /// Internal aggregate picking the value of an arbitrary input row.
    /// Unlike the user-visible aggregates it produces no rows at all on
    /// an empty input instead of a single NULL row, so it can't be used
    /// to preserve the row count of a pruned aggregation.
    FIRSTROW,
    MAX,
    MIN,
    SUM,
}

impl Display for AggregateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregateKind::AVG => "avg",
            AggregateKind::COUNT => "count",
            AggregateKind::FIRSTROW => "first_row",
            AggregateKind::MAX => "max",
            AggregateKind::MIN => "min",
            AggregateKind::SUM => "sum",
        };
        write!(f, "{name}")
    }
}

impl AggregateKind {
    #[must_use]
    pub fn new(name: &str) -> Option<AggregateKind> {
        let normalized = name.to_lowercase();
        match normalized.as_str() {
            "avg" => Some(AggregateKind::AVG),
            "count" => Some(AggregateKind::COUNT),
            "first_row" => Some(AggregateKind::FIRSTROW),
            "max" => Some(AggregateKind::MAX),
            "min" => Some(AggregateKind::MIN),
            "sum" => Some(AggregateKind::SUM),
            _ => None,
        }
    }
}

impl From<AggregateKind> for Type {
    fn from(aggregate_kind: AggregateKind) -> Self {
        match aggregate_kind {
            AggregateKind::COUNT => Type::Unsigned,
            AggregateKind::SUM | AggregateKind::AVG => Type::Decimal,
            AggregateKind::MIN | AggregateKind::MAX | AggregateKind::FIRSTROW => Type::Scalar,
        }
    }
}

/// Aggregate function of an aggregation node.
///
/// The descriptor owns its argument expressions and the optional
/// ordering of the aggregated rows (e.g. for order-sensitive
/// aggregates over sorted input).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AggregateFunction {
    /// The aggregate kind, like COUNT.
    pub kind: AggregateKind,
    /// Argument expression node ids.
    pub args: Vec<NodeId>,
    /// Ordering of the input rows.
    pub order_by: Vec<OrderByElement>,
    /// Type of the aggregate result, retained over the rewrites.
    pub ret_type: Type,
}

impl Plan {
    /// Build an aggregate function descriptor.
    ///
    /// `FIRST_ROW` retains the type of its argument, the other kinds
    /// derive the result type from the aggregate kind.
    ///
    /// # Errors
    /// - wrong number of arguments for the aggregate
    /// - an argument is not an expression node
    pub fn new_aggregate_function(
        &self,
        kind: AggregateKind,
        args: Vec<NodeId>,
    ) -> Result<AggregateFunction, SiftError> {
        if args.len() != 1 {
            return Err(SiftError::UnexpectedNumberOfValues(format_smolstr!(
                "aggregate {kind} expects a single argument, got {}",
                args.len()
            )));
        }
        let ret_type = match kind {
            AggregateKind::FIRSTROW => {
                let arg = args.first().ok_or_else(|| {
                    SiftError::Invalid(Entity::Aggregate, Some("missing argument".into()))
                })?;
                self.calculate_expr_type(*arg)?
            }
            _ => Type::from(kind),
        };
        Ok(AggregateFunction {
            kind,
            args,
            order_by: Vec::new(),
            ret_type,
        })
    }

    /// Check if any argument of the aggregate has side effects.
    ///
    /// # Errors
    /// - some of the argument nodes are not expressions
    pub fn aggregate_has_side_effects(&self, agg: &AggregateFunction) -> Result<bool, SiftError> {
        self.exprs_have_side_effects(&agg.args)
    }
}
