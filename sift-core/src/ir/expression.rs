//! Expression module.
//!
//! Expressions are the building blocks of the operator payloads:
//! projection outputs, selection filters, join conditions, grouping
//! and ordering keys. They form trees over output columns, constants,
//! correlated columns and scalar functions, stored in the same arena
//! as the relational nodes.

use std::hash::{BuildHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use traversal::DftPost;

use crate::errors::SiftError;
use crate::ir::helpers::RepeatableState;
use crate::ir::relation::Type;
use crate::ir::schema::Column;
use crate::ir::value::Value;
use crate::ir::{Node, NodeId, Nodes, Plan};

/// Scalar function updating a session variable.
pub const FUNC_SET_VAR: &str = "set_var";
/// Scalar function suspending the executor fiber.
pub const FUNC_SLEEP: &str = "sleep";

/// Scalar functions whose value can change between two evaluations
/// with the same arguments. They never count as runtime constants.
const UNFOLDABLE_FUNCTIONS: [&str; 4] = ["rand", "uuid", FUNC_SET_VAR, FUNC_SLEEP];

/// Expression tree build blocks.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Expression {
    /// Reference to an output column of some operator below.
    ///
    /// Example: `"a"`.
    ColumnRef {
        /// Referred column.
        col: Column,
    },
    /// Constant expressions.
    ///
    /// Example: `42`.
    Constant {
        /// Contained value (boolean, number, string or null).
        value: Value,
    },
    /// Reference to a column of the outer query block, captured
    /// by a correlated subtree. Behaves as a per-row constant
    /// inside the subtree that owns it.
    CorColumnRef {
        /// Referred outer column.
        col: Column,
    },
    /// Scalar function application. Boolean and arithmetic operators
    /// are ordinary functions here (`eq`, `lt`, `add`, ...), which
    /// keeps the payload walks uniform.
    ScalarFunction {
        /// Function name, lowercase.
        name: SmolStr,
        /// Argument expression node ids.
        children: Vec<NodeId>,
        /// Function return type.
        func_type: Type,
    },
}

impl Nodes {
    /// Add a constant node to the arena.
    pub fn add_const(&mut self, value: Value) -> NodeId {
        self.push(Node::Expression(Expression::Constant { value }))
    }

    /// Add a column reference node to the arena.
    pub fn add_column_ref(&mut self, col: Column) -> NodeId {
        self.push(Node::Expression(Expression::ColumnRef { col }))
    }

    /// Add a correlated column reference node to the arena.
    pub fn add_cor_column_ref(&mut self, col: Column) -> NodeId {
        self.push(Node::Expression(Expression::CorColumnRef { col }))
    }

    /// Add a scalar function node to the arena.
    pub fn add_scalar_function(
        &mut self,
        name: &str,
        children: Vec<NodeId>,
        func_type: Type,
    ) -> NodeId {
        self.push(Node::Expression(Expression::ScalarFunction {
            name: SmolStr::from(name),
            children,
            func_type,
        }))
    }
}

impl Plan {
    /// Add a constant node to the plan.
    pub fn add_const(&mut self, value: Value) -> NodeId {
        self.nodes.add_const(value)
    }

    /// Add a column reference node to the plan.
    pub fn add_column_ref(&mut self, col: Column) -> NodeId {
        self.nodes.add_column_ref(col)
    }

    /// Add a correlated column reference node to the plan.
    pub fn add_cor_column_ref(&mut self, col: Column) -> NodeId {
        self.nodes.add_cor_column_ref(col)
    }

    /// Add a scalar function node to the plan.
    pub fn add_scalar_function(
        &mut self,
        name: &str,
        children: Vec<NodeId>,
        func_type: Type,
    ) -> NodeId {
        self.nodes.add_scalar_function(name, children, func_type)
    }

    /// Add the integer constant `1` to the arena.
    ///
    /// The constant is the canonical filler of the cardinality-preserving
    /// placeholders: repaired projections, synthetic aggregates and
    /// grouping lists emptied by pruning.
    pub fn add_const_one(&mut self) -> NodeId {
        self.nodes.add_const(Value::Unsigned(1))
    }

    /// Collect all column references of the expression subtree.
    ///
    /// Returns the multiset of the referred columns in the post-order
    /// of the walk. Correlated columns are not column references and
    /// are not collected.
    ///
    /// # Errors
    /// - the node is not an expression
    pub fn extract_columns(&self, top_id: NodeId) -> Result<Vec<Column>, SiftError> {
        self.get_expression_node(top_id)?;
        let mut columns: Vec<Column> = Vec::new();
        let subtree = DftPost::new(&top_id, |node| self.nodes.expr_iter(node));
        for (_, id) in subtree {
            if let Node::Expression(Expression::ColumnRef { col }) = self.get_node(*id)? {
                columns.push(*col);
            }
        }
        Ok(columns)
    }

    /// Append the column references of every expression to the seed list.
    ///
    /// # Errors
    /// - some of the nodes are not expressions
    pub fn extract_columns_from_expressions(
        &self,
        mut seed: Vec<Column>,
        exprs: &[NodeId],
    ) -> Result<Vec<Column>, SiftError> {
        for expr_id in exprs {
            seed.extend(self.extract_columns(*expr_id)?);
        }
        Ok(seed)
    }

    /// Check if the expression subtree contains a `set_var` or `sleep`
    /// scalar function. Such expressions must survive pruning even when
    /// nothing upstream reads their output.
    ///
    /// # Errors
    /// - the node is not an expression
    pub fn expr_has_side_effects(&self, top_id: NodeId) -> Result<bool, SiftError> {
        self.get_expression_node(top_id)?;
        let subtree = DftPost::new(&top_id, |node| self.nodes.expr_iter(node));
        for (_, id) in subtree {
            if let Node::Expression(Expression::ScalarFunction { name, .. }) = self.get_node(*id)? {
                if name == FUNC_SET_VAR || name == FUNC_SLEEP {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Check if any of the expressions has side effects.
    ///
    /// # Errors
    /// - some of the nodes are not expressions
    pub fn exprs_have_side_effects(&self, exprs: &[NodeId]) -> Result<bool, SiftError> {
        for expr_id in exprs {
            if self.expr_has_side_effects(*expr_id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Check if the expression can be viewed as a constant during a single
    /// execution: a literal, a correlated column or a deterministic closed
    /// function over such expressions. Note that we can't treat the
    /// expressions containing non-deterministic functions (e.g. `rand()`)
    /// as constants.
    ///
    /// # Errors
    /// - the node is not an expression
    pub fn is_runtime_const_expr(&self, top_id: NodeId) -> Result<bool, SiftError> {
        match self.get_expression_node(top_id)? {
            Expression::Constant { .. } | Expression::CorColumnRef { .. } => Ok(true),
            Expression::ColumnRef { .. } => Ok(false),
            Expression::ScalarFunction { name, children, .. } => {
                if UNFOLDABLE_FUNCTIONS.contains(&name.as_str()) {
                    return Ok(false);
                }
                for child in children {
                    if !self.is_runtime_const_expr(*child)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Derive the type of the expression.
    ///
    /// # Errors
    /// - the node is not an expression
    pub fn calculate_expr_type(&self, top_id: NodeId) -> Result<Type, SiftError> {
        let r#type = match self.get_expression_node(top_id)? {
            Expression::ColumnRef { col } | Expression::CorColumnRef { col } => col.r#type,
            Expression::Constant { value } => value.data_type(),
            Expression::ScalarFunction { func_type, .. } => *func_type,
        };
        Ok(r#type)
    }
}

/// The maximum depth of the expression subtrees taken into account
/// while hashing.
pub const EXPR_HASH_DEPTH: usize = 10;

/// Structural comparison and hashing of the expression subtrees.
pub struct Comparator<'plan> {
    plan: &'plan Plan,
}

impl<'plan> Comparator<'plan> {
    #[must_use]
    pub fn new(plan: &'plan Plan) -> Self {
        Comparator { plan }
    }

    /// Hash the expression subtree structure into the state.
    ///
    /// The hash is type-aware: two subtrees of the same shape but of the
    /// different types (a function returning integer vs the same function
    /// casted to string) produce different hashes.
    pub fn hash_for_expr<H: Hasher>(&self, top: NodeId, state: &mut H, depth: usize) {
        if depth == 0 {
            return;
        }
        let Ok(node) = self.plan.get_expression_node(top) else {
            return;
        };
        match node {
            Expression::ColumnRef { col } => {
                col.id.hash(state);
                col.r#type.hash(state);
            }
            Expression::Constant { value } => {
                value.hash(state);
            }
            Expression::CorColumnRef { col } => {
                "correlated".hash(state);
                col.id.hash(state);
                col.r#type.hash(state);
            }
            Expression::ScalarFunction {
                name,
                children,
                func_type,
            } => {
                func_type.hash(state);
                name.hash(state);
                for child in children {
                    self.hash_for_expr(*child, state, depth - 1);
                }
            }
        }
    }

    /// Structural hash of the expression subtree.
    ///
    /// The hasher state is repeatable, so the results can be compared
    /// between the plan copies and between the test runs.
    #[must_use]
    pub fn expr_hash(&self, top: NodeId) -> u64 {
        let mut state = RepeatableState.build_hasher();
        self.hash_for_expr(top, &mut state, EXPR_HASH_DEPTH);
        state.finish()
    }
}

#[cfg(test)]
mod tests;
