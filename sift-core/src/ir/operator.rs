//! Relational operators module.
//!
//! Contains the operator nodes that transform the tuples in the IR tree
//! and the `Plan` methods constructing them.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use smol_str::{format_smolstr, SmolStr};
use traversal::DftPost;

use crate::errors::{Entity, SiftError};
use crate::ir::aggregates::AggregateFunction;
use crate::ir::expression::Expression;
use crate::ir::relation::{ColumnDef, TableKind, Type};
use crate::ir::schema::{Column, Schema};
use crate::ir::tree::EMPTY_CHILDREN;
use crate::ir::{Node, NodeId, Plan};

/// Type of the join operator.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    /// Left tuples with at least one match on the right.
    Semi,
    /// Left tuples without matches on the right.
    AntiSemi,
    /// All the left tuples, with the match flag appended as an extra
    /// boolean column at the end of the output.
    LeftOuterSemi,
    /// Same as `LeftOuterSemi` with the flag negated.
    AntiLeftOuterSemi,
}

impl JoinKind {
    /// Whether the join emits the boolean match-flag column as the last
    /// column of its output.
    #[must_use]
    pub fn appends_mark_column(&self) -> bool {
        matches!(self, JoinKind::LeftOuterSemi | JoinKind::AntiLeftOuterSemi)
    }
}

impl Display for JoinKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinKind::Inner => "inner",
            JoinKind::LeftOuter => "left outer",
            JoinKind::RightOuter => "right outer",
            JoinKind::Semi => "semi",
            JoinKind::AntiSemi => "anti semi",
            JoinKind::LeftOuterSemi => "left outer semi",
            JoinKind::AntiLeftOuterSemi => "anti left outer semi",
        };
        write!(f, "{name}")
    }
}

/// Type of the row lock requested by the query.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// `SELECT ... FOR SHARE`.
    Share,
    /// `SELECT ... FOR UPDATE`.
    ForUpdate,
    /// `SELECT ... FOR UPDATE NOWAIT`.
    ForUpdateNoWait,
}

impl LockKind {
    #[must_use]
    pub fn is_select_for_update(&self) -> bool {
        matches!(self, LockKind::ForUpdate | LockKind::ForUpdateNoWait)
    }
}

/// Ordering direction.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderByType {
    Asc,
    Desc,
}

/// Element of an ordering key list (ORDER BY, TOP N, aggregate ordering).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct OrderByElement {
    /// Ordering expression node id.
    pub expr: NodeId,
    /// Ordering direction.
    pub order: OrderByType,
}

/// Plain-column sort item of a window node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SortColumn {
    pub col: Column,
    pub order: OrderByType,
}

/// Window function descriptor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WindowFunction {
    /// Function name, lowercase.
    pub name: SmolStr,
    /// Argument expression node ids.
    pub args: Vec<NodeId>,
    /// Type of the function result.
    pub ret_type: Type,
}

/// Row identifier exposed by a scan: either a single integer column
/// or a tuple of the primary key columns.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HandleCols {
    Int(Column),
    Common(Vec<Column>),
}

impl HandleCols {
    #[must_use]
    pub fn is_int(&self) -> bool {
        matches!(self, HandleCols::Int(_))
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        match self {
            HandleCols::Int(col) => std::slice::from_ref(col),
            HandleCols::Common(cols) => cols.as_slice(),
        }
    }

    #[must_use]
    pub fn col(&self, position: usize) -> Option<&Column> {
        self.columns().get(position)
    }
}

/// Relational operators of the plan tree.
///
/// Every node owns its children (stored as arena pointers), the
/// kind-specific payload and, for the schema-producing operators,
/// the output schema. Pass-through operators (selection, ordering,
/// locking) expose the schema of their child instead.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Relational {
    /// Scan of a storage table (the plan leaf).
    ScanRelation {
        /// Table name in the plan catalog.
        relation: SmolStr,
        /// Catalog columns, position-parallel to the output schema.
        columns: Vec<ColumnDef>,
        /// All the filters pushed down to the storage layer.
        filters: Vec<NodeId>,
        /// Row identifier of the scan, when the table exposes one.
        handle: Option<HandleCols>,
        output: Schema,
    },
    /// Scan of an in-memory system table.
    ScanSystem {
        /// System table name.
        table: SmolStr,
        /// Catalog columns, position-parallel to the output schema.
        columns: Vec<ColumnDef>,
        /// Output column names, position-parallel to the output schema.
        names: Vec<SmolStr>,
        output: Schema,
    },
    /// Leaf producing a fixed number of rows without touching storage.
    ScanDual {
        row_count: u64,
        output: Schema,
    },
    Projection {
        /// Single child.
        children: Vec<NodeId>,
        /// Output expressions, position-parallel to the output schema.
        expressions: Vec<NodeId>,
        output: Schema,
    },
    Selection {
        /// Single child.
        children: Vec<NodeId>,
        /// Filter expressions, implicitly AND-ed.
        filters: Vec<NodeId>,
    },
    /// Aggregation, either grouped (`gr_exprs` is not empty) or total.
    GroupBy {
        /// Single child.
        children: Vec<NodeId>,
        /// Aggregate functions, position-parallel to the output schema.
        aggregates: Vec<AggregateFunction>,
        /// Grouping expressions.
        gr_exprs: Vec<NodeId>,
        output: Schema,
    },
    OrderBy {
        /// Single child.
        children: Vec<NodeId>,
        order_by: Vec<OrderByElement>,
    },
    /// Fused ORDER BY + LIMIT.
    TopN {
        /// Single child.
        children: Vec<NodeId>,
        order_by: Vec<OrderByElement>,
        limit: u64,
        offset: u64,
    },
    Limit {
        /// Single child.
        children: Vec<NodeId>,
        limit: u64,
        offset: u64,
        /// Cached output schema. `None` means "same as the child":
        /// the cache is dropped when the child changes under the node
        /// and repopulated by the inline projection.
        output: Option<Schema>,
    },
    Window {
        /// Single child.
        children: Vec<NodeId>,
        /// Window function descriptors. The functions produce the last
        /// `functions.len()` columns of the output schema, appended
        /// after the child columns.
        functions: Vec<WindowFunction>,
        partition_by: Vec<Column>,
        order_by: Vec<SortColumn>,
        output: Schema,
    },
    UnionAll {
        /// Two or more children with position-aligned schemas.
        children: Vec<NodeId>,
        output: Schema,
    },
    /// Merge of the in-transaction changes into the child scan.
    UnionScan {
        /// Single child.
        children: Vec<NodeId>,
        handle: Option<HandleCols>,
        filters: Vec<NodeId>,
    },
    Join {
        /// Left and right children.
        children: Vec<NodeId>,
        kind: JoinKind,
        /// Equi-join conditions.
        equal_conditions: Vec<NodeId>,
        /// Conditions over the left child only.
        left_conditions: Vec<NodeId>,
        /// Conditions over the right child only.
        right_conditions: Vec<NodeId>,
        /// The rest of the join conditions.
        other_conditions: Vec<NodeId>,
        output: Schema,
    },
    /// Join whose right subtree re-evaluates per left row, referring
    /// to the left output through correlated columns.
    Apply {
        /// Left and right children.
        children: Vec<NodeId>,
        kind: JoinKind,
        equal_conditions: Vec<NodeId>,
        left_conditions: Vec<NodeId>,
        right_conditions: Vec<NodeId>,
        other_conditions: Vec<NodeId>,
        /// Correlated columns of the right subtree resolved against
        /// the left child output.
        correlated: Vec<Column>,
        output: Schema,
    },
    /// Row-locking wrapper over the child.
    Lock {
        /// Single child.
        children: Vec<NodeId>,
        kind: LockKind,
        /// Row identifiers to lock, grouped by the table id.
        handles: HashMap<u64, Vec<HandleCols>>,
        /// Partition-id columns required to route the locks when
        /// partitioned tables are involved.
        partition_id_columns: Vec<Column>,
        /// Names of the partitioned tables under the lock.
        partitioned_tables: Vec<SmolStr>,
    },
}

impl Relational {
    /// Children of the relational node (empty for the leaves).
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        match self {
            Relational::ScanRelation { .. }
            | Relational::ScanSystem { .. }
            | Relational::ScanDual { .. } => EMPTY_CHILDREN,
            Relational::Projection { children, .. }
            | Relational::Selection { children, .. }
            | Relational::GroupBy { children, .. }
            | Relational::OrderBy { children, .. }
            | Relational::TopN { children, .. }
            | Relational::Limit { children, .. }
            | Relational::Window { children, .. }
            | Relational::UnionAll { children, .. }
            | Relational::UnionScan { children, .. }
            | Relational::Join { children, .. }
            | Relational::Apply { children, .. }
            | Relational::Lock { children, .. } => children,
        }
    }

    /// Name of the node variant (for the error messages).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Relational::ScanRelation { .. } => "ScanRelation",
            Relational::ScanSystem { .. } => "ScanSystem",
            Relational::ScanDual { .. } => "ScanDual",
            Relational::Projection { .. } => "Projection",
            Relational::Selection { .. } => "Selection",
            Relational::GroupBy { .. } => "GroupBy",
            Relational::OrderBy { .. } => "OrderBy",
            Relational::TopN { .. } => "TopN",
            Relational::Limit { .. } => "Limit",
            Relational::Window { .. } => "Window",
            Relational::UnionAll { .. } => "UnionAll",
            Relational::UnionScan { .. } => "UnionScan",
            Relational::Join { .. } => "Join",
            Relational::Apply { .. } => "Apply",
            Relational::Lock { .. } => "Lock",
        }
    }

    /// Top-level payload expression ids of the node: everything an
    /// expression walk over the node has to visit (filters, outputs,
    /// grouping and ordering keys, aggregate and window arguments).
    #[must_use]
    pub fn expression_ids(&self) -> Vec<NodeId> {
        match self {
            Relational::ScanRelation { filters, .. }
            | Relational::Selection { filters, .. }
            | Relational::UnionScan { filters, .. } => filters.clone(),
            Relational::ScanSystem { .. }
            | Relational::ScanDual { .. }
            | Relational::Limit { .. }
            | Relational::UnionAll { .. }
            | Relational::Lock { .. } => Vec::new(),
            Relational::Projection { expressions, .. } => expressions.clone(),
            Relational::GroupBy {
                aggregates,
                gr_exprs,
                ..
            } => {
                let mut ids = gr_exprs.clone();
                for agg in aggregates {
                    ids.extend(agg.args.iter().copied());
                    ids.extend(agg.order_by.iter().map(|item| item.expr));
                }
                ids
            }
            Relational::OrderBy { order_by, .. } | Relational::TopN { order_by, .. } => {
                order_by.iter().map(|item| item.expr).collect()
            }
            Relational::Window { functions, .. } => functions
                .iter()
                .flat_map(|f| f.args.iter().copied())
                .collect(),
            Relational::Join {
                equal_conditions,
                left_conditions,
                right_conditions,
                other_conditions,
                ..
            }
            | Relational::Apply {
                equal_conditions,
                left_conditions,
                right_conditions,
                other_conditions,
                ..
            } => equal_conditions
                .iter()
                .chain(left_conditions)
                .chain(right_conditions)
                .chain(other_conditions)
                .copied()
                .collect(),
        }
    }
}

impl Plan {
    /// Get the child of a relational node by its position.
    ///
    /// # Errors
    /// - the node is not relational
    /// - the child position is out of range
    pub fn get_relational_child(
        &self,
        rel_id: NodeId,
        child_idx: usize,
    ) -> Result<NodeId, SiftError> {
        let rel = self.get_relation_node(rel_id)?;
        rel.children().get(child_idx).copied().ok_or_else(|| {
            SiftError::NotFound(
                Entity::Node,
                format_smolstr!("child {child_idx} of the {} node {rel_id}", rel.name()),
            )
        })
    }

    /// Output schema of a relational node.
    ///
    /// Pass-through operators expose the schema of their child; the
    /// `Limit` node exposes the child schema until the inline projection
    /// populates its cache.
    ///
    /// # Errors
    /// - the node is not relational
    /// - a pass-through node has no child
    pub fn output_schema(&self, node_id: NodeId) -> Result<&Schema, SiftError> {
        match self.get_relation_node(node_id)? {
            Relational::ScanRelation { output, .. }
            | Relational::ScanSystem { output, .. }
            | Relational::ScanDual { output, .. }
            | Relational::Projection { output, .. }
            | Relational::GroupBy { output, .. }
            | Relational::Window { output, .. }
            | Relational::UnionAll { output, .. }
            | Relational::Join { output, .. }
            | Relational::Apply { output, .. } => Ok(output),
            Relational::Limit {
                output: Some(output),
                ..
            } => Ok(output),
            Relational::Selection { .. }
            | Relational::OrderBy { .. }
            | Relational::TopN { .. }
            | Relational::UnionScan { .. }
            | Relational::Lock { .. }
            | Relational::Limit { output: None, .. } => {
                let child_id = self.get_relational_child(node_id, 0)?;
                self.output_schema(child_id)
            }
        }
    }

    /// Add a relational node to the arena.
    pub fn add_relational(&mut self, rel: Relational) -> NodeId {
        self.nodes.push(Node::Relational(rel))
    }

    /// Add a scan over a catalog table.
    ///
    /// Allocates a fresh output column per catalog column.
    ///
    /// # Errors
    /// - the table is missing from the plan catalog
    pub fn add_scan(&mut self, table: &str) -> Result<NodeId, SiftError> {
        let columns: Vec<ColumnDef> = match self.relations.get(table) {
            Some(rel) => rel.columns.clone(),
            None => {
                return Err(SiftError::NotFound(
                    Entity::Table,
                    format_smolstr!("{table} among the plan relations"),
                ))
            }
        };
        let mut output = Schema::new();
        for def in &columns {
            let col = self.new_column(def.r#type);
            output.append(col);
        }
        let scan = Relational::ScanRelation {
            relation: SmolStr::from(table),
            columns,
            filters: Vec::new(),
            handle: None,
            output,
        };
        Ok(self.add_relational(scan))
    }

    /// Set the filters pushed down to a scan.
    ///
    /// # Errors
    /// - the node is not a relation scan
    pub fn set_scan_filters(
        &mut self,
        scan_id: NodeId,
        new_filters: Vec<NodeId>,
    ) -> Result<(), SiftError> {
        match self.get_mut_relation_node(scan_id)? {
            Relational::ScanRelation { filters, .. } => {
                *filters = new_filters;
                Ok(())
            }
            rel => Err(SiftError::Invalid(
                Entity::Relational,
                Some(format_smolstr!("expected ScanRelation, got {}", rel.name())),
            )),
        }
    }

    /// Set the row identifier of a scan.
    ///
    /// # Errors
    /// - the node is not a relation scan
    pub fn set_scan_handle(
        &mut self,
        scan_id: NodeId,
        new_handle: Option<HandleCols>,
    ) -> Result<(), SiftError> {
        match self.get_mut_relation_node(scan_id)? {
            Relational::ScanRelation { handle, .. } => {
                *handle = new_handle;
                Ok(())
            }
            rel => Err(SiftError::Invalid(
                Entity::Relational,
                Some(format_smolstr!("expected ScanRelation, got {}", rel.name())),
            )),
        }
    }

    /// Add a scan over an in-memory system table.
    ///
    /// # Errors
    /// - the table is missing from the plan catalog
    /// - the table is not a system one
    pub fn add_system_scan(&mut self, table: &str) -> Result<NodeId, SiftError> {
        let columns: Vec<ColumnDef> = match self.relations.get(table) {
            Some(rel) if matches!(rel.kind, TableKind::System) => rel.columns.clone(),
            Some(_) => {
                return Err(SiftError::Invalid(
                    Entity::Table,
                    Some(format_smolstr!("{table} is not a system table")),
                ))
            }
            None => {
                return Err(SiftError::NotFound(
                    Entity::Table,
                    format_smolstr!("{table} among the plan relations"),
                ))
            }
        };
        let names: Vec<SmolStr> = columns.iter().map(|def| def.name.clone()).collect();
        let mut output = Schema::new();
        for def in &columns {
            let col = self.new_column(def.r#type);
            output.append(col);
        }
        let scan = Relational::ScanSystem {
            table: SmolStr::from(table),
            columns,
            names,
            output,
        };
        Ok(self.add_relational(scan))
    }

    /// Add a leaf producing `row_count` rows with the given column types.
    pub fn add_dual(&mut self, row_count: u64, column_types: &[Type]) -> NodeId {
        let mut output = Schema::new();
        for r#type in column_types {
            let col = self.new_column(*r#type);
            output.append(col);
        }
        self.add_relational(Relational::ScanDual { row_count, output })
    }

    /// Add a projection node.
    ///
    /// Allocates a fresh output column per expression, with the type
    /// derived from the expression.
    ///
    /// # Errors
    /// - some of the expressions are not expression nodes
    pub fn add_proj(&mut self, child: NodeId, expressions: Vec<NodeId>) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        let mut output = Schema::new();
        for expr_id in &expressions {
            let r#type = self.calculate_expr_type(*expr_id)?;
            let col = self.new_column(r#type);
            output.append(col);
        }
        Ok(self.add_relational(Relational::Projection {
            children: vec![child],
            expressions,
            output,
        }))
    }

    /// Add a selection node.
    ///
    /// # Errors
    /// - the child is not relational
    /// - some of the filters are not expression nodes
    pub fn add_select(&mut self, child: NodeId, filters: Vec<NodeId>) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        for filter in &filters {
            self.get_expression_node(*filter)?;
        }
        Ok(self.add_relational(Relational::Selection {
            children: vec![child],
            filters,
        }))
    }

    /// Add an aggregation node.
    ///
    /// # Errors
    /// - the child is not relational
    /// - the aggregate list is empty (an aggregation without aggregates
    ///   doesn't produce a schema)
    pub fn add_group_by(
        &mut self,
        child: NodeId,
        aggregates: Vec<AggregateFunction>,
        gr_exprs: Vec<NodeId>,
    ) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        if aggregates.is_empty() {
            return Err(SiftError::UnexpectedNumberOfValues(
                "aggregation node requires at least one aggregate function".into(),
            ));
        }
        let mut output = Schema::new();
        for agg in &aggregates {
            let col = self.new_column(agg.ret_type);
            output.append(col);
        }
        Ok(self.add_relational(Relational::GroupBy {
            children: vec![child],
            aggregates,
            gr_exprs,
            output,
        }))
    }

    /// Add an ordering node.
    ///
    /// # Errors
    /// - the child is not relational
    pub fn add_order_by(
        &mut self,
        child: NodeId,
        order_by: Vec<OrderByElement>,
    ) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        Ok(self.add_relational(Relational::OrderBy {
            children: vec![child],
            order_by,
        }))
    }

    /// Add a fused ORDER BY + LIMIT node.
    ///
    /// # Errors
    /// - the child is not relational
    pub fn add_top_n(
        &mut self,
        child: NodeId,
        order_by: Vec<OrderByElement>,
        limit: u64,
        offset: u64,
    ) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        Ok(self.add_relational(Relational::TopN {
            children: vec![child],
            order_by,
            limit,
            offset,
        }))
    }

    /// Add a limit node.
    ///
    /// # Errors
    /// - the child is not relational
    pub fn add_limit(&mut self, child: NodeId, limit: u64, offset: u64) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        Ok(self.add_relational(Relational::Limit {
            children: vec![child],
            limit,
            offset,
            output: None,
        }))
    }

    /// Add a window node.
    ///
    /// The output schema is the child schema with a fresh column
    /// appended per window function.
    ///
    /// # Errors
    /// - the child is not relational
    pub fn add_window(
        &mut self,
        child: NodeId,
        functions: Vec<WindowFunction>,
        partition_by: Vec<Column>,
        order_by: Vec<SortColumn>,
    ) -> Result<NodeId, SiftError> {
        let mut output = self.output_schema(child)?.clone();
        for func in &functions {
            let col = self.new_column(func.ret_type);
            output.append(col);
        }
        Ok(self.add_relational(Relational::Window {
            children: vec![child],
            functions,
            partition_by,
            order_by,
            output,
        }))
    }

    /// Add a union-all node over position-aligned children.
    ///
    /// # Errors
    /// - less than two children
    /// - children output schemas have different lengths
    pub fn add_union_all(&mut self, children: Vec<NodeId>) -> Result<NodeId, SiftError> {
        let first = children.first().copied().ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("union all expects at least two children".into())
        })?;
        if children.len() < 2 {
            return Err(SiftError::UnexpectedNumberOfValues(
                "union all expects at least two children".into(),
            ));
        }
        let first_schema = self.output_schema(first)?.clone();
        for child in &children {
            let child_schema = self.output_schema(*child)?;
            if child_schema.len() != first_schema.len() {
                return Err(SiftError::UnexpectedNumberOfValues(format_smolstr!(
                    "union all children have different schema lengths: {} and {}",
                    first_schema.len(),
                    child_schema.len()
                )));
            }
        }
        let mut output = Schema::new();
        for col in first_schema.columns() {
            let new_col = self.new_column(col.r#type);
            output.append(new_col);
        }
        Ok(self.add_relational(Relational::UnionAll { children, output }))
    }

    /// Add a union-scan node merging the in-transaction changes into
    /// the child scan.
    ///
    /// # Errors
    /// - the child is not relational
    pub fn add_union_scan(
        &mut self,
        child: NodeId,
        handle: Option<HandleCols>,
        filters: Vec<NodeId>,
    ) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        Ok(self.add_relational(Relational::UnionScan {
            children: vec![child],
            handle,
            filters,
        }))
    }

    /// Add a join node.
    ///
    /// # Errors
    /// - children are not relational
    pub fn add_join(
        &mut self,
        left: NodeId,
        right: NodeId,
        kind: JoinKind,
        equal_conditions: Vec<NodeId>,
        left_conditions: Vec<NodeId>,
        right_conditions: Vec<NodeId>,
        other_conditions: Vec<NodeId>,
    ) -> Result<NodeId, SiftError> {
        let output = self.new_join_schema(left, right, kind)?;
        Ok(self.add_relational(Relational::Join {
            children: vec![left, right],
            kind,
            equal_conditions,
            left_conditions,
            right_conditions,
            other_conditions,
            output,
        }))
    }

    /// Add an apply node (a correlated join).
    ///
    /// The correlated column list starts empty and is resolved by the
    /// plan transformations.
    ///
    /// # Errors
    /// - children are not relational
    pub fn add_apply(
        &mut self,
        left: NodeId,
        right: NodeId,
        kind: JoinKind,
        equal_conditions: Vec<NodeId>,
        left_conditions: Vec<NodeId>,
        right_conditions: Vec<NodeId>,
        other_conditions: Vec<NodeId>,
    ) -> Result<NodeId, SiftError> {
        let output = self.new_join_schema(left, right, kind)?;
        Ok(self.add_relational(Relational::Apply {
            children: vec![left, right],
            kind,
            equal_conditions,
            left_conditions,
            right_conditions,
            other_conditions,
            correlated: Vec::new(),
            output,
        }))
    }

    /// Add a row-locking node over the child.
    ///
    /// # Errors
    /// - the child is not relational
    pub fn add_lock(
        &mut self,
        child: NodeId,
        kind: LockKind,
        handles: HashMap<u64, Vec<HandleCols>>,
        partition_id_columns: Vec<Column>,
        partitioned_tables: Vec<SmolStr>,
    ) -> Result<NodeId, SiftError> {
        self.get_relation_node(child)?;
        Ok(self.add_relational(Relational::Lock {
            children: vec![child],
            kind,
            handles,
            partition_id_columns,
            partitioned_tables,
        }))
    }

    /// Join output schema for a newly built join: the mark column of the
    /// outer-semi kinds is allocated fresh.
    fn new_join_schema(
        &mut self,
        left: NodeId,
        right: NodeId,
        kind: JoinKind,
    ) -> Result<Schema, SiftError> {
        let left_schema = self.output_schema(left)?.clone();
        let schema = match kind {
            JoinKind::Semi | JoinKind::AntiSemi => left_schema,
            JoinKind::LeftOuterSemi | JoinKind::AntiLeftOuterSemi => {
                let mut schema = left_schema;
                let mark = self.new_column(Type::Boolean);
                schema.append(mark);
                schema
            }
            JoinKind::Inner | JoinKind::LeftOuter | JoinKind::RightOuter => {
                let mut schema = left_schema;
                for col in self.output_schema(right)?.columns() {
                    schema.append(*col);
                }
                schema
            }
        };
        Ok(schema)
    }

    /// Rebuild the output schema of a join or apply node from its
    /// children. The mark column of the outer-semi kinds is reused
    /// from the last column of the current output.
    ///
    /// # Errors
    /// - the node is not a join or apply
    /// - the mark column is missing from the current output
    pub fn build_join_schema(&mut self, node_id: NodeId) -> Result<(), SiftError> {
        let (kind, left, right, last_col) = match self.get_relation_node(node_id)? {
            Relational::Join {
                kind,
                children,
                output,
                ..
            }
            | Relational::Apply {
                kind,
                children,
                output,
                ..
            } => {
                let left = children.first().copied().ok_or_else(|| {
                    SiftError::UnexpectedNumberOfValues("join node has no children".into())
                })?;
                let right = children.get(1).copied().ok_or_else(|| {
                    SiftError::UnexpectedNumberOfValues("join node has a single child".into())
                })?;
                (*kind, left, right, output.columns().last().copied())
            }
            rel => {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some(format_smolstr!("expected Join or Apply, got {}", rel.name())),
                ))
            }
        };
        let left_schema = self.output_schema(left)?.clone();
        let new_schema = match kind {
            JoinKind::Semi | JoinKind::AntiSemi => left_schema,
            JoinKind::LeftOuterSemi | JoinKind::AntiLeftOuterSemi => {
                let mark = last_col.ok_or_else(|| {
                    SiftError::Invalid(
                        Entity::Schema,
                        Some("outer semi join lost its mark column".into()),
                    )
                })?;
                let mut schema = left_schema;
                schema.append(mark);
                schema
            }
            JoinKind::Inner | JoinKind::LeftOuter | JoinKind::RightOuter => {
                let mut schema = left_schema;
                for col in self.output_schema(right)?.columns() {
                    schema.append(*col);
                }
                schema
            }
        };
        match self.get_mut_relation_node(node_id)? {
            Relational::Join { output, .. } | Relational::Apply { output, .. } => {
                *output = new_schema;
            }
            _ => unreachable!("node kind checked above"),
        }
        Ok(())
    }

    /// Collect the correlated columns of the relational subtree that
    /// resolve against the given schema. Every column is reported once.
    ///
    /// # Errors
    /// - the subtree contains invalid nodes
    pub fn extract_cor_columns_by_schema(
        &self,
        top_id: NodeId,
        schema: &Schema,
    ) -> Result<Vec<Column>, SiftError> {
        self.get_relation_node(top_id)?;
        let mut columns: Vec<Column> = Vec::new();
        let rel_subtree = DftPost::new(&top_id, |node| self.nodes.rel_iter(node));
        for (_, rel_id) in rel_subtree {
            for expr_id in self.get_relation_node(*rel_id)?.expression_ids() {
                let expr_subtree = DftPost::new(&expr_id, |node| self.nodes.expr_iter(node));
                for (_, id) in expr_subtree {
                    if let Node::Expression(Expression::CorColumnRef { col }) = self.get_node(*id)?
                    {
                        if schema.contains(col) && !columns.contains(col) {
                            columns.push(*col);
                        }
                    }
                }
            }
        }
        Ok(columns)
    }
}
