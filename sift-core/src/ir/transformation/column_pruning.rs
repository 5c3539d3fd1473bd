//! Column pruning of the plan tree.
//!
//! The transformation walks the tree from the top down carrying the set
//! of the columns required by the consumers of every node. Each operator
//! drops the outputs nobody asked for, derives the set required from its
//! own children and recurses. The walk never changes the multiset of the
//! rows the plan produces, only their width.
//!
//! For example:
//! ```sql
//!    select a from (select a, b, c from t)
//! ```
//! is transformed to:
//! ```sql
//!   select a from (select a from t)
//! ```
//!
//! Several rewrites here exist only to keep the row count observable
//! by the operators above intact:
//! - an aggregation whose aggregates were all pruned receives a synthetic
//!   `count(1)` (or `first_row(1)` when the node held nothing but the
//!   internal `first_row` aggregates, which are not count-preserving);
//! - a grouped aggregation whose grouping list was emptied groups by the
//!   constant `1` instead, since a grouped aggregation of an empty input
//!   produces no rows while a total one produces a single row;
//! - a projection pruned down to the empty tuple gets the constant `1`
//!   back before it is attached under a join, so the downstream passes
//!   don't eliminate it;
//! - a storage scan never ends up with the empty column list because the
//!   storage layer answers such scans with an empty response.

use ahash::AHashSet;
use itertools::Itertools;
use smol_str::format_smolstr;

use crate::errors::{Entity, SiftError};
use crate::ir::aggregates::AggregateKind;
use crate::ir::expression::Comparator;
use crate::ir::operator::{OrderByElement, Relational};
use crate::ir::relation::{ColumnDef, Type};
use crate::ir::schema::{Column, Schema};
use crate::ir::{NodeId, Plan};

/// Name of the transformation rule.
pub const COLUMN_PRUNE: &str = "column_prune";

/// System tables that tolerate column pruning. The rest of the
/// in-memory tables are served by retrievers that expect the full
/// row layout, so their scans are left alone.
const PRUNABLE_SYSTEM_TABLES: [&str; 11] = [
    "statements_summary",
    "statements_summary_history",
    "cluster_statements_summary",
    "cluster_statements_summary_history",
    "slow_query",
    "cluster_slow_query",
    "transactions",
    "cluster_transactions",
    "data_lock_waits",
    "deadlocks",
    "cluster_deadlocks",
];

/// Trim the schema to the columns of the required set,
/// preserving their relative order.
fn inline_projection(schema: &mut Schema, required: &[Column]) {
    let used = schema.used_list(required);
    for i in (0..used.len()).rev() {
        if !used[i] {
            schema.remove(i);
        }
    }
}

impl Plan {
    /// Remove the columns no operator of the plan tree reads.
    ///
    /// The top node keeps its full output: the demand of the plan
    /// consumer is the top schema itself.
    ///
    /// # Errors
    /// - the plan has no top
    /// - the tree is invalid (broken arena pointers, mixed node kinds)
    /// - a synthetic aggregate can't be constructed
    pub fn prune_columns(&mut self) -> Result<(), SiftError> {
        let top_id = self.get_top()?;
        let required = self.output_schema(top_id)?.columns().to_vec();
        self.prune_node(top_id, required)?;
        tracing::debug!(nodes = self.nodes.len(), "column pruning finished");
        Ok(())
    }

    /// Dispatch the pruning rule of the node variant.
    fn prune_node(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        type Rule = fn(&mut Plan, NodeId, Vec<Column>) -> Result<(), SiftError>;
        let rule: Rule = match self.get_relation_node(node_id)? {
            Relational::ScanRelation { .. } => Plan::prune_scan,
            Relational::ScanSystem { .. } => Plan::prune_system_scan,
            Relational::ScanDual { .. } => Plan::prune_dual,
            Relational::Projection { .. } => Plan::prune_projection,
            Relational::Selection { .. } => Plan::prune_selection,
            Relational::GroupBy { .. } => Plan::prune_group_by,
            Relational::OrderBy { .. } => Plan::prune_order_by,
            Relational::TopN { .. } => Plan::prune_top_n,
            Relational::Limit { .. } => Plan::prune_limit,
            Relational::Window { .. } => Plan::prune_window,
            Relational::UnionAll { .. } => Plan::prune_union_all,
            Relational::UnionScan { .. } => Plan::prune_union_scan,
            Relational::Join { .. } => Plan::prune_join,
            Relational::Apply { .. } => Plan::prune_apply,
            Relational::Lock { .. } => Plan::prune_lock,
        };
        rule(self, node_id, required)
    }

    /// A projection drops every output position nobody upstream reads,
    /// unless the expression there has side effects.
    fn prune_projection(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, mut expressions, mut schema) = {
            let Relational::Projection {
                children,
                expressions,
                output,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Projection".into()),
                ));
            };
            (
                children.first().copied(),
                expressions.clone(),
                output.clone(),
            )
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("projection node has no children".into())
        })?;
        let used = schema.used_list(&required);
        for i in (0..used.len()).rev() {
            if !used[i] && !self.expr_has_side_effects(expressions[i])? {
                schema.remove(i);
                expressions.remove(i);
            }
        }
        let self_required =
            self.extract_columns_from_expressions(Vec::with_capacity(expressions.len()), &expressions)?;
        if let Relational::Projection {
            expressions: node_exprs,
            output,
            ..
        } = self.get_mut_relation_node(node_id)?
        {
            *node_exprs = expressions;
            *output = schema;
        }
        self.prune_node(child_id, self_required)
    }

    /// A selection adds the columns of its filters to the demand and
    /// passes it through.
    fn prune_selection(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, filters) = {
            let Relational::Selection { children, filters } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Selection".into()),
                ));
            };
            (children.first().copied(), filters.clone())
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("selection node has no children".into())
        })?;
        let required = self.extract_columns_from_expressions(required, &filters)?;
        self.prune_node(child_id, required)
    }

    /// Prune the aggregates of an aggregation node.
    ///
    /// When every aggregate is dropped (or only the internal `first_row`
    /// aggregates survive), a synthetic aggregate over the constant `1`
    /// is appended: the aggregation must keep producing the same number
    /// of rows it would have produced before the pruning. A grouped
    /// aggregation whose grouping list degenerates groups by `1`.
    fn prune_group_by(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, mut aggregates, mut gr_exprs, mut schema) = {
            let Relational::GroupBy {
                children,
                aggregates,
                gr_exprs,
                output,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected GroupBy".into()),
                ));
            };
            (
                children.first().copied(),
                aggregates.clone(),
                gr_exprs.clone(),
                output.clone(),
            )
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("aggregation node has no children".into())
        })?;

        let used = schema.used_list(&required);
        let mut all_first_row = true;
        let mut all_remain_first_row = true;
        for i in (0..used.len()).rev() {
            if aggregates[i].kind != AggregateKind::FIRSTROW {
                all_first_row = false;
            }
            if !used[i] && !self.exprs_have_side_effects(&aggregates[i].args)? {
                schema.remove(i);
                aggregates.remove(i);
            } else if aggregates[i].kind != AggregateKind::FIRSTROW {
                all_remain_first_row = false;
            }
        }

        let mut self_required: Vec<Column> = Vec::new();
        for agg in &mut aggregates {
            self_required = self.extract_columns_from_expressions(self_required, &agg.args)?;
            let (kept, columns) = self.prune_by_items(&agg.order_by)?;
            agg.order_by = kept;
            self_required.extend(columns);
        }

        if aggregates.is_empty() || (!all_first_row && all_remain_first_row) {
            let one = self.add_const_one();
            let new_agg = if all_first_row {
                self.new_aggregate_function(AggregateKind::FIRSTROW, vec![one])?
            } else {
                self.new_aggregate_function(AggregateKind::COUNT, vec![one])?
            };
            let col = self.new_column(new_agg.ret_type);
            schema.append(col);
            aggregates.push(new_agg);
        }

        if !gr_exprs.is_empty() {
            for i in (0..gr_exprs.len()).rev() {
                let columns = self.extract_columns(gr_exprs[i])?;
                if columns.is_empty() && !self.expr_has_side_effects(gr_exprs[i])? {
                    gr_exprs.remove(i);
                } else {
                    self_required.extend(columns);
                }
            }
            // `count(*)` over the whole input and `count(*)` grouped by a
            // constant produce a different number of rows on the empty
            // input, so the grouping list never degenerates completely.
            if gr_exprs.is_empty() {
                gr_exprs = vec![self.add_const_one()];
            }
        }

        if let Relational::GroupBy {
            aggregates: node_aggs,
            gr_exprs: node_gr_exprs,
            output,
            ..
        } = self.get_mut_relation_node(node_id)?
        {
            *node_aggs = aggregates;
            *node_gr_exprs = gr_exprs;
            *output = schema;
        }
        self.prune_node(child_id, self_required)
    }

    /// Clean an ordering key list up: drop the duplicates (by the
    /// structural hash of the expression), the runtime constants and
    /// the keys of the NULL literal type. Returns the surviving items
    /// and the columns they require from the child.
    fn prune_by_items(
        &self,
        items: &[OrderByElement],
    ) -> Result<(Vec<OrderByElement>, Vec<Column>), SiftError> {
        let mut kept: Vec<OrderByElement> = Vec::with_capacity(items.len());
        let mut required: Vec<Column> = Vec::new();
        let mut seen: AHashSet<u64> = AHashSet::with_capacity(items.len());
        let comparator = Comparator::new(self);
        for item in items {
            let hash = comparator.expr_hash(item.expr);
            let hash_match = !seen.insert(hash);
            let columns = self.extract_columns(item.expr)?;
            if hash_match {
                // Exact duplicate of a key seen before, filtered out.
            } else if columns.is_empty() {
                if !self.is_runtime_const_expr(item.expr)? {
                    kept.push(item.clone());
                }
            } else if self.calculate_expr_type(item.expr)? == Type::Null {
                // Ordering by a NULL-typed key is a no-op, filtered out.
            } else {
                required.extend(columns);
                kept.push(item.clone());
            }
        }
        Ok((kept, required))
    }

    fn prune_order_by(&mut self, node_id: NodeId, mut required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, order_by) = {
            let Relational::OrderBy { children, order_by } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected OrderBy".into()),
                ));
            };
            (children.first().copied(), order_by.clone())
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("ordering node has no children".into())
        })?;
        let (kept, columns) = self.prune_by_items(&order_by)?;
        required.extend(columns);
        if let Relational::OrderBy { order_by, .. } = self.get_mut_relation_node(node_id)? {
            *order_by = kept;
        }
        self.prune_node(child_id, required)
    }

    fn prune_top_n(&mut self, node_id: NodeId, mut required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, order_by) = {
            let Relational::TopN {
                children, order_by, ..
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected TopN".into()),
                ));
            };
            (children.first().copied(), order_by.clone())
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("top-n node has no children".into())
        })?;
        let (kept, columns) = self.prune_by_items(&order_by)?;
        required.extend(columns);
        if let Relational::TopN { order_by, .. } = self.get_mut_relation_node(node_id)? {
            *order_by = kept;
        }
        self.prune_node(child_id, required)
    }

    /// A union-all node maps the demand to every child by position and
    /// contracts its own schema afterwards. The contraction re-derives
    /// the used positions from the first child: a position the first
    /// child had to keep (e.g. a side-effecting projection expression)
    /// stays in the union output as well.
    fn prune_union_all(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (children, schema) = {
            let Relational::UnionAll { children, output } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected UnionAll".into()),
                ));
            };
            (children.clone(), output.clone())
        };
        let first_child = children.first().copied().ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("union all node has no children".into())
        })?;

        let used = schema.used_list(&required);
        let has_been_used = used.iter().any(|u| *u);
        let effective = if has_been_used {
            used
        } else {
            // Nobody asked for anything: each child still has to produce
            // some row shape, so treat every position as demanded.
            vec![true; schema.len()]
        };
        let used_positions: Vec<usize> = effective.iter().copied().positions(|u| u).collect();

        let first_schema_before = self.output_schema(first_child)?.clone();
        for child in &children {
            let child_schema = self.output_schema(*child)?.clone();
            if child_schema.len() != schema.len() {
                return Err(SiftError::UnexpectedNumberOfValues(format_smolstr!(
                    "union all child schema length {} differs from the node schema length {}",
                    child_schema.len(),
                    schema.len()
                )));
            }
            let child_required: Vec<Column> = used_positions
                .iter()
                .map(|pos| child_schema.columns()[*pos])
                .collect();
            self.prune_node(*child, child_required)?;
        }

        if has_been_used {
            // Keep the node schema aligned with what the first child
            // actually kept.
            let first_schema_after = self.output_schema(first_child)?.clone();
            let mut schema = schema;
            for i in (0..schema.len()).rev() {
                let first_col = first_schema_before.columns()[i];
                if !first_schema_after.contains(&first_col) {
                    schema.remove(i);
                }
            }
            if let Relational::UnionAll { output, .. } = self.get_mut_relation_node(node_id)? {
                *output = schema;
            }
        }
        Ok(())
    }

    /// A union-scan wants its handle columns and the columns of its
    /// filters on top of the parent demand.
    fn prune_union_scan(&mut self, node_id: NodeId, mut required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, handle, filters) = {
            let Relational::UnionScan {
                children,
                handle,
                filters,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected UnionScan".into()),
                ));
            };
            (children.first().copied(), handle.clone(), filters.clone())
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("union scan node has no children".into())
        })?;
        if let Some(handle) = &handle {
            required.extend(handle.columns().iter().copied());
        }
        let required = self.extract_columns_from_expressions(required, &filters)?;
        self.prune_node(child_id, required)
    }

    /// A storage scan keeps the demanded columns and the columns of the
    /// pushed-down filters. An emptied scan gets one column back (the
    /// storage layer returns an empty response to a zero-column scan):
    /// the first original column for the cluster tables, the handle
    /// column when the scan has one, a synthesized hidden row id
    /// otherwise. An integer handle whose column was pruned is dropped.
    fn prune_scan(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (relation, mut columns, filters, mut handle, mut schema) = {
            let Relational::ScanRelation {
                relation,
                columns,
                filters,
                handle,
                output,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected ScanRelation".into()),
                ));
            };
            (
                relation.clone(),
                columns.clone(),
                filters.clone(),
                handle.clone(),
                output.clone(),
            )
        };
        let used = schema.used_list(&required);
        let filter_columns = self.extract_columns_from_expressions(Vec::new(), &filters)?;
        let filter_used = schema.used_list(&filter_columns);

        let origin_schema_columns: Vec<Column> = schema.columns().to_vec();
        let origin_columns = columns.clone();
        for i in (0..used.len()).rev() {
            if !used[i] && !filter_used[i] {
                schema.remove(i);
                columns.remove(i);
            }
        }

        if schema.is_empty() {
            let is_cluster = self
                .get_relation(&relation)
                .ok_or_else(|| {
                    SiftError::NotFound(
                        Entity::Table,
                        format_smolstr!("{relation} among the plan relations"),
                    )
                })?
                .is_cluster();
            let restored_from_origin = if is_cluster {
                match (origin_schema_columns.first(), origin_columns.first()) {
                    (Some(col), Some(def)) => Some((*col, def.clone())),
                    _ => None,
                }
            } else {
                None
            };
            let (restored_col, restored_def) = if let Some(pair) = restored_from_origin {
                pair
            } else if let Some(handle) = &handle {
                let col = *handle.col(0).ok_or_else(|| {
                    SiftError::Invalid(Entity::Handle, Some("handle without columns".into()))
                })?;
                let def = origin_schema_columns
                    .iter()
                    .position(|c| *c == col)
                    .and_then(|pos| origin_columns.get(pos).cloned())
                    .unwrap_or_else(ColumnDef::row_id);
                (col, def)
            } else {
                (self.new_column(Type::Unsigned), ColumnDef::row_id())
            };
            columns.push(restored_def);
            schema.append(restored_col);
        }

        if let Some(h) = &handle {
            if h.is_int() {
                let gone = match h.col(0) {
                    Some(col) => schema.index_of(col).is_none(),
                    None => true,
                };
                if gone {
                    handle = None;
                }
            }
        }

        if let Relational::ScanRelation {
            columns: node_columns,
            handle: node_handle,
            output,
            ..
        } = self.get_mut_relation_node(node_id)?
        {
            *node_columns = columns;
            *node_handle = handle;
            *output = schema;
        }
        Ok(())
    }

    /// Only the system tables that tolerate partial rows are pruned,
    /// and they always keep at least one column.
    fn prune_system_scan(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (table, mut columns, mut names, mut schema) = {
            let Relational::ScanSystem {
                table,
                columns,
                names,
                output,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected ScanSystem".into()),
                ));
            };
            (
                table.clone(),
                columns.clone(),
                names.clone(),
                output.clone(),
            )
        };
        if !PRUNABLE_SYSTEM_TABLES.contains(&table.as_str()) {
            return Ok(());
        }
        let used = schema.used_list(&required);
        for i in (0..used.len()).rev() {
            if !used[i] && schema.len() > 1 {
                schema.remove(i);
                names.remove(i);
                columns.remove(i);
            }
        }
        if let Relational::ScanSystem {
            columns: node_columns,
            names: node_names,
            output,
            ..
        } = self.get_mut_relation_node(node_id)?
        {
            *node_columns = columns;
            *node_names = names;
            *output = schema;
        }
        Ok(())
    }

    fn prune_dual(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let mut schema = {
            let Relational::ScanDual { output, .. } = self.get_relation_node(node_id)? else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected ScanDual".into()),
                ));
            };
            output.clone()
        };
        let used = schema.used_list(&required);
        for i in (0..used.len()).rev() {
            if !used[i] {
                schema.remove(i);
            }
        }
        if let Relational::ScanDual { output, .. } = self.get_mut_relation_node(node_id)? {
            *output = schema;
        }
        Ok(())
    }

    /// Split the demand (augmented with the join condition columns)
    /// between the children of a join or apply node.
    fn extract_join_used_cols(
        &self,
        node_id: NodeId,
        mut required: Vec<Column>,
    ) -> Result<(Vec<Column>, Vec<Column>), SiftError> {
        let (conditions, left_id, right_id) = {
            let rel = self.get_relation_node(node_id)?;
            let (Relational::Join {
                children,
                equal_conditions,
                left_conditions,
                right_conditions,
                other_conditions,
                ..
            }
            | Relational::Apply {
                children,
                equal_conditions,
                left_conditions,
                right_conditions,
                other_conditions,
                ..
            }) = rel
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some(format_smolstr!("expected Join or Apply, got {}", rel.name())),
                ));
            };
            let conditions: Vec<NodeId> = equal_conditions
                .iter()
                .chain(left_conditions)
                .chain(right_conditions)
                .chain(other_conditions)
                .copied()
                .collect();
            let left_id = children.first().copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("join node has no children".into())
            })?;
            let right_id = children.get(1).copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("join node has a single child".into())
            })?;
            (conditions, left_id, right_id)
        };
        required = self.extract_columns_from_expressions(required, &conditions)?;
        let left_schema = self.output_schema(left_id)?;
        let right_schema = self.output_schema(right_id)?;
        let mut left_required: Vec<Column> = Vec::new();
        let mut right_required: Vec<Column> = Vec::new();
        for col in required {
            if left_schema.contains(&col) {
                left_required.push(col);
            } else if right_schema.contains(&col) {
                right_required.push(col);
            }
        }
        Ok((left_required, right_required))
    }

    /// Prune both children of a join, then rebuild its schema from
    /// theirs and trim it down to the demand. The match-flag column of
    /// the outer-semi joins is always demanded: the operator above
    /// reads it even when it reads nothing else.
    fn prune_join(&mut self, node_id: NodeId, mut required: Vec<Column>) -> Result<(), SiftError> {
        let (left_id, right_id, kind) = {
            let Relational::Join { children, kind, .. } = self.get_relation_node(node_id)? else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Join".into()),
                ));
            };
            let left_id = children.first().copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("join node has no children".into())
            })?;
            let right_id = children.get(1).copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("join node has a single child".into())
            })?;
            (left_id, right_id, *kind)
        };
        let (left_required, right_required) = self.extract_join_used_cols(node_id, required.clone())?;

        self.prune_node(left_id, left_required)?;
        self.add_const_one_for_empty_projection(left_id)?;

        self.prune_node(right_id, right_required)?;
        self.add_const_one_for_empty_projection(right_id)?;

        self.build_join_schema(node_id)?;

        let mut schema = {
            let Relational::Join { output, .. } = self.get_relation_node(node_id)? else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Join".into()),
                ));
            };
            output.clone()
        };
        if kind.appends_mark_column() {
            let mark = schema.columns().last().copied().ok_or_else(|| {
                SiftError::Invalid(
                    Entity::Schema,
                    Some("outer semi join lost its mark column".into()),
                )
            })?;
            required.push(mark);
        }
        inline_projection(&mut schema, &required);
        if let Relational::Join { output, .. } = self.get_mut_relation_node(node_id)? {
            *output = schema;
        }
        Ok(())
    }

    /// An apply prunes its right (correlated) subtree first: only then
    /// the surviving correlated references are known, and their columns
    /// join the demand of the left child.
    fn prune_apply(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        let (left_id, right_id) = {
            let Relational::Apply { children, .. } = self.get_relation_node(node_id)? else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Apply".into()),
                ));
            };
            let left_id = children.first().copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("apply node has no children".into())
            })?;
            let right_id = children.get(1).copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("apply node has a single child".into())
            })?;
            (left_id, right_id)
        };
        let (mut left_required, right_required) = self.extract_join_used_cols(node_id, required)?;

        self.prune_node(right_id, right_required)?;
        self.add_const_one_for_empty_projection(right_id)?;

        let left_schema = self.output_schema(left_id)?.clone();
        let correlated = self.extract_cor_columns_by_schema(right_id, &left_schema)?;
        left_required.extend(correlated.iter().copied());
        if let Relational::Apply {
            correlated: node_correlated,
            ..
        } = self.get_mut_relation_node(node_id)?
        {
            *node_correlated = correlated;
        }

        self.prune_node(left_id, left_required)?;
        self.add_const_one_for_empty_projection(left_id)?;

        self.build_join_schema(node_id)?;
        Ok(())
    }

    /// A locking node of the `FOR UPDATE` family demands every handle
    /// column it is going to lock (plus the partition-id columns when
    /// partitioned tables are involved). The other lock kinds behave as
    /// plain pass-through nodes.
    fn prune_lock(&mut self, node_id: NodeId, mut required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, kind, handles, partition_id_columns, has_partitioned) = {
            let Relational::Lock {
                children,
                kind,
                handles,
                partition_id_columns,
                partitioned_tables,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Lock".into()),
                ));
            };
            (
                children.first().copied(),
                *kind,
                handles.clone(),
                partition_id_columns.clone(),
                !partitioned_tables.is_empty(),
            )
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("lock node has no children".into())
        })?;
        if !kind.is_select_for_update() {
            return self.prune_node(child_id, required);
        }
        if has_partitioned {
            required.extend(partition_id_columns);
        }
        for table_handles in handles.values() {
            for handle in table_handles {
                required.extend(handle.columns().iter().copied());
            }
        }
        self.prune_node(child_id, required)
    }

    /// A window node never demands its own outputs from the child: it
    /// drops them from the required set and asks for the function
    /// arguments and the partitioning/ordering keys instead. After the
    /// child is pruned the node schema is rebuilt as the child schema
    /// with the window columns re-appended.
    fn prune_window(&mut self, node_id: NodeId, mut required: Vec<Column>) -> Result<(), SiftError> {
        let (child_id, functions, partition_by, order_by, schema) = {
            let Relational::Window {
                children,
                functions,
                partition_by,
                order_by,
                output,
            } = self.get_relation_node(node_id)?
            else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Window".into()),
                ));
            };
            (
                children.first().copied(),
                functions.clone(),
                partition_by.clone(),
                order_by.clone(),
                output.clone(),
            )
        };
        let child_id = child_id.ok_or_else(|| {
            SiftError::UnexpectedNumberOfValues("window node has no children".into())
        })?;
        let produced = functions.len();
        if schema.len() < produced {
            return Err(SiftError::UnexpectedNumberOfValues(format_smolstr!(
                "window schema of length {} can't hold {produced} window columns",
                schema.len()
            )));
        }
        let window_columns: Vec<Column> = schema.columns()[schema.len() - produced..].to_vec();
        required.retain(|col| !window_columns.contains(col));
        for func in &functions {
            required = self.extract_columns_from_expressions(required, &func.args)?;
        }
        required.extend(partition_by.iter().copied());
        required.extend(order_by.iter().map(|item| item.col));
        self.prune_node(child_id, required)?;

        let mut schema = self.output_schema(child_id)?.clone();
        for col in &window_columns {
            schema.append(*col);
        }
        if let Relational::Window { output, .. } = self.get_mut_relation_node(node_id)? {
            *output = schema;
        }
        Ok(())
    }

    /// An empty demand happens when the limit sits inside an UPDATE:
    /// leave the subtree alone. Otherwise prune the child, drop the
    /// cached schema and inline-project the node to the saved demand.
    fn prune_limit(&mut self, node_id: NodeId, required: Vec<Column>) -> Result<(), SiftError> {
        if required.is_empty() {
            return Ok(());
        }
        let child_id = {
            let Relational::Limit { children, .. } = self.get_relation_node(node_id)? else {
                return Err(SiftError::Invalid(
                    Entity::Relational,
                    Some("expected Limit".into()),
                ));
            };
            children.first().copied().ok_or_else(|| {
                SiftError::UnexpectedNumberOfValues("limit node has no children".into())
            })?
        };
        let saved = required.clone();
        self.prune_node(child_id, required)?;
        if let Relational::Limit { output, .. } = self.get_mut_relation_node(node_id)? {
            *output = None;
        }
        let mut schema = self.output_schema(child_id)?.clone();
        inline_projection(&mut schema, &saved);
        if let Relational::Limit { output, .. } = self.get_mut_relation_node(node_id)? {
            *output = Some(schema);
        }
        Ok(())
    }

    /// By adding the const one to the empty projection we avoid its
    /// elimination by the downstream passes, which is incorrect when
    /// the projection is a cardinality-preserving placeholder.
    fn add_const_one_for_empty_projection(&mut self, node_id: NodeId) -> Result<(), SiftError> {
        let is_empty_projection = matches!(
            self.get_relation_node(node_id)?,
            Relational::Projection { output, .. } if output.is_empty()
        );
        if !is_empty_projection {
            return Ok(());
        }
        let one = self.add_const_one();
        let col = self.new_column(Type::Unsigned);
        if let Relational::Projection {
            expressions, output, ..
        } = self.get_mut_relation_node(node_id)?
        {
            expressions.push(one);
            output.append(col);
        }
        Ok(())
    }
}
