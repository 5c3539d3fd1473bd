//! Plan tree transformation module.
//!
//! Contains rule-based transformations.

use crate::errors::SiftError;
use crate::ir::Plan;

pub mod column_pruning;

impl Plan {
    /// Apply optimization rules to the plan.
    ///
    /// # Errors
    /// - some of the transformations failed
    pub fn optimize(&mut self) -> Result<(), SiftError> {
        let span = tracing::debug_span!("optimize", rule = column_pruning::COLUMN_PRUNE);
        let _guard = span.enter();
        self.prune_columns()?;
        Ok(())
    }
}
