//! UPDATE or DELETE without a WHERE clause

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::{Delete, Update};

pub const ID: &str = "no_where_clause";

/// Reports writes that would touch every row of the table
#[derive(Debug, Clone)]
pub struct NoWhereClauseChecker {
    config: CheckerConfig,
}

impl NoWhereClauseChecker {
    pub fn new(options: &CommonOptions) -> Self {
        Self {
            config: options.resolve(RiskLevel::Critical),
        }
    }
}

impl RuleChecker for NoWhereClauseChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_update(
        &self,
        _ctx: &SqlContext,
        update: &Update,
        result: &mut ValidationResult,
    ) -> CheckResult {
        if update.selection.is_none() {
            self.report(
                result,
                "UPDATE without WHERE clause modifies every row of the table",
                "Add a WHERE clause that limits the rows being updated",
            );
        }
        Ok(())
    }

    fn on_delete(
        &self,
        _ctx: &SqlContext,
        delete: &Delete,
        result: &mut ValidationResult,
    ) -> CheckResult {
        if delete.selection.is_none() {
            self.report(
                result,
                "DELETE without WHERE clause removes every row of the table",
                "Add a WHERE clause that limits the rows being deleted",
            );
        }
        Ok(())
    }
}
