//! WHERE clauses padded with no-op comparisons such as `1=1`

use super::{CheckResult, RuleChecker};
use crate::ast::{DummyConditionMatcher, where_clause};
use crate::config::{CheckerConfig, DummyConditionConfig};
use crate::context::SqlContext;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::{Delete, Expr, Query, Update};

pub const ID: &str = "dummy_condition";

#[derive(Debug, Clone)]
pub struct DummyConditionChecker {
    config: CheckerConfig,
    matcher: DummyConditionMatcher,
}

impl DummyConditionChecker {
    pub fn new(config: &DummyConditionConfig) -> Self {
        let patterns = config.patterns.iter().chain(config.custom_patterns.iter());
        Self {
            config: config.common.resolve(RiskLevel::High),
            matcher: DummyConditionMatcher::new(patterns),
        }
    }

    fn inspect(&self, selection: Option<&Expr>, result: &mut ValidationResult) {
        let Some(expr) = selection else {
            return;
        };
        if self.matcher.contains_dummy(expr) {
            self.report(
                result,
                format!("WHERE clause contains a no-op condition: {}", expr),
                "Remove the constant comparison and build the WHERE clause conditionally",
            );
        }
    }
}

impl RuleChecker for DummyConditionChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_select(
        &self,
        ctx: &SqlContext,
        _query: &Query,
        result: &mut ValidationResult,
    ) -> CheckResult {
        self.inspect(where_clause(&ctx.kind()), result);
        Ok(())
    }

    fn on_update(
        &self,
        _ctx: &SqlContext,
        update: &Update,
        result: &mut ValidationResult,
    ) -> CheckResult {
        self.inspect(update.selection.as_ref(), result);
        Ok(())
    }

    fn on_delete(
        &self,
        _ctx: &SqlContext,
        delete: &Delete,
        result: &mut ValidationResult,
    ) -> CheckResult {
        self.inspect(delete.selection.as_ref(), result);
        Ok(())
    }
}
