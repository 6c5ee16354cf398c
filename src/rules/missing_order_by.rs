//! Paged queries without a stable order

use super::{CheckResult, RuleChecker, pagination_of};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::pagination::PaginationDetector;
use crate::result::ValidationResult;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::{OrderByKind, Query};

pub const ID: &str = "missing_order_by";

#[derive(Debug, Clone)]
pub struct MissingOrderByChecker {
    config: CheckerConfig,
    detector: PaginationDetector,
}

impl MissingOrderByChecker {
    pub fn new(options: &CommonOptions, detector: PaginationDetector) -> Self {
        Self {
            config: options.resolve(RiskLevel::Low),
            detector,
        }
    }
}

fn has_order_by(query: &Query) -> bool {
    match &query.order_by {
        Some(order_by) => match &order_by.kind {
            OrderByKind::Expressions(exprs) => !exprs.is_empty(),
            _ => true,
        },
        None => false,
    }
}

impl RuleChecker for MissingOrderByChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_select(&self, ctx: &SqlContext, query: &Query, result: &mut ValidationResult) -> CheckResult {
        if pagination_of(&self.detector, ctx, result) != PaginationType::Physical {
            return Ok(());
        }
        if !has_order_by(query) {
            self.report(
                result,
                "Paginated query has no ORDER BY; page contents are not stable between calls",
                "Add an ORDER BY on a unique column so pages do not overlap or skip rows",
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    fn checker() -> MissingOrderByChecker {
        MissingOrderByChecker::new(&CommonOptions::default(), PaginationDetector::default())
    }

    #[test]
    fn test_limit_without_order_by_is_low() {
        let result = run(&checker(), &ctx("SELECT * FROM t WHERE a = 1 LIMIT 10"));
        assert_eq!(result.overall_risk(), Some(RiskLevel::Low));
        assert_eq!(checker().config().strategy, crate::types::ViolationStrategy::Log);
    }

    #[test]
    fn test_ordered_or_unpaged_queries_pass() {
        for sql in [
            "SELECT * FROM t WHERE a = 1 ORDER BY id LIMIT 10",
            "SELECT * FROM t WHERE a = 1",
        ] {
            assert!(run(&checker(), &ctx(sql)).passed(), "Unexpected violation for {}", sql);
        }
    }
}
