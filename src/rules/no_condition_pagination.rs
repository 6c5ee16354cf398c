//! Physical pagination over an unfiltered table

use super::{CheckResult, RuleChecker, pagination_of};
use crate::ast::{DummyConditionMatcher, outer_select};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::pagination::{PaginationDetector, extract_offset, extract_page_size};
use crate::result::ValidationResult;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::Query;

pub const ID: &str = "no_condition_pagination";

/// Reports `LIMIT` on a query without a real WHERE clause: the rows returned
/// are bounded but the table is still scanned
///
/// On firing it sets the early-return flag so deep pagination does not report
/// the same query again.
#[derive(Debug, Clone)]
pub struct NoConditionPaginationChecker {
    config: CheckerConfig,
    detector: PaginationDetector,
    dummy: DummyConditionMatcher,
}

impl NoConditionPaginationChecker {
    pub fn new(options: &CommonOptions, detector: PaginationDetector) -> Self {
        Self {
            config: options.resolve(RiskLevel::Critical),
            detector,
            dummy: DummyConditionMatcher::default(),
        }
    }
}

impl RuleChecker for NoConditionPaginationChecker {
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
        let Some(select) = outer_select(query) else {
            return Ok(());
        };
        let unconditioned = match &select.selection {
            None => true,
            Some(expr) => self.dummy.is_always_true(expr),
        };
        if !unconditioned {
            return Ok(());
        }

        let limit = extract_page_size(ctx);
        result.details.early_return = true;
        result.details.limit = limit;
        result.details.offset = extract_offset(ctx).or_else(|| limit.map(|_| 0));

        self.report(
            result,
            "Physical pagination without a WHERE condition still scans the whole table",
            "Add a business WHERE condition that narrows the rows being paged",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    fn checker() -> NoConditionPaginationChecker {
        NoConditionPaginationChecker::new(&CommonOptions::default(), PaginationDetector::default())
    }

    #[test]
    fn test_limit_without_where() {
        let result = run(&checker(), &ctx("SELECT * FROM user LIMIT 100"));
        assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
        assert!(result.details.early_return);
        assert_eq!(result.details.limit, Some(100));
        assert_eq!(result.details.offset, Some(0));
    }

    #[test]
    fn test_limit_with_dummy_where() {
        let result = run(&checker(), &ctx("SELECT * FROM user WHERE 1=1 LIMIT 10 OFFSET 20"));
        assert!(!result.passed());
        assert_eq!(result.details.offset, Some(20));
    }

    #[test]
    fn test_conditioned_or_unpaged_queries_pass() {
        for sql in [
            "SELECT * FROM user WHERE status = 'active' LIMIT 20",
            "SELECT * FROM user",
            "SELECT * FROM user WHERE 1=1 AND id > 5 LIMIT 20",
        ] {
            let result = run(&checker(), &ctx(sql));
            assert!(result.passed(), "Unexpected violation for {}", sql);
            assert!(!result.details.early_return);
        }
    }
}
