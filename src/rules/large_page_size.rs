//! Oversized pages (`LIMIT 100000`)

use super::{CheckResult, RuleChecker, is_unparsed_select, pagination_of};
use crate::config::{CheckerConfig, LargePageSizeConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::pagination::{PaginationDetector, extract_page_size};
use crate::result::ValidationResult;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::Query;

pub const ID: &str = "large_page_size";

#[derive(Debug, Clone)]
pub struct LargePageSizeChecker {
    config: CheckerConfig,
    detector: PaginationDetector,
    max_page_size: u64,
}

impl LargePageSizeChecker {
    pub fn new(config: &LargePageSizeConfig, detector: PaginationDetector) -> Result<Self, GuardError> {
        if config.max_page_size == 0 {
            return Err(GuardError::invalid_config("large_page_size.max_page_size must be positive"));
        }
        Ok(Self {
            config: config.common.resolve(RiskLevel::Medium),
            detector,
            max_page_size: config.max_page_size,
        })
    }

    fn inspect(&self, ctx: &SqlContext, result: &mut ValidationResult) {
        if pagination_of(&self.detector, ctx, result) != PaginationType::Physical {
            return;
        }
        let Some(size) = extract_page_size(ctx) else {
            return;
        };
        if size > self.max_page_size {
            self.report(
                result,
                format!("Page size {} is too large for a single query", size),
                format!("Keep the page size at or below {}", self.max_page_size),
            );
        }
    }
}

impl RuleChecker for LargePageSizeChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        if is_unparsed_select(ctx) {
            self.inspect(ctx, result);
        }
        Ok(())
    }

    fn on_select(&self, ctx: &SqlContext, _: &Query, result: &mut ValidationResult) -> CheckResult {
        self.inspect(ctx, result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};
    use crate::types::SqlDialect;

    fn checker() -> LargePageSizeChecker {
        LargePageSizeChecker::new(&LargePageSizeConfig::default(), PaginationDetector::default()).unwrap()
    }

    #[test]
    fn test_large_limit_and_top() {
        let result = run(&checker(), &ctx("SELECT * FROM t WHERE a = 1 LIMIT 5000"));
        assert_eq!(result.overall_risk(), Some(RiskLevel::Medium));
        assert!(result.violations[0].message.contains("5000"));

        let mssql = SqlContext::builder("SELECT TOP 2000 * FROM t WHERE a = 1")
            .dialect(SqlDialect::SqlServer)
            .build()
            .unwrap();
        assert!(!run(&checker(), &mssql).passed());
    }

    #[test]
    fn test_small_or_placeholder_sizes_pass() {
        for sql in [
            "SELECT * FROM t WHERE a = 1 LIMIT 1000",
            "SELECT * FROM t WHERE a = 1 LIMIT ?",
            "SELECT * FROM t WHERE a = 1",
        ] {
            assert!(run(&checker(), &ctx(sql)).passed(), "Unexpected violation for {}", sql);
        }
    }
}
