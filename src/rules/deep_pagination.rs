//! Large OFFSET values

use super::{CheckResult, RuleChecker, is_unparsed_select, pagination_of};
use crate::config::{CheckerConfig, DeepPaginationConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::pagination::{PaginationDetector, extract_offset};
use crate::result::ValidationResult;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::Query;

pub const ID: &str = "deep_pagination";

/// Reports OFFSETs above `max_offset`; the database reads and discards every
/// skipped row
///
/// Skipped when no-condition pagination already reported the query in this
/// pass. Parameterised offsets are unknown and abstain.
#[derive(Debug, Clone)]
pub struct DeepPaginationChecker {
    config: CheckerConfig,
    detector: PaginationDetector,
    max_offset: u64,
}

impl DeepPaginationChecker {
    pub fn new(config: &DeepPaginationConfig, detector: PaginationDetector) -> Result<Self, GuardError> {
        if config.max_offset == 0 {
            return Err(GuardError::invalid_config("deep_pagination.max_offset must be positive"));
        }
        Ok(Self {
            config: config.common.resolve(RiskLevel::Medium),
            detector,
            max_offset: config.max_offset,
        })
    }

    fn inspect(&self, ctx: &SqlContext, result: &mut ValidationResult) {
        if result.details.early_return {
            log::debug!("{} skipped: query already reported as unconditioned", ID);
            return;
        }
        if pagination_of(&self.detector, ctx, result) != PaginationType::Physical {
            return;
        }
        let Some(offset) = extract_offset(ctx) else {
            return;
        };
        if offset > self.max_offset {
            self.report(
                result,
                format!(
                    "Deep pagination offset={} exceeds {}: the database scans and discards {} rows",
                    offset, self.max_offset, offset
                ),
                "Use cursor pagination (WHERE id > lastId ORDER BY id LIMIT n) instead of a large OFFSET",
            );
        }
    }
}

impl RuleChecker for DeepPaginationChecker {
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
