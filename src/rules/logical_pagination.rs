//! Page requests that never reach the SQL

use super::{CheckResult, RuleChecker, is_unparsed_select, pagination_of};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::pagination::PaginationDetector;
use crate::result::ValidationResult;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::Query;

pub const ID: &str = "logical_pagination";

/// Reports LOGICAL pagination: the caller asked for a page, but without a
/// pagination plugin the whole result set is loaded and trimmed in memory
///
/// The requested offset and limit are recorded in the pass details.
#[derive(Debug, Clone)]
pub struct LogicalPaginationChecker {
    config: CheckerConfig,
    detector: PaginationDetector,
}

impl LogicalPaginationChecker {
    pub fn new(options: &CommonOptions, detector: PaginationDetector) -> Self {
        Self {
            config: options.resolve(RiskLevel::Critical),
            detector,
        }
    }

    fn inspect(&self, ctx: &SqlContext, result: &mut ValidationResult) {
        if pagination_of(&self.detector, ctx, result) != PaginationType::Logical {
            return;
        }

        let (offset, limit) = match (ctx.pagination_hint(), ctx.page_request()) {
            (Some(bounds), _) if !bounds.is_unbounded() => (bounds.offset, bounds.limit),
            (_, Some(page)) => (page.offset(), page.size),
            _ => return,
        };
        result.details.offset = Some(offset);
        result.details.limit = Some(limit);

        self.report(
            result,
            format!(
                "Logical pagination detected (offset={}, limit={}): the full result set is loaded into memory",
                offset, limit
            ),
            "Install a pagination plugin so page requests are rewritten into LIMIT clauses",
        );
    }
}

impl RuleChecker for LogicalPaginationChecker {
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
