//! SELECTs that can return an unbounded number of rows

use super::blacklist_field::all_blacklisted;
use super::{CheckResult, RuleChecker, pagination_of};
use crate::ast::{
    DummyConditionMatcher, collect_columns, has_key_equality, outer_select, primary_table,
};
use crate::config::{BlacklistFieldConfig, CheckerConfig, NoPaginationConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::pagination::PaginationDetector;
use crate::patterns::{NameMatcher, StatementIdPatterns};
use crate::result::ValidationResult;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::Query;

pub const ID: &str = "no_pagination";

/// Reports unpaginated SELECTs, stratified by how selective the WHERE clause is
///
/// | WHERE clause                       | Risk     |
/// |------------------------------------|----------|
/// | absent or always true              | CRITICAL |
/// | only blacklisted fields            | HIGH     |
/// | anything else, when enforced       | MEDIUM   |
///
/// Exempt are allowlisted statement ids and tables, and queries whose WHERE
/// pins a unique key (`id = ?`) and so returns at most one row.
#[derive(Debug, Clone)]
pub struct NoPaginationChecker {
    config: CheckerConfig,
    detector: PaginationDetector,
    statement_ids: StatementIdPatterns,
    tables: NameMatcher,
    unique_keys: NameMatcher,
    blacklist: NameMatcher,
    enforce_for_all_queries: bool,
    dummy: DummyConditionMatcher,
}

impl NoPaginationChecker {
    pub fn new(
        config: &NoPaginationConfig,
        blacklist: &BlacklistFieldConfig,
        detector: PaginationDetector,
    ) -> Result<Self, GuardError> {
        let unique_keys = std::iter::once("id")
            .chain(config.unique_key_fields.iter().map(String::as_str));

        Ok(Self {
            config: config.common.resolve(RiskLevel::Critical),
            detector,
            statement_ids: StatementIdPatterns::new(&config.whitelist_statement_ids)?,
            tables: NameMatcher::new(&config.whitelist_tables)?,
            unique_keys: NameMatcher::new(unique_keys)?,
            blacklist: NameMatcher::new(&blacklist.fields)?,
            enforce_for_all_queries: config.enforce_for_all_queries,
            dummy: DummyConditionMatcher::default(),
        })
    }

    fn is_exempt(&self, ctx: &SqlContext) -> bool {
        if ctx.statement_id().is_some_and(|id| self.statement_ids.matches(id)) {
            return true;
        }
        primary_table(&ctx.kind()).is_some_and(|table| self.tables.matches(&table))
    }
}

impl RuleChecker for NoPaginationChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_select(&self, ctx: &SqlContext, query: &Query, result: &mut ValidationResult) -> CheckResult {
        if pagination_of(&self.detector, ctx, result) != PaginationType::None {
            return Ok(());
        }
        // Set operations have no single WHERE to judge
        let Some(select) = outer_select(query) else {
            return Ok(());
        };
        if self.is_exempt(ctx) {
            return Ok(());
        }

        let selection = select.selection.as_ref();
        if selection.is_some_and(|expr| has_key_equality(expr, &self.unique_keys)) {
            return Ok(());
        }

        match selection {
            None => self.report_at(
                result,
                RiskLevel::Critical,
                "SELECT without WHERE and without pagination can return the whole table",
                "Add a WHERE condition and a LIMIT (or a page request)",
            ),
            Some(expr) if self.dummy.is_always_true(expr) => self.report_at(
                result,
                RiskLevel::Critical,
                format!(
                    "SELECT with always-true WHERE ({}) and no pagination can return the whole table",
                    expr
                ),
                "Add a real WHERE condition and a LIMIT (or a page request)",
            ),
            Some(expr) => {
                let columns = collect_columns(expr);
                if all_blacklisted(&columns, &self.blacklist) {
                    let list = columns.into_iter().collect::<Vec<_>>().join(", ");
                    self.report_at(
                        result,
                        RiskLevel::High,
                        format!(
                            "SELECT filters only on blacklisted fields [{}] without pagination",
                            list
                        ),
                        "Add a selective business condition or a LIMIT",
                    );
                } else if self.enforce_for_all_queries {
                    self.report_at(
                        result,
                        RiskLevel::Medium,
                        "SELECT has no pagination",
                        "Add a LIMIT to bound the result size",
                    );
                }
            }
        }
        Ok(())
    }
}
