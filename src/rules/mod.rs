//! Rule checkers and the dispatch contract they share
//!
//! Each checker lives in its own module. The engine runs them in the order
//! returned by [`build_checkers`], which no-condition pagination and deep
//! pagination depend on.

use crate::config::{CheckerConfig, SqlGuardConfig};
use crate::context::{SqlContext, StatementKind};
use crate::error::GuardError;
use crate::pagination::PaginationDetector;
use crate::result::ValidationResult;
use crate::sql_parser::extract_first_keyword;
use crate::types::{PaginationType, RiskLevel};
use sqlparser::ast::{Delete, Insert, Query, Statement, Update};

// Structural checkers
pub mod blacklist_field;
pub mod ddl_operation;
pub mod denied_table;
pub mod dummy_condition;
pub mod no_where_clause;
pub mod readonly_table;
pub mod whitelist_field;

// Lexical checkers
pub mod call_statement;
pub mod into_outfile;
pub mod metadata_statement;
pub mod multi_statement;
pub mod set_statement;
pub mod sql_comment;

// Injection checkers
pub mod dangerous_function;
pub mod set_operation;

// Pagination checkers
pub mod deep_pagination;
pub mod large_page_size;
pub mod logical_pagination;
pub mod missing_order_by;
pub mod no_condition_pagination;
pub mod no_pagination;

pub use blacklist_field::BlacklistFieldChecker;
pub use call_statement::CallStatementChecker;
pub use dangerous_function::DangerousFunctionChecker;
pub use ddl_operation::DdlOperationChecker;
pub use deep_pagination::DeepPaginationChecker;
pub use denied_table::DeniedTableChecker;
pub use dummy_condition::DummyConditionChecker;
pub use into_outfile::IntoOutfileChecker;
pub use large_page_size::LargePageSizeChecker;
pub use logical_pagination::LogicalPaginationChecker;
pub use metadata_statement::MetadataStatementChecker;
pub use missing_order_by::MissingOrderByChecker;
pub use multi_statement::MultiStatementChecker;
pub use no_condition_pagination::NoConditionPaginationChecker;
pub use no_pagination::NoPaginationChecker;
pub use no_where_clause::NoWhereClauseChecker;
pub use readonly_table::ReadOnlyTableChecker;
pub use set_operation::SetOperationChecker;
pub use set_statement::SetStatementChecker;
pub use sql_comment::SqlCommentChecker;
pub use whitelist_field::WhitelistFieldChecker;

/// Outcome of one checker invocation; findings go into the result, not here
pub type CheckResult = Result<(), GuardError>;

/// A single safety or performance rule
///
/// Implementors override the handlers they need. The default [`check`] runs
/// [`check_raw`] for every statement, parsed or not, then matches the statement
/// kind once and calls the one matching handler. Unparsable statements only reach
/// `check_raw`.
///
/// Checkers are shared across threads and must not keep per-statement state.
///
/// [`check`]: RuleChecker::check
/// [`check_raw`]: RuleChecker::check_raw
pub trait RuleChecker: Send + Sync {
    /// Stable identifier recorded on every violation
    fn id(&self) -> &'static str;

    fn config(&self) -> &CheckerConfig;

    fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    fn check(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        self.check_raw(ctx, result)?;

        match ctx.kind() {
            StatementKind::Select(query) => self.on_select(ctx, query, result),
            StatementKind::Update(update) => self.on_update(ctx, update, result),
            StatementKind::Delete(delete) => self.on_delete(ctx, delete, result),
            StatementKind::Insert(insert) => self.on_insert(ctx, insert, result),
            StatementKind::Other(statement) => self.on_other(ctx, statement, result),
            StatementKind::Unparsable => Ok(()),
        }
    }

    /// Text-level handler, invoked whether or not the SQL parsed
    fn check_raw(&self, _ctx: &SqlContext, _result: &mut ValidationResult) -> CheckResult {
        Ok(())
    }

    fn on_select(
        &self,
        _ctx: &SqlContext,
        _query: &Query,
        _result: &mut ValidationResult,
    ) -> CheckResult {
        Ok(())
    }

    fn on_update(
        &self,
        _ctx: &SqlContext,
        _update: &Update,
        _result: &mut ValidationResult,
    ) -> CheckResult {
        Ok(())
    }

    fn on_delete(
        &self,
        _ctx: &SqlContext,
        _delete: &Delete,
        _result: &mut ValidationResult,
    ) -> CheckResult {
        Ok(())
    }

    fn on_insert(
        &self,
        _ctx: &SqlContext,
        _insert: &Insert,
        _result: &mut ValidationResult,
    ) -> CheckResult {
        Ok(())
    }

    /// Parsed statements other than SELECT/UPDATE/DELETE/INSERT
    fn on_other(
        &self,
        _ctx: &SqlContext,
        _statement: &Statement,
        _result: &mut ValidationResult,
    ) -> CheckResult {
        Ok(())
    }

    /// Record a violation at the configured risk level
    fn report(
        &self,
        result: &mut ValidationResult,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) where
        Self: Sized,
    {
        self.report_at(result, self.config().risk_level, message, suggestion);
    }

    /// Record a violation at an explicit risk level (stratified checkers)
    fn report_at(
        &self,
        result: &mut ValidationResult,
        risk_level: RiskLevel,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) where
        Self: Sized,
    {
        let message = message.into();
        log::debug!("{} reported {}: {}", self.id(), risk_level, message);
        result.report(risk_level, message, suggestion, self.id());
    }
}

/// Pagination classification for the current pass, computed once
///
/// The first pagination checker to ask stores the answer in the pass details;
/// later ones reuse it.
pub(crate) fn pagination_of(
    detector: &PaginationDetector,
    ctx: &SqlContext,
    result: &mut ValidationResult,
) -> PaginationType {
    if let Some(kind) = result.details.pagination_type {
        return kind;
    }
    let kind = detector.classify(ctx);
    result.details.pagination_type = Some(kind);
    kind
}

/// A SELECT the parser could not represent (MyBatis placeholders, vendor syntax)
///
/// Pagination checkers that work from the text alone still inspect these.
pub(crate) fn is_unparsed_select(ctx: &SqlContext) -> bool {
    matches!(ctx.kind(), StatementKind::Unparsable)
        && extract_first_keyword(ctx.sql(), ctx.dialect()).is_ok_and(|kw| kw == "select")
}

/// Build every checker from `config` in evaluation order
///
/// Patterns are compiled and allowlists validated here, so a configuration
/// mistake surfaces before any statement is evaluated.
pub fn build_checkers(config: &SqlGuardConfig) -> Result<Vec<Box<dyn RuleChecker>>, GuardError> {
    let detector = PaginationDetector::new(config.pagination_plugin_installed);

    let checkers: Vec<Box<dyn RuleChecker>> = vec![
        Box::new(NoWhereClauseChecker::new(&config.no_where_clause)),
        Box::new(DummyConditionChecker::new(&config.dummy_condition)),
        Box::new(BlacklistFieldChecker::new(&config.blacklist_field)?),
        Box::new(WhitelistFieldChecker::new(&config.whitelist_field)?),
        Box::new(MultiStatementChecker::new(&config.multi_statement)),
        Box::new(SetOperationChecker::new(&config.set_operation)?),
        Box::new(SqlCommentChecker::new(&config.sql_comment)),
        Box::new(IntoOutfileChecker::new(&config.into_outfile)),
        Box::new(DdlOperationChecker::new(&config.ddl_operation)?),
        Box::new(DangerousFunctionChecker::new(&config.dangerous_function)?),
        Box::new(CallStatementChecker::new(&config.call_statement)),
        Box::new(MetadataStatementChecker::new(&config.metadata_statement)?),
        Box::new(SetStatementChecker::new(&config.set_statement)),
        Box::new(DeniedTableChecker::new(&config.denied_table)?),
        Box::new(ReadOnlyTableChecker::new(&config.readonly_table)?),
        Box::new(LogicalPaginationChecker::new(&config.logical_pagination, detector)),
        Box::new(NoConditionPaginationChecker::new(
            &config.no_condition_pagination,
            detector,
        )),
        Box::new(DeepPaginationChecker::new(&config.deep_pagination, detector)?),
        Box::new(LargePageSizeChecker::new(&config.large_page_size, detector)?),
        Box::new(MissingOrderByChecker::new(&config.missing_order_by, detector)),
        Box::new(NoPaginationChecker::new(
            &config.no_pagination,
            &config.blacklist_field,
            detector,
        )?),
    ];

    Ok(checkers)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Context for `sql` in the default dialect
    pub fn ctx(sql: &str) -> SqlContext {
        SqlContext::builder(sql).build().unwrap()
    }

    /// Run one checker and return its result
    pub fn run(checker: &dyn RuleChecker, ctx: &SqlContext) -> ValidationResult {
        let mut result = ValidationResult::new();
        checker.check(ctx, &mut result).unwrap();
        result
    }
}
