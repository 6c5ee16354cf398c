//! Entry point tying configuration, parsing, dedup and the rule engine together

use crate::config::SqlGuardConfig;
use crate::context::{SqlContext, SqlContextBuilder};
use crate::dedup::DedupFilter;
use crate::engine::RuleEngine;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::sql_parser::snippet;
use crate::types::SqlDialect;

/// Configured guard for one data source
///
/// Contexts built through [`SqlGuard::context`] are parsed with the configured
/// dialect. With the duplicate filter enabled, a context seen moments ago
/// passes without being evaluated again. The match is on the trimmed SQL
/// together with the statement id, pagination hint and parameters, so the same
/// text with a different page is evaluated afresh. The filter belongs to the
/// guard and is shared by every thread that calls it.
///
/// # Examples
/// ```
/// # use sql_guard::{SqlGuard, SqlGuardConfig};
/// # use sql_guard::types::RiskLevel;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let guard = SqlGuard::new(&SqlGuardConfig::default())?;
///
/// let result = guard.validate_sql("UPDATE users SET status = 1")?;
/// assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
///
/// let ctx = guard
///     .context("SELECT name FROM users WHERE id = ?")
///     .param("id", 7)
///     .build()?;
/// assert!(guard.validate(&ctx).passed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqlGuard {
    engine: RuleEngine,
    dedup: Option<DedupFilter>,
    dialect: SqlDialect,
}

impl SqlGuard {
    pub fn new(config: &SqlGuardConfig) -> Result<Self, GuardError> {
        let engine = RuleEngine::from_config(config)?;
        let dedup = config
            .dedup
            .enabled
            .then(|| DedupFilter::from_config(&config.dedup));

        log::debug!(
            "SQL guard ready: dialect={}, dedup={}",
            config.dialect,
            dedup.is_some()
        );

        Ok(Self {
            engine,
            dedup,
            dialect: config.dialect,
        })
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Context builder preset with the guard's dialect
    pub fn context(&self, sql: impl Into<String>) -> SqlContextBuilder {
        SqlContext::builder(sql).dialect(self.dialect)
    }

    /// Evaluate a prepared context
    pub fn validate(&self, ctx: &SqlContext) -> ValidationResult {
        if self.dedup.as_ref().is_some_and(|d| d.is_duplicate(&dedup_key(ctx))) {
            log::debug!("Skipping recently checked SQL: {}", snippet(ctx.sql()));
            return ValidationResult::new();
        }
        self.engine.evaluate(ctx)
    }

    /// Parse and evaluate bare SQL with no parameters or pagination hint
    pub fn validate_sql(&self, sql: &str) -> Result<ValidationResult, GuardError> {
        let ctx = self.context(sql).build()?;
        Ok(self.validate(&ctx))
    }
}

/// Everything besides the dialect that can change a verdict for the same text
fn dedup_key(ctx: &SqlContext) -> String {
    format!(
        "{}\u{1f}{:?}\u{1f}{:?}\u{1f}{:?}",
        ctx.sql().trim(),
        ctx.statement_id(),
        ctx.pagination_hint(),
        ctx.params()
    )
}
