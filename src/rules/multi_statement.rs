//! Statement stacking (`...; DROP TABLE t`)

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::lexer::stacked_statement_offset;
use crate::result::ValidationResult;
use crate::types::RiskLevel;

pub const ID: &str = "multi_statement";

/// Reports a `;` outside literals that is followed by more SQL
///
/// A trailing separator, optionally followed by comments or further
/// separators, is accepted.
#[derive(Debug, Clone)]
pub struct MultiStatementChecker {
    config: CheckerConfig,
}

impl MultiStatementChecker {
    pub fn new(options: &CommonOptions) -> Self {
        Self {
            config: options.resolve(RiskLevel::Critical),
        }
    }
}

impl RuleChecker for MultiStatementChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        if let Some(offset) = stacked_statement_offset(ctx.sql(), ctx.dialect()) {
            self.report(
                result,
                format!(
                    "Multiple statements detected (separator at position {}), possible SQL injection",
                    offset
                ),
                "Remove the statement separator or make sure user input is bound as a parameter",
            );
        }
        Ok(())
    }
}
