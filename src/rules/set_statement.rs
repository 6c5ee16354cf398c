//! Session variable changes (`SET autocommit = 0`, `SET sql_mode = ''`)

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::result::ValidationResult;
use crate::sql_parser::strip_comments;
use crate::types::RiskLevel;
use lazy_regex::{Lazy, Regex, lazy_regex};

pub const ID: &str = "set_statement";

static UPDATE_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)^\s*UPDATE\b");
static SET_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)^\s*SET\s+(\S+)");

#[derive(Debug, Clone)]
pub struct SetStatementChecker {
    config: CheckerConfig,
}

impl SetStatementChecker {
    pub fn new(options: &CommonOptions) -> Self {
        Self {
            config: options.resolve(RiskLevel::Medium),
        }
    }
}

impl RuleChecker for SetStatementChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        let cleaned = strip_comments(ctx.sql(), ctx.dialect());
        // UPDATE ... SET is a column assignment
        if UPDATE_REGEX.is_match(&cleaned) {
            return Ok(());
        }

        if let Some(target) = SET_REGEX.captures(&cleaned).and_then(|caps| caps.get(1)) {
            self.report(
                result,
                format!("Session variable change detected: SET {}", target.as_str()),
                "Configure session variables in the connection pool, not in application SQL",
            );
        }
        Ok(())
    }
}
