//! Stored procedure calls (`CALL`, `EXECUTE`, `EXEC`)

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::result::ValidationResult;
use crate::sql_parser::strip_comments;
use crate::types::{RiskLevel, ViolationStrategy};
use lazy_regex::{Lazy, Regex, lazy_regex};

pub const ID: &str = "call_statement";

static CALL_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)^\s*CALL\s+([a-z_][a-z0-9_.]*)\s*(?:\(|;|$)");
static EXECUTE_REGEX: Lazy<Regex> =
    lazy_regex!(r"(?i)^\s*EXECUTE\s+([a-z_][a-z0-9_.]*)\s*(?:\(|@|;|\s|$)");
static EXEC_REGEX: Lazy<Regex> =
    lazy_regex!(r"(?i)^\s*EXEC\s+([a-z_][a-z0-9_.]*)\s*(?:\(|@|;|\s|$)");

/// Reports procedure calls
///
/// Procedures may be a legitimate part of the architecture, so the default
/// strategy is WARN even though the risk is HIGH.
#[derive(Debug, Clone)]
pub struct CallStatementChecker {
    config: CheckerConfig,
}

impl CallStatementChecker {
    pub fn new(options: &CommonOptions) -> Self {
        Self {
            config: options.resolve_with(RiskLevel::High, ViolationStrategy::Warn),
        }
    }
}

/// Keyword and procedure name of a leading call
fn procedure_call(sql: &str) -> Option<(&'static str, String)> {
    [
        ("CALL", &CALL_REGEX),
        ("EXECUTE", &EXECUTE_REGEX),
        ("EXEC", &EXEC_REGEX),
    ]
    .into_iter()
    .find_map(|(keyword, regex)| {
        regex
            .captures(sql)
            .and_then(|caps| caps.get(1))
            .map(|name| (keyword, name.as_str().to_string()))
    })
}

impl RuleChecker for CallStatementChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        let cleaned = strip_comments(ctx.sql(), ctx.dialect());
        if let Some((keyword, procedure)) = procedure_call(&cleaned) {
            self.report(
                result,
                format!("Stored procedure call detected: {} {}", keyword, procedure),
                "Move the procedure logic into the application or allowlist the call explicitly",
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    #[test]
    fn test_call_forms() {
        let checker = CallStatementChecker::new(&CommonOptions::default());
        assert_eq!(checker.config().strategy, ViolationStrategy::Warn);

        for (sql, expected) in [
            ("CALL sp_user_create(1, 'x')", "CALL sp_user_create"),
            ("/* job */ EXECUTE dbo.cleanup @days = 3", "EXECUTE dbo.cleanup"),
            ("exec sp_who", "EXEC sp_who"),
            ("CALL refresh;", "CALL refresh"),
            ("EXECUTE sp_foo 1, 2", "EXECUTE sp_foo"),
            ("EXECUTE IMMEDIATE 'DROP TABLE t'", "EXECUTE IMMEDIATE"),
            ("EXEC sp_foo 1, 2", "EXEC sp_foo"),
        ] {
            let result = run(&checker, &ctx(sql));
            assert_eq!(result.overall_risk(), Some(RiskLevel::High), "For {}", sql);
            assert!(
                result.violations[0].message.ends_with(expected),
                "Unexpected message {}",
                result.violations[0].message
            );
        }
    }

    #[test]
    fn test_non_calls_pass() {
        let checker = CallStatementChecker::new(&CommonOptions::default());
        for sql in [
            "SELECT * FROM calls WHERE id = 1",
            "SELECT 'CALL x()' FROM t",
            "UPDATE t SET executed = 1 WHERE id = 2",
        ] {
            assert!(run(&checker, &ctx(sql)).passed(), "Unexpected violation for {}", sql);
        }
    }
}
