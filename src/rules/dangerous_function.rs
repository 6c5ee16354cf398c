//! Calls to functions that read files, run OS commands or stall the server

use super::{CheckResult, RuleChecker};
use crate::ast::FunctionCollector;
use crate::config::{CheckerConfig, DangerousFunctionConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use std::collections::BTreeSet;

pub const ID: &str = "dangerous_function";

#[derive(Debug, Clone)]
pub struct DangerousFunctionChecker {
    config: CheckerConfig,
    denied: BTreeSet<String>,
}

impl DangerousFunctionChecker {
    pub fn new(config: &DangerousFunctionConfig) -> Result<Self, GuardError> {
        let mut denied = BTreeSet::new();
        for name in &config.denied_functions {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return Err(GuardError::invalid_config("Denied function name cannot be empty"));
            }
            denied.insert(name);
        }

        Ok(Self {
            config: config.common.resolve(RiskLevel::Critical),
            denied,
        })
    }
}

impl RuleChecker for DangerousFunctionChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    // Every parsed statement kind is walked, so dispatch is bypassed
    fn check(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        let Some(statement) = ctx.statement() else {
            return Ok(());
        };
        if self.denied.is_empty() {
            return Ok(());
        }

        let called = FunctionCollector::collect(statement);
        for name in called.intersection(&self.denied) {
            self.report(
                result,
                format!("Dangerous function detected: {}()", name),
                format!(
                    "Remove the call to {}(); it can reach the file system or stall the server",
                    name
                ),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    fn checker() -> DangerousFunctionChecker {
        DangerousFunctionChecker::new(&DangerousFunctionConfig::default()).unwrap()
    }

    #[test]
    fn test_one_violation_per_distinct_function() {
        let result = run(
            &checker(),
            &ctx("SELECT SLEEP(1), sleep(2), LOAD_FILE('/etc/passwd') FROM t WHERE id = 1"),
        );
        assert_eq!(result.violations.len(), 2);
        assert!(result.violations[0].message.contains("load_file"));
        assert!(result.violations[1].message.contains("sleep"));
    }

    #[test]
    fn test_nested_locations() {
        for sql in [
            "SELECT * FROM t WHERE id = 1 AND BENCHMARK(1000000, MD5('a')) > 0",
            "SELECT * FROM t WHERE id IN (SELECT id FROM u WHERE SLEEP(5) = 0)",
            "UPDATE t SET a = LOAD_FILE('/x') WHERE id = 1",
            "SELECT CASE WHEN 1 = 1 THEN SYS_EVAL('id') END FROM t",
            "INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = SLEEP(5)",
            "SELECT SUM(a) OVER (PARTITION BY SLEEP(5)) FROM t",
        ] {
            let result = run(&checker(), &ctx(sql));
            assert_eq!(result.overall_risk(), Some(RiskLevel::Critical), "For {}", sql);
        }
    }

    #[test]
    fn test_safe_functions_pass() {
        let result = run(&checker(), &ctx("SELECT COUNT(*), MAX(id), NOW() FROM t"));
        assert!(result.passed());
    }
}
