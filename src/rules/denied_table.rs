//! Access to tables that application SQL must never touch

use super::{CheckResult, RuleChecker};
use crate::ast::collect_tables;
use crate::config::{CheckerConfig, DeniedTableConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::patterns::TablePatternSet;
use crate::result::ValidationResult;
use crate::types::RiskLevel;

pub const ID: &str = "denied_table";

/// Reports every denied table a statement references, in a single violation
///
/// Tables are collected from FROM, JOIN, sub-queries, CTEs and DML targets of
/// any parsed statement kind.
#[derive(Debug, Clone)]
pub struct DeniedTableChecker {
    config: CheckerConfig,
    denied: TablePatternSet,
}

impl DeniedTableChecker {
    pub fn new(config: &DeniedTableConfig) -> Result<Self, GuardError> {
        Ok(Self {
            config: config.common.resolve(RiskLevel::Critical),
            denied: TablePatternSet::new(&config.denied_tables)?,
        })
    }
}

impl RuleChecker for DeniedTableChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        if self.denied.is_empty() {
            return Ok(());
        }
        let Some(statement) = ctx.statement() else {
            return Ok(());
        };

        let found: Vec<String> = collect_tables(statement, &ctx.kind())
            .into_iter()
            .filter(|table| self.denied.matches(table))
            .collect();

        let message = match found.as_slice() {
            [] => return Ok(()),
            [single] => format!("Access to denied table '{}' is not allowed", single),
            many => format!("Access to denied tables [{}] is not allowed", many.join(", ")),
        };
        self.report(
            result,
            message,
            "Remove the denied tables from the query or request access through a reviewed API",
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    fn checker(patterns: &[&str]) -> DeniedTableChecker {
        let config = DeniedTableConfig {
            denied_tables: patterns.iter().map(|p| p.to_string()).collect(),
            ..DeniedTableConfig::default()
        };
        DeniedTableChecker::new(&config).unwrap()
    }

    #[test]
    fn test_wildcard_word_boundary() {
        let checker = checker(&["sys_*"]);
        let result = run(&checker, &ctx("SELECT * FROM sys_user WHERE id = 1"));
        assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
        assert_eq!(
            result.violations[0].message,
            "Access to denied table 'sys_user' is not allowed"
        );

        assert!(run(&checker, &ctx("SELECT * FROM system WHERE id = 1")).passed());
        assert!(run(&checker, &ctx("SELECT * FROM sys_user_detail WHERE id = 1")).passed());
    }

    #[test]
    fn test_all_reference_positions() {
        let checker = checker(&["sys_*", "admin_users"]);
        for sql in [
            "SELECT * FROM `app`.`sys_role`",
            "SELECT u.* FROM users u JOIN admin_users a ON a.id = u.id",
            "SELECT * FROM users WHERE id IN (SELECT uid FROM sys_user)",
            "WITH x AS (SELECT * FROM sys_config) SELECT * FROM x",
            "DELETE FROM admin_users WHERE id = 1",
        ] {
            assert!(!run(&checker, &ctx(sql)).passed(), "Expected violation for {}", sql);
        }
    }

    #[test]
    fn test_single_violation_lists_all() {
        let checker = checker(&["sys_*", "admin_users"]);
        let result = run(
            &checker,
            &ctx("SELECT * FROM sys_user JOIN admin_users ON sys_user.id = admin_users.id"),
        );
        assert_eq!(result.violations.len(), 1);
        assert_eq!(
            result.violations[0].message,
            "Access to denied tables [sys_user, admin_users] is not allowed"
        );
    }

    #[test]
    fn test_empty_denylist_passes() {
        let checker = checker(&[]);
        assert!(run(&checker, &ctx("SELECT * FROM sys_user")).passed());
    }
}
