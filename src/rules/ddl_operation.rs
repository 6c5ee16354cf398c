//! Schema changes issued through the application connection

use super::{CheckResult, RuleChecker};
use crate::config::{AllowlistConfig, CheckerConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::Statement;
use std::collections::BTreeSet;

pub const ID: &str = "ddl_operation";

/// Operation names accepted in `allowed_operations`
const DDL_OPERATIONS: [&str; 4] = ["CREATE", "ALTER", "DROP", "TRUNCATE"];

/// Blocks CREATE, ALTER, DROP and TRUNCATE unless the operation is allowlisted
#[derive(Debug, Clone)]
pub struct DdlOperationChecker {
    config: CheckerConfig,
    allowed: BTreeSet<&'static str>,
}

impl DdlOperationChecker {
    pub fn new(config: &AllowlistConfig) -> Result<Self, GuardError> {
        let mut allowed = BTreeSet::new();
        for name in &config.allowed_operations {
            let upper = name.trim().to_uppercase();
            let op = DDL_OPERATIONS
                .iter()
                .find(|op| **op == upper)
                .ok_or_else(|| {
                    GuardError::invalid_config(format!(
                        "Unknown DDL operation '{}', expected one of {:?}",
                        name, DDL_OPERATIONS
                    ))
                })?;
            allowed.insert(*op);
        }

        Ok(Self {
            config: config.common.resolve(RiskLevel::Critical),
            allowed,
        })
    }
}

/// Operation family and concrete statement name, `None` for non-DDL
fn classify(statement: &Statement) -> Option<(&'static str, String)> {
    let (op, name) = match statement {
        Statement::CreateTable { .. } => ("CREATE", "CREATE TABLE".to_string()),
        Statement::CreateView { .. } => ("CREATE", "CREATE VIEW".to_string()),
        Statement::CreateIndex { .. } => ("CREATE", "CREATE INDEX".to_string()),
        Statement::CreateSchema { .. } => ("CREATE", "CREATE SCHEMA".to_string()),
        Statement::CreateDatabase { .. } => ("CREATE", "CREATE DATABASE".to_string()),
        Statement::AlterTable { .. } => ("ALTER", "ALTER TABLE".to_string()),
        Statement::AlterView { .. } => ("ALTER", "ALTER VIEW".to_string()),
        Statement::AlterIndex { .. } => ("ALTER", "ALTER INDEX".to_string()),
        Statement::Drop { object_type, .. } => ("DROP", format!("DROP {}", object_type)),
        Statement::Truncate { .. } => ("TRUNCATE", "TRUNCATE TABLE".to_string()),
        _ => return None,
    };
    Some((op, name))
}

impl RuleChecker for DdlOperationChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_other(
        &self,
        _ctx: &SqlContext,
        statement: &Statement,
        result: &mut ValidationResult,
    ) -> CheckResult {
        let Some((op, name)) = classify(statement) else {
            return Ok(());
        };
        if !self.allowed.contains(op) {
            self.report(
                result,
                format!("DDL operation {} is not allowed at runtime", name),
                "Run schema changes through a migration tool, not application SQL",
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
    fn test_ddl_blocked_by_default() {
        let checker = DdlOperationChecker::new(&AllowlistConfig::default()).unwrap();
        for (sql, name) in [
            ("DROP TABLE users", "DROP TABLE"),
            ("TRUNCATE TABLE logs", "TRUNCATE TABLE"),
            ("CREATE TABLE t (id INT)", "CREATE TABLE"),
            ("ALTER TABLE t ADD COLUMN c INT", "ALTER TABLE"),
            ("CREATE INDEX idx_a ON t (a)", "CREATE INDEX"),
        ] {
            let result = run(&checker, &ctx(sql));
            assert_eq!(result.overall_risk(), Some(RiskLevel::Critical), "For {}", sql);
            assert!(
                result.violations[0].message.contains(name),
                "Message should name {}: {}",
                name,
                result.violations[0].message
            );
        }
    }

    #[test]
    fn test_allowlisted_operation() {
        let config = AllowlistConfig {
            allowed_operations: vec!["create".to_string()],
            ..AllowlistConfig::default()
        };
        let checker = DdlOperationChecker::new(&config).unwrap();
        assert!(run(&checker, &ctx("CREATE TABLE t (id INT)")).passed());
        assert!(!run(&checker, &ctx("DROP TABLE t")).passed());
        assert!(run(&checker, &ctx("SELECT * FROM t")).passed());
    }

    #[test]
    fn test_unknown_operation_fails_fast() {
        let config = AllowlistConfig {
            allowed_operations: vec!["RENAME".to_string()],
            ..AllowlistConfig::default()
        };
        assert!(DdlOperationChecker::new(&config).is_err());
    }
}
