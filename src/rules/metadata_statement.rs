//! Schema disclosure through SHOW, DESCRIBE and USE

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, MetadataStatementConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::sql_parser::strip_comments;
use crate::types::RiskLevel;
use lazy_regex::{Lazy, Regex, lazy_regex};
use std::collections::BTreeSet;

pub const ID: &str = "metadata_statement";

/// Statement names accepted in `allowed_statements`
const METADATA_STATEMENTS: [&str; 3] = ["SHOW", "DESCRIBE", "USE"];

static METADATA_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)^\s*(SHOW|DESCRIBE|DESC|USE)\s+(\S+)");

#[derive(Debug, Clone)]
pub struct MetadataStatementChecker {
    config: CheckerConfig,
    allowed: BTreeSet<&'static str>,
}

impl MetadataStatementChecker {
    pub fn new(config: &MetadataStatementConfig) -> Result<Self, GuardError> {
        let mut allowed = BTreeSet::new();
        for name in &config.allowed_statements {
            let upper = name.trim().to_uppercase();
            let upper = canonical(&upper);
            let statement = METADATA_STATEMENTS
                .iter()
                .find(|s| **s == upper)
                .ok_or_else(|| {
                    GuardError::invalid_config(format!(
                        "Unknown metadata statement '{}', expected one of {:?}",
                        name, METADATA_STATEMENTS
                    ))
                })?;
            allowed.insert(*statement);
        }

        Ok(Self {
            config: config.common.resolve(RiskLevel::High),
            allowed,
        })
    }
}

fn canonical(keyword: &str) -> &str {
    if keyword == "DESC" { "DESCRIBE" } else { keyword }
}

impl RuleChecker for MetadataStatementChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        let cleaned = strip_comments(ctx.sql(), ctx.dialect());
        let Some(caps) = METADATA_REGEX.captures(&cleaned) else {
            return Ok(());
        };
        let (Some(keyword), Some(target)) = (caps.get(1), caps.get(2)) else {
            return Ok(());
        };

        let keyword = keyword.as_str().to_uppercase();
        let keyword = canonical(&keyword);
        if self.allowed.contains(keyword) {
            return Ok(());
        }

        let target = target.as_str().trim_end_matches(';');
        let suggestion = match keyword {
            "USE" => "Select the database in the connection settings or qualify table names",
            _ => "Query INFORMATION_SCHEMA through an explicit, reviewed SELECT instead",
        };
        self.report(
            result,
            format!("Metadata statement detected: {} {}", keyword, target),
            suggestion,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    #[test]
    fn test_metadata_statements_are_high() {
        let checker = MetadataStatementChecker::new(&MetadataStatementConfig::default()).unwrap();
        for (sql, expected) in [
            ("SHOW TABLES", "SHOW TABLES"),
            ("desc users", "DESCRIBE users"),
            ("DESCRIBE users", "DESCRIBE users"),
            ("USE admin_db;", "USE admin_db"),
        ] {
            let result = run(&checker, &ctx(sql));
            assert_eq!(result.overall_risk(), Some(RiskLevel::High), "For {}", sql);
            assert!(result.violations[0].message.ends_with(expected));
        }
    }

    #[test]
    fn test_information_schema_select_passes() {
        let checker = MetadataStatementChecker::new(&MetadataStatementConfig::default()).unwrap();
        let sql = "SELECT table_name FROM information_schema.tables WHERE table_schema = 'app'";
        assert!(run(&checker, &ctx(sql)).passed());
    }

    #[test]
    fn test_allowlist() {
        let config = MetadataStatementConfig {
            allowed_statements: vec!["desc".to_string()],
            ..MetadataStatementConfig::default()
        };
        let checker = MetadataStatementChecker::new(&config).unwrap();
        assert!(run(&checker, &ctx("DESCRIBE users")).passed());
        assert!(!run(&checker, &ctx("SHOW DATABASES")).passed());

        let config = MetadataStatementConfig {
            allowed_statements: vec!["EXPLAIN".to_string()],
            ..MetadataStatementConfig::default()
        };
        assert!(MetadataStatementChecker::new(&config).is_err());
    }
}
