//! UNION / INTERSECT / EXCEPT / MINUS in a query body

use super::{CheckResult, RuleChecker};
use crate::config::{AllowlistConfig, CheckerConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::{Query, SetExpr, SetOperator, SetQuantifier};
use std::collections::BTreeSet;

pub const ID: &str = "set_operation";

/// Operation names accepted in `allowed_operations`
const SET_OPERATIONS: [&str; 8] = [
    "UNION",
    "UNION_ALL",
    "INTERSECT",
    "INTERSECT_ALL",
    "EXCEPT",
    "EXCEPT_ALL",
    "MINUS",
    "MINUS_ALL",
];

/// Blocks set operations, the usual vehicle for UNION-based data exfiltration,
/// unless the specific operation is allowlisted
#[derive(Debug, Clone)]
pub struct SetOperationChecker {
    config: CheckerConfig,
    allowed: BTreeSet<String>,
}

impl SetOperationChecker {
    pub fn new(config: &AllowlistConfig) -> Result<Self, GuardError> {
        let mut allowed = BTreeSet::new();
        for name in &config.allowed_operations {
            let normalized = name.trim().to_uppercase().replace(' ', "_");
            if !SET_OPERATIONS.contains(&normalized.as_str()) {
                return Err(GuardError::invalid_config(format!(
                    "Unknown set operation '{}', expected one of {:?}",
                    name, SET_OPERATIONS
                )));
            }
            allowed.insert(normalized);
        }

        Ok(Self {
            config: config.common.resolve(RiskLevel::Critical),
            allowed,
        })
    }
}

fn operation_name(op: &SetOperator, quantifier: &SetQuantifier) -> String {
    let base = op.to_string().to_uppercase();
    match quantifier {
        SetQuantifier::All | SetQuantifier::AllByName => format!("{}_ALL", base),
        _ => base,
    }
}

/// Operation names of a body in left-to-right order
fn collect_operations(body: &SetExpr, out: &mut Vec<String>) {
    match body {
        SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
        } => {
            collect_operations(left, out);
            out.push(operation_name(op, set_quantifier));
            collect_operations(right, out);
        }
        SetExpr::Query(query) => collect_operations(&query.body, out),
        _ => {}
    }
}

impl RuleChecker for SetOperationChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_select(
        &self,
        _ctx: &SqlContext,
        query: &Query,
        result: &mut ValidationResult,
    ) -> CheckResult {
        let mut operations = Vec::new();
        collect_operations(&query.body, &mut operations);

        let mut reported = BTreeSet::new();
        for name in operations {
            if self.allowed.contains(&name) || !reported.insert(name.clone()) {
                continue;
            }
            self.report(
                result,
                format!("Set operation {} detected, possible data exfiltration", name),
                format!("Remove the set operation or add {} to allowed_operations", name),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ctx, run};

    const UNION_SQL: &str = "SELECT name FROM u WHERE id='1' UNION SELECT password FROM admin";

    #[test]
    fn test_union_blocked_by_default() {
        let checker = SetOperationChecker::new(&AllowlistConfig::default()).unwrap();
        let result = run(&checker, &ctx(UNION_SQL));
        assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
        assert!(result.violations[0].message.contains("UNION"));
    }

    #[test]
    fn test_allowlisted_union() {
        let config = AllowlistConfig {
            allowed_operations: vec!["union".to_string()],
            ..AllowlistConfig::default()
        };
        let checker = SetOperationChecker::new(&config).unwrap();
        assert!(run(&checker, &ctx(UNION_SQL)).passed());

        // UNION ALL is a separate operation
        let result = run(&checker, &ctx("SELECT a FROM x UNION ALL SELECT b FROM y"));
        assert!(result.violations[0].message.contains("UNION_ALL"));
    }

    #[test]
    fn test_chained_operations_reported_once_each() {
        let checker = SetOperationChecker::new(&AllowlistConfig::default()).unwrap();
        let result = run(
            &checker,
            &ctx("SELECT a FROM x UNION SELECT b FROM y UNION SELECT c FROM z INTERSECT SELECT d FROM w"),
        );
        assert_eq!(result.violations.len(), 2);
    }

    #[test]
    fn test_unknown_operation_fails_fast() {
        let config = AllowlistConfig {
            allowed_operations: vec!["JOIN".to_string()],
            ..AllowlistConfig::default()
        };
        assert!(SetOperationChecker::new(&config).is_err());
        let config = AllowlistConfig {
            allowed_operations: vec!["union all".to_string()],
            ..AllowlistConfig::default()
        };
        assert!(SetOperationChecker::new(&config).is_ok());
    }

    #[test]
    fn test_plain_select_passes() {
        let checker = SetOperationChecker::new(&AllowlistConfig::default()).unwrap();
        assert!(run(&checker, &ctx("SELECT * FROM t WHERE id = 1")).passed());
    }
}
