//! Orchestrator running the checker list against one statement

use crate::config::SqlGuardConfig;
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::rules::{RuleChecker, build_checkers};
use crate::sql_parser::snippet;
use crate::types::ViolationStrategy;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Runs enabled checkers in a fixed order and aggregates their findings
///
/// The engine is immutable after construction and can be shared across threads;
/// every evaluation owns its own [`ValidationResult`]. A checker that fails, by
/// error or by panic, is recorded as a diagnostic and the pass continues.
///
/// # Examples
/// ```
/// # use sql_guard::{RuleEngine, SqlContext, SqlGuardConfig};
/// # use sql_guard::types::RiskLevel;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = RuleEngine::from_config(&SqlGuardConfig::default())?;
/// let ctx = SqlContext::builder("DELETE FROM users").build()?;
///
/// let result = engine.evaluate(&ctx);
/// assert!(!result.passed());
/// assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
/// # Ok(())
/// # }
/// ```
pub struct RuleEngine {
    checkers: Vec<Box<dyn RuleChecker>>,
}

impl RuleEngine {
    /// Engine over an explicit checker list, run in the given order
    pub fn new(checkers: Vec<Box<dyn RuleChecker>>) -> Self {
        Self { checkers }
    }

    /// Build the standard checker list, validating the configuration
    pub fn from_config(config: &SqlGuardConfig) -> Result<Self, GuardError> {
        let checkers = build_checkers(config)?;
        log::debug!(
            "Rule engine built with {} checkers ({} enabled)",
            checkers.len(),
            checkers.iter().filter(|c| c.is_enabled()).count()
        );
        Ok(Self::new(checkers))
    }

    pub fn checkers(&self) -> &[Box<dyn RuleChecker>] {
        &self.checkers
    }

    /// Configured strategy of a checker, by id
    pub fn strategy_for(&self, checker_id: &str) -> Option<ViolationStrategy> {
        self.checkers
            .iter()
            .find(|c| c.id() == checker_id)
            .map(|c| c.config().strategy)
    }

    /// Strictest strategy among the checkers that reported in `result`
    ///
    /// `None` when the statement passed. Applying it is up to the caller.
    pub fn strategy(&self, result: &ValidationResult) -> Option<ViolationStrategy> {
        result
            .violations
            .iter()
            .filter_map(|v| self.strategy_for(&v.checker_id))
            .min_by_key(|strategy| match strategy {
                ViolationStrategy::Block => 0,
                ViolationStrategy::Warn => 1,
                ViolationStrategy::Log => 2,
            })
    }

    /// Evaluate one statement
    pub fn evaluate(&self, ctx: &SqlContext) -> ValidationResult {
        let mut result = ValidationResult::new();

        for checker in self.checkers.iter().filter(|c| c.is_enabled()) {
            let outcome = catch_unwind(AssertUnwindSafe(|| checker.check(ctx, &mut result)));

            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            log::warn!(
                "Checker '{}' failed on SQL {}: {}",
                checker.id(),
                snippet(ctx.sql()),
                failure
            );
            result.add_diagnostic(checker.id(), failure);
        }

        if !result.passed() {
            log::debug!(
                "{} violation(s), worst {:?}, for SQL: {}",
                result.violations.len(),
                result.overall_risk(),
                snippet(ctx.sql())
            );
        }
        result
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "checkers",
                &self.checkers.iter().map(|c| c.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckerConfig, CommonOptions};
    use crate::rules::{self, CheckResult};
    use crate::types::RiskLevel;

    fn engine() -> RuleEngine {
        RuleEngine::from_config(&SqlGuardConfig::default()).unwrap()
    }

    fn ctx(sql: &str) -> SqlContext {
        SqlContext::builder(sql).build().unwrap()
    }

    struct FailingChecker {
        config: CheckerConfig,
        panic: bool,
    }

    impl RuleChecker for FailingChecker {
        fn id(&self) -> &'static str {
            "failing"
        }

        fn config(&self) -> &CheckerConfig {
            &self.config
        }

        fn check_raw(&self, _ctx: &SqlContext, _result: &mut ValidationResult) -> CheckResult {
            if self.panic {
                panic!("pattern cache poisoned");
            }
            Err(GuardError::checker("failing", "misconfigured"))
        }
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let engine = engine();
        let ctx = ctx("SELECT * FROM user WHERE 1=1 UNION SELECT password FROM admin -- x");
        let first = serde_json::to_string(&engine.evaluate(&ctx)).unwrap();
        let second = serde_json::to_string(&engine.evaluate(&ctx)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_violations_follow_checker_order() {
        let result = engine().evaluate(&ctx("DELETE FROM users WHERE 1=1; DROP TABLE users"));
        let ids: Vec<&str> = result.violations.iter().map(|v| v.checker_id.as_str()).collect();
        assert_eq!(ids, vec![rules::dummy_condition::ID, rules::multi_statement::ID]);
    }

    #[test]
    fn test_early_return_suppresses_deep_pagination() {
        let result = engine().evaluate(&ctx("SELECT * FROM user LIMIT 100 OFFSET 50000"));
        assert_eq!(result.violations_from(rules::no_condition_pagination::ID).count(), 1);
        assert_eq!(result.violations_from(rules::deep_pagination::ID).count(), 0);
        assert!(result.details.early_return);

        let result = engine().evaluate(&ctx(
            "SELECT * FROM user WHERE status='active' ORDER BY id LIMIT 20 OFFSET 50000",
        ));
        let deep: Vec<_> = result.violations_from(rules::deep_pagination::ID).collect();
        assert_eq!(deep.len(), 1);
        assert_eq!(deep[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_failing_checker_is_isolated() {
        let _ = env_logger::builder().is_test(true).try_init();

        for panic in [false, true] {
            let failing = FailingChecker {
                config: CommonOptions::default().resolve(RiskLevel::High),
                panic,
            };
            let no_where = rules::NoWhereClauseChecker::new(&CommonOptions::default());
            let engine = RuleEngine::new(vec![Box::new(failing), Box::new(no_where)]);

            let result = engine.evaluate(&ctx("DELETE FROM users"));
            assert_eq!(result.violations.len(), 1, "later checkers must still run");
            assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
            assert_eq!(result.diagnostics.len(), 1);
            assert_eq!(result.diagnostics[0].checker_id, "failing");
        }
    }

    #[test]
    fn test_disabled_checkers_are_skipped() {
        let mut config = SqlGuardConfig::default();
        config.no_where_clause = CommonOptions::disabled();
        let engine = RuleEngine::from_config(&config).unwrap();
        let result = engine.evaluate(&ctx("DELETE FROM users"));
        assert_eq!(result.violations_from(rules::no_where_clause::ID).count(), 0);
    }

    #[test]
    fn test_strategy_lookup() {
        let engine = engine();
        assert_eq!(
            engine.strategy_for(rules::call_statement::ID),
            Some(ViolationStrategy::Warn)
        );
        let result = engine.evaluate(&ctx("DELETE FROM users"));
        assert_eq!(engine.strategy(&result), Some(ViolationStrategy::Block));
        assert_eq!(engine.strategy(&ValidationResult::new()), None);
    }

    #[test]
    fn test_concurrent_evaluation() {
        let engine = engine();
        let statements = [
            "DELETE FROM users",
            "SELECT * FROM orders WHERE id = 1",
            "SELECT * FROM t WHERE name = 'a;b'",
            "UPDATE t SET a = 1 WHERE id = ?",
        ];
        let expected: Vec<String> = statements
            .iter()
            .map(|sql| serde_json::to_string(&engine.evaluate(&ctx(sql))).unwrap())
            .collect();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for (sql, want) in statements.iter().zip(&expected) {
                        let got = serde_json::to_string(&engine.evaluate(&ctx(sql))).unwrap();
                        assert_eq!(&got, want, "Concurrent result differs for {}", sql);
                    }
                });
            }
        });
    }
}
