//! Result model: violations, the aggregated verdict and the per-pass side-channel

use crate::types::{PaginationType, RiskLevel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single rule finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    /// Severity of the finding
    pub risk_level: RiskLevel,

    /// What was detected
    pub message: String,

    /// How to fix it
    pub suggestion: String,

    /// Id of the checker that produced it (e.g. "no_where_clause")
    pub checker_id: String,
}

impl Violation {
    pub fn new(
        risk_level: RiskLevel,
        message: impl Into<String>,
        suggestion: impl Into<String>,
        checker_id: impl Into<String>,
    ) -> Self {
        Self {
            risk_level,
            message: message.into(),
            suggestion: suggestion.into(),
            checker_id: checker_id.into(),
        }
    }
}

/// Typed scratch state shared between checkers within one evaluation pass
///
/// Only the orchestrator hands this out, and only for the duration of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PassDetails {
    /// Set by no-condition pagination so deep pagination skips the same query
    pub early_return: bool,

    /// Pagination classification recorded by the pagination checkers
    pub pagination_type: Option<PaginationType>,

    /// Requested or extracted offset, when known
    pub offset: Option<u64>,

    /// Requested or extracted limit, when known
    pub limit: Option<u64>,
}

/// Internal failure of a checker, recorded instead of aborting the pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CheckerDiagnostic {
    pub checker_id: String,
    pub message: String,
}

/// Aggregated verdict for one statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    /// Findings in detection order
    pub violations: Vec<Violation>,

    /// Checker failures isolated during the pass
    pub diagnostics: Vec<CheckerDiagnostic>,

    /// Inter-checker signals written during the pass
    pub details: PassDetails,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no violation was recorded
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Highest risk across all violations, `None` when the statement passed
    pub fn overall_risk(&self) -> Option<RiskLevel> {
        self.violations.iter().map(|v| v.risk_level).max()
    }

    pub fn add_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Record a violation built from its parts
    pub fn report(
        &mut self,
        risk_level: RiskLevel,
        message: impl Into<String>,
        suggestion: impl Into<String>,
        checker_id: &str,
    ) {
        self.violations
            .push(Violation::new(risk_level, message, suggestion, checker_id));
    }

    pub fn add_diagnostic(&mut self, checker_id: &str, message: impl Into<String>) {
        self.diagnostics.push(CheckerDiagnostic {
            checker_id: checker_id.to_string(),
            message: message.into(),
        });
    }

    /// Violations produced by one checker
    pub fn violations_from<'a>(&'a self, checker_id: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations
            .iter()
            .filter(move |v| v.checker_id == checker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_passes() {
        let result = ValidationResult::new();
        assert!(result.passed());
        assert_eq!(result.overall_risk(), None);
    }

    #[test]
    fn test_overall_risk_is_worst() {
        let mut result = ValidationResult::new();
        result.report(RiskLevel::Low, "a", "b", "missing_order_by");
        result.report(RiskLevel::Critical, "c", "d", "no_where_clause");
        result.report(RiskLevel::Medium, "e", "f", "deep_pagination");

        assert!(!result.passed());
        assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
        assert_eq!(result.violations[0].checker_id, "missing_order_by");
        assert_eq!(result.violations_from("deep_pagination").count(), 1);
    }

    #[test]
    fn test_diagnostics_do_not_fail_result() {
        let mut result = ValidationResult::new();
        result.add_diagnostic("denied_table", "boom");
        assert!(result.passed());
        assert_eq!(result.diagnostics.len(), 1);
    }
}
