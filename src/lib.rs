//! SQL safety and performance policy engine
//!
//! Statements are wrapped in a [`SqlContext`] (parsed once with sqlparser) and
//! evaluated by an ordered list of rule checkers. Each checker reports
//! [`Violation`]s with a risk level and a suggestion; the caller decides what to
//! do with them using the configured [`ViolationStrategy`].
//!
//! Checkers cover missing or meaningless WHERE clauses, injection-shaped
//! constructs (stacked statements, comments, UNION, file writes, dangerous
//! functions), access policy (denied and read-only tables, DDL, metadata and
//! session statements) and pagination risks (in-memory paging, deep offsets,
//! oversized pages, unstable ordering, unbounded reads).
//!
//! # Examples
//! ```
//! use sql_guard::{RuleEngine, SqlContext, SqlGuardConfig, RiskLevel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = RuleEngine::from_config(&SqlGuardConfig::default())?;
//!
//! let ctx = SqlContext::builder("SELECT * FROM users WHERE 1=1").build()?;
//! let result = engine.evaluate(&ctx);
//!
//! assert_eq!(result.overall_risk(), Some(RiskLevel::Critical));
//! for violation in &result.violations {
//!     println!("[{}] {}: {}", violation.risk_level, violation.checker_id, violation.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod guard;
pub mod lexer;
pub mod pagination;
pub mod patterns;
pub mod result;
pub mod rules;
pub mod sql_parser;
pub mod types;

// Re-exports
pub use config::SqlGuardConfig;
pub use context::{PageRequest, ParamValue, RowBounds, SqlContext, SqlContextBuilder, StatementKind};
pub use engine::RuleEngine;
pub use error::GuardError;
pub use guard::SqlGuard;
pub use pagination::PaginationDetector;
pub use result::{CheckerDiagnostic, PassDetails, ValidationResult, Violation};
pub use rules::RuleChecker;
pub use sql_parser::{extract_first_keyword, strip_comments};
pub use types::{PaginationType, RiskLevel, SqlDialect, ViolationStrategy};
