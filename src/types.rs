//! Shared enums used across the result model, configuration and checkers

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity attached to a violation
///
/// Variants are declared from least to most severe so the derived `Ord`
/// gives `Critical > High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Default caller-side strategy for a checker firing at this level
    pub fn default_strategy(self) -> ViolationStrategy {
        match self {
            Self::Critical | Self::High => ViolationStrategy::Block,
            Self::Medium => ViolationStrategy::Warn,
            Self::Low => ViolationStrategy::Log,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// What the caller does with a violation. The engine only carries this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ViolationStrategy {
    /// Prevent execution
    Block,
    /// Execute but surface the violations
    Warn,
    /// Execute and record only
    Log,
}

/// How a query bounds its result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaginationType {
    /// No pagination requested
    None,
    /// Pagination requested through metadata only, trimmed in-process
    Logical,
    /// Pagination expressed in the SQL itself (LIMIT / TOP / FETCH)
    Physical,
}

/// Database type for SQL dialect-specific parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Postgres,
    #[default]
    MySQL,
    MariaDB,
    SQLite,
    SqlServer,
    Generic,
}

impl SqlDialect {
    /// Whether `#` opens a line comment
    pub fn hash_comments(self) -> bool {
        matches!(self, Self::MySQL | Self::MariaDB | Self::Generic)
    }

    /// Whether a backslash escapes the next character inside quoted strings
    pub fn backslash_escapes(self) -> bool {
        matches!(self, Self::MySQL | Self::MariaDB)
    }
}

impl FromStr for SqlDialect {
    type Err = crate::error::GuardError;

    /// Resolve a dialect from a database product name or URL scheme
    ///
    /// # Examples
    /// ```
    /// # use sql_guard::types::SqlDialect;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let dialect: SqlDialect = "postgresql".parse()?;
    /// assert_eq!(dialect, SqlDialect::Postgres);
    /// # Ok(())
    /// # }
    /// ```
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySQL),
            "mariadb" => Ok(Self::MariaDB),
            "sqlite" => Ok(Self::SQLite),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "generic" | "ansi" => Ok(Self::Generic),
            other => Err(crate::error::GuardError::invalid_config(format!(
                "Unknown SQL dialect: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::MySQL => write!(f, "MySQL"),
            Self::MariaDB => write!(f, "MariaDB"),
            Self::SQLite => write!(f, "SQLite"),
            Self::SqlServer => write!(f, "SQL Server"),
            Self::Generic => write!(f, "Generic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_total_order() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        let worst = [RiskLevel::Low, RiskLevel::Critical, RiskLevel::Medium]
            .into_iter()
            .max();
        assert_eq!(worst, Some(RiskLevel::Critical));
    }

    #[test]
    fn test_risk_level_serializes_uppercase() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
        let parsed: RiskLevel = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(parsed, RiskLevel::Critical);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("MSSQL".parse::<SqlDialect>().unwrap(), SqlDialect::SqlServer);
        assert!("oracle9".parse::<SqlDialect>().is_err());
    }
}
