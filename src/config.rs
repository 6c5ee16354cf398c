//! Rule configuration
//!
//! The serde types here describe what a configuration document may contain. Every
//! field has a default, so an empty JSON object is a complete configuration.
//! Checkers resolve their section into a runtime [`CheckerConfig`] when built;
//! anything invalid is rejected then, never during evaluation.

use crate::error::GuardError;
use crate::types::{RiskLevel, SqlDialect, ViolationStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolved settings every checker carries at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerConfig {
    pub enabled: bool,
    pub risk_level: RiskLevel,
    pub strategy: ViolationStrategy,
}

/// Options shared by every checker section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CommonOptions {
    /// Disabled checkers are skipped entirely
    pub enabled: bool,

    /// Override of the checker's default risk level
    pub risk_level: Option<RiskLevel>,

    /// Caller-side strategy; defaults from the risk level
    pub strategy: Option<ViolationStrategy>,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            risk_level: None,
            strategy: None,
        }
    }
}

impl CommonOptions {
    /// Disabled section, handy for tests and partial setups
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn resolve(&self, default_risk: RiskLevel) -> CheckerConfig {
        let risk_level = self.risk_level.unwrap_or(default_risk);
        self.resolve_with(default_risk, risk_level.default_strategy())
    }

    pub fn resolve_with(
        &self,
        default_risk: RiskLevel,
        default_strategy: ViolationStrategy,
    ) -> CheckerConfig {
        CheckerConfig {
            enabled: self.enabled,
            risk_level: self.risk_level.unwrap_or(default_risk),
            strategy: self.strategy.unwrap_or(default_strategy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DummyConditionConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Conditions treated as no-ops, compared ignoring case and whitespace
    pub patterns: Vec<String>,

    /// Extra patterns appended to `patterns`
    pub custom_patterns: Vec<String>,
}

impl Default for DummyConditionConfig {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            patterns: crate::ast::DEFAULT_DUMMY_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            custom_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BlacklistFieldConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Low-cardinality fields; a trailing `*` matches by prefix
    pub fields: Vec<String>,
}

impl Default for BlacklistFieldConfig {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            fields: ["deleted", "del_flag", "status", "is_deleted", "enabled", "type"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WhitelistFieldConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Table name to fields of which at least one must appear in WHERE
    pub by_table: BTreeMap<String, Vec<String>>,

    /// Required fields for tables missing from `by_table`
    pub fields: Vec<String>,

    /// Apply `fields` to tables missing from `by_table`
    pub enforce_for_unknown_tables: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeniedTableConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Table patterns; `*` matches one or more non-underscore characters
    pub denied_tables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReadOnlyTableConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Tables that must not be written; a trailing `*` matches by prefix
    pub readonly_tables: Vec<String>,
}

/// Section for checkers configured by an operation allowlist (DDL, set operations)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AllowlistConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Operation names that are permitted; empty blocks all
    pub allowed_operations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SqlCommentConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Let `/*+ ... */` optimizer hints through
    pub allow_hint_comments: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetadataStatementConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Permitted statements among SHOW, DESCRIBE, USE
    pub allowed_statements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DangerousFunctionConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Function names (case-insensitive) that must never be called
    pub denied_functions: Vec<String>,
}

impl Default for DangerousFunctionConfig {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            denied_functions: [
                "load_file",
                "into_outfile",
                "into_dumpfile",
                "sys_exec",
                "sys_eval",
                "sleep",
                "benchmark",
                "pg_sleep",
                "waitfor",
                "xp_cmdshell",
                "dbms_pipe",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeepPaginationConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Largest OFFSET accepted
    pub max_offset: u64,
}

impl Default for DeepPaginationConfig {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            max_offset: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LargePageSizeConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Largest page (LIMIT / TOP / FETCH) accepted
    pub max_page_size: u64,
}

impl Default for LargePageSizeConfig {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            max_page_size: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct NoPaginationConfig {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Statement ids exempt from the check; `*` matches any run of characters
    pub whitelist_statement_ids: Vec<String>,

    /// Tables exempt from the check (small lookup tables)
    pub whitelist_tables: Vec<String>,

    /// Unique keys besides `id` whose equality bounds the result
    pub unique_key_fields: Vec<String>,

    /// Report MEDIUM for unpaginated queries with an ordinary WHERE
    pub enforce_for_all_queries: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DedupConfig {
    pub enabled: bool,

    /// Most distinct statements remembered
    pub capacity: usize,

    /// How long a statement counts as recently checked
    pub ttl_ms: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 1_000,
            ttl_ms: 100,
        }
    }
}

/// Complete engine configuration
///
/// # Examples
/// ```
/// # use sql_guard::config::SqlGuardConfig;
/// # use sql_guard::types::RiskLevel;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SqlGuardConfig::from_json(r#"{
///     "dialect": "postgres",
///     "denied_table": { "denied_tables": ["sys_*"] },
///     "deep_pagination": { "max_offset": 5000, "risk_level": "HIGH" }
/// }"#)?;
/// assert_eq!(config.deep_pagination.max_offset, 5000);
/// assert_eq!(config.deep_pagination.common.risk_level, Some(RiskLevel::High));
/// assert!(config.no_where_clause.enabled);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SqlGuardConfig {
    /// Dialect used to parse statements
    pub dialect: SqlDialect,

    /// A pagination plugin turns page requests into LIMIT clauses
    pub pagination_plugin_installed: bool,

    pub dedup: DedupConfig,

    pub no_where_clause: CommonOptions,
    pub dummy_condition: DummyConditionConfig,
    pub blacklist_field: BlacklistFieldConfig,
    pub whitelist_field: WhitelistFieldConfig,
    pub multi_statement: CommonOptions,
    pub set_operation: AllowlistConfig,
    pub sql_comment: SqlCommentConfig,
    pub into_outfile: CommonOptions,
    pub ddl_operation: AllowlistConfig,
    pub dangerous_function: DangerousFunctionConfig,
    pub call_statement: CommonOptions,
    pub metadata_statement: MetadataStatementConfig,
    pub set_statement: CommonOptions,
    pub denied_table: DeniedTableConfig,
    pub readonly_table: ReadOnlyTableConfig,
    pub logical_pagination: CommonOptions,
    pub no_condition_pagination: CommonOptions,
    pub deep_pagination: DeepPaginationConfig,
    pub large_page_size: LargePageSizeConfig,
    pub missing_order_by: CommonOptions,
    pub no_pagination: NoPaginationConfig,
}

impl SqlGuardConfig {
    /// Decode a JSON document; missing sections take their defaults
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check the configuration by building every checker from it
    pub fn validate(&self) -> Result<(), GuardError> {
        crate::rules::build_checkers(self).map(|_| ())
    }

    /// JSON schema of the configuration document
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(SqlGuardConfig)
    }
}
