//! Required WHERE fields per table

use super::{CheckResult, RuleChecker};
use crate::ast::{collect_columns, primary_table, where_clause};
use crate::config::{CheckerConfig, WhitelistFieldConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::{Delete, Query, Update};
use std::collections::BTreeMap;

pub const ID: &str = "whitelist_field";

/// Requires that the WHERE clause of a configured table names at least one of its
/// required fields
///
/// Statements without a WHERE clause are left to the no-WHERE and pagination
/// checkers.
#[derive(Debug, Clone)]
pub struct WhitelistFieldChecker {
    config: CheckerConfig,
    by_table: BTreeMap<String, Vec<String>>,
    fields: Vec<String>,
    enforce_for_unknown_tables: bool,
}

impl WhitelistFieldChecker {
    pub fn new(config: &WhitelistFieldConfig) -> Result<Self, GuardError> {
        let lower = |fields: &[String]| -> Result<Vec<String>, GuardError> {
            fields
                .iter()
                .map(|f| {
                    let f = f.trim().to_lowercase();
                    if f.is_empty() {
                        Err(GuardError::invalid_config("Whitelist field cannot be empty"))
                    } else {
                        Ok(f)
                    }
                })
                .collect()
        };

        let mut by_table = BTreeMap::new();
        for (table, fields) in &config.by_table {
            by_table.insert(table.trim().to_lowercase(), lower(fields)?);
        }

        if config.enforce_for_unknown_tables && config.fields.is_empty() {
            log::warn!("whitelist_field enforces unknown tables but has no global fields");
        }

        Ok(Self {
            config: config.common.resolve(RiskLevel::Medium),
            by_table,
            fields: lower(&config.fields)?,
            enforce_for_unknown_tables: config.enforce_for_unknown_tables,
        })
    }

    fn required_for(&self, table: &str) -> Option<&[String]> {
        match self.by_table.get(&table.to_lowercase()) {
            Some(fields) => Some(fields.as_slice()),
            None if self.enforce_for_unknown_tables => Some(self.fields.as_slice()),
            None => None,
        }
    }

    fn inspect(&self, ctx: &SqlContext, result: &mut ValidationResult) {
        let kind = ctx.kind();
        let (Some(table), Some(expr)) = (primary_table(&kind), where_clause(&kind)) else {
            return;
        };
        let Some(required) = self.required_for(&table) else {
            return;
        };
        if required.is_empty() {
            return;
        }

        let columns = collect_columns(expr);
        if !required.iter().any(|f| columns.contains(f)) {
            self.report(
                result,
                format!(
                    "WHERE clause on table '{}' uses none of the required fields [{}]",
                    table,
                    required.join(", ")
                ),
                format!("Filter on at least one of: {}", required.join(", ")),
            );
        }
    }
}

impl RuleChecker for WhitelistFieldChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_select(&self, ctx: &SqlContext, _: &Query, result: &mut ValidationResult) -> CheckResult {
        self.inspect(ctx, result);
        Ok(())
    }

    fn on_update(&self, ctx: &SqlContext, _: &Update, result: &mut ValidationResult) -> CheckResult {
        self.inspect(ctx, result);
        Ok(())
    }

    fn on_delete(&self, ctx: &SqlContext, _: &Delete, result: &mut ValidationResult) -> CheckResult {
        self.inspect(ctx, result);
        Ok(())
    }
}
