//! Writes to tables that are read-only for the application

use super::{CheckResult, RuleChecker};
use crate::ast::target_table;
use crate::config::{CheckerConfig, ReadOnlyTableConfig};
use crate::context::{SqlContext, StatementKind};
use crate::error::GuardError;
use crate::patterns::NameMatcher;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::{Delete, Insert, Update};

pub const ID: &str = "readonly_table";

#[derive(Debug, Clone)]
pub struct ReadOnlyTableChecker {
    config: CheckerConfig,
    tables: NameMatcher,
}

impl ReadOnlyTableChecker {
    pub fn new(config: &ReadOnlyTableConfig) -> Result<Self, GuardError> {
        Ok(Self {
            config: config.common.resolve(RiskLevel::High),
            tables: NameMatcher::new(&config.readonly_tables)?,
        })
    }

    fn inspect(&self, operation: &str, kind: StatementKind<'_>, result: &mut ValidationResult) {
        if self.tables.is_empty() {
            return;
        }
        let Some(table) = target_table(&kind) else {
            return;
        };
        if self.tables.matches(&table) {
            self.report(
                result,
                format!("Write operation {} on read-only table: {}", operation, table),
                format!(
                    "Read-only tables cannot be modified. Remove the {} or use a different table.",
                    operation
                ),
            );
        }
    }
}

impl RuleChecker for ReadOnlyTableChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn on_insert(&self, _: &SqlContext, insert: &Insert, result: &mut ValidationResult) -> CheckResult {
        self.inspect("INSERT", StatementKind::Insert(insert), result);
        Ok(())
    }

    fn on_update(&self, _: &SqlContext, update: &Update, result: &mut ValidationResult) -> CheckResult {
        self.inspect("UPDATE", StatementKind::Update(update), result);
        Ok(())
    }

    fn on_delete(&self, _: &SqlContext, delete: &Delete, result: &mut ValidationResult) -> CheckResult {
        self.inspect("DELETE", StatementKind::Delete(delete), result);
        Ok(())
    }
}
