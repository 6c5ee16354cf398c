//! WHERE clauses that only filter on low-cardinality fields

use super::{CheckResult, RuleChecker};
use crate::ast::{collect_columns, where_clause};
use crate::config::{BlacklistFieldConfig, CheckerConfig};
use crate::context::SqlContext;
use crate::error::GuardError;
use crate::patterns::NameMatcher;
use crate::result::ValidationResult;
use crate::types::RiskLevel;
use sqlparser::ast::{Delete, Query, Update};
use std::collections::BTreeSet;

pub const ID: &str = "blacklist_field";

/// Reports WHERE clauses such as `deleted = 0` that still match most of a table
#[derive(Debug, Clone)]
pub struct BlacklistFieldChecker {
    config: CheckerConfig,
    fields: NameMatcher,
}

impl BlacklistFieldChecker {
    pub fn new(config: &BlacklistFieldConfig) -> Result<Self, GuardError> {
        Ok(Self {
            config: config.common.resolve(RiskLevel::High),
            fields: NameMatcher::new(&config.fields)?,
        })
    }

    fn inspect(&self, ctx: &SqlContext, result: &mut ValidationResult) {
        let Some(expr) = where_clause(&ctx.kind()) else {
            return;
        };
        let columns = collect_columns(expr);
        if all_blacklisted(&columns, &self.fields) {
            let list = columns.into_iter().collect::<Vec<_>>().join(", ");
            self.report(
                result,
                format!("WHERE clause only uses blacklisted fields [{}]", list),
                "Filter on a primary key or a selective business key (e.g. id, user_id)",
            );
        }
    }
}

/// True when there is at least one column and every column is blacklisted
pub(crate) fn all_blacklisted(columns: &BTreeSet<String>, blacklist: &NameMatcher) -> bool {
    !columns.is_empty() && columns.iter().all(|c| blacklist.matches(c))
}

impl RuleChecker for BlacklistFieldChecker {
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
