//! File writes through `INTO OUTFILE` / `INTO DUMPFILE`

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, CommonOptions};
use crate::context::SqlContext;
use crate::lexer::{SegmentKind, mask, segments};
use crate::result::ValidationResult;
use crate::types::{RiskLevel, SqlDialect};
use lazy_regex::{Lazy, Regex, lazy_regex};

pub const ID: &str = "into_outfile";

// A quoted path is required, which keeps Oracle `SELECT col INTO var` out
static FILE_WRITE_REGEX: Lazy<Regex> = lazy_regex!(r#"(?i)\bINTO\s+(OUTFILE|DUMPFILE)\s+['"]"#);

#[derive(Debug, Clone)]
pub struct IntoOutfileChecker {
    config: CheckerConfig,
}

impl IntoOutfileChecker {
    pub fn new(options: &CommonOptions) -> Self {
        Self {
            config: options.resolve(RiskLevel::Critical),
        }
    }
}

/// Unquoted content of the literal opening at byte `start`
fn literal_at(sql: &str, start: usize, dialect: SqlDialect) -> Option<String> {
    let seg = segments(sql, dialect)
        .into_iter()
        .find(|seg| seg.start == start && matches!(seg.kind, SegmentKind::Literal(_)))?;
    let text = seg.text(sql);
    let quote = &text[..1];
    let inner = text[1..].strip_suffix(quote).unwrap_or(&text[1..]);

    if !dialect.backslash_escapes() {
        return Some(inner.replace(&quote.repeat(2), quote));
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c if quote.starts_with(c) => {
                out.push(c);
                chars.next();
            }
            c => out.push(c),
        }
    }
    Some(out)
}

impl RuleChecker for IntoOutfileChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        let masked = mask(ctx.sql(), ctx.dialect());

        for caps in FILE_WRITE_REGEX.captures_iter(&masked) {
            let (Some(whole), Some(kind)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let kind = kind.as_str().to_uppercase();
            let path = literal_at(ctx.sql(), whole.end() - 1, ctx.dialect()).unwrap_or_default();

            self.report(
                result,
                format!("File write detected: INTO {} '{}'", kind, path),
                format!(
                    "Remove the INTO {} clause and export data from the application instead",
                    kind
                ),
            );
        }
        Ok(())
    }
}
