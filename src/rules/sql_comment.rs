//! Comments outside literals
//!
//! Comments are a common carrier for injection payloads (`admin'--`). Optimizer
//! hints can be let through when configured, but only where a hint is actually
//! legal: directly after the leading keyword of a parsed DML statement.

use super::{CheckResult, RuleChecker};
use crate::config::{CheckerConfig, SqlCommentConfig};
use crate::context::{SqlContext, StatementKind};
use crate::lexer::{CommentKind, Segment, comments};
use crate::result::ValidationResult;
use crate::types::RiskLevel;

pub const ID: &str = "sql_comment";

/// Characters of comment text quoted in a violation message
const PREVIEW_CHARS: usize = 47;

#[derive(Debug, Clone)]
pub struct SqlCommentChecker {
    config: CheckerConfig,
    allow_hint_comments: bool,
}

impl SqlCommentChecker {
    pub fn new(config: &SqlCommentConfig) -> Self {
        Self {
            config: config.common.resolve(RiskLevel::Critical),
            allow_hint_comments: config.allow_hint_comments,
        }
    }

    /// Whether a hint sits right after the keyword of a recognised statement
    fn is_attached_hint(ctx: &SqlContext, hint: &Segment) -> bool {
        let keyword = match ctx.kind() {
            StatementKind::Select(_) => "select",
            StatementKind::Update(_) => "update",
            StatementKind::Delete(_) => "delete",
            StatementKind::Insert(_) => "insert",
            _ => return false,
        };
        ctx.sql()[..hint.start].trim().eq_ignore_ascii_case(keyword)
    }
}

fn preview(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl RuleChecker for SqlCommentChecker {
    fn id(&self) -> &'static str {
        ID
    }

    fn config(&self) -> &CheckerConfig {
        &self.config
    }

    fn check_raw(&self, ctx: &SqlContext, result: &mut ValidationResult) -> CheckResult {
        for (kind, segment) in comments(ctx.sql(), ctx.dialect()) {
            if kind == CommentKind::Hint
                && self.allow_hint_comments
                && Self::is_attached_hint(ctx, &segment)
            {
                log::debug!("Allowing optimizer hint at {}", segment.start);
                continue;
            }

            self.report(
                result,
                format!(
                    "SQL contains a {}: {}",
                    kind,
                    preview(segment.text(ctx.sql()))
                ),
                match kind {
                    CommentKind::Hint => {
                        "Remove the optimizer hint or enable allow_hint_comments"
                    }
                    _ => "Remove comments from SQL; they can hide injected conditions",
                },
            );
        }
        Ok(())
    }
}
