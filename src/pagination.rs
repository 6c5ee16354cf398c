//! Pagination classification and LIMIT/OFFSET extraction
//!
//! A query is PHYSICAL when the SQL bounds its own rows (LIMIT, TOP, FETCH),
//! LOGICAL when the caller asked for a page through metadata only, NONE otherwise.

use crate::ast::{numeric_literal, outer_select};
use crate::context::{SqlContext, StatementKind};
use crate::lexer::mask;
use crate::types::PaginationType;
use lazy_regex::{Lazy, Regex, lazy_regex};
use sqlparser::ast::{Expr, LimitClause, Query, TopQuantity};

// Compile-time validated regexes, applied to SQL with literals and comments masked
static LIMIT_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)\bLIMIT\s+(?:\d|\?|:\w|\$\d|#\{)");
static TOP_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)\bTOP\s*\(?\s*(?:\d|\?|@)");
static FETCH_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)\bFETCH\s+(?:FIRST|NEXT)\b");
static ROWNUM_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)\b(?:ROWNUM|ROW_NUMBER)\b");
static LIMIT_VALUE_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)\bLIMIT\s+(\d+)(?:\s*,\s*(\d+))?");
static OFFSET_VALUE_REGEX: Lazy<Regex> = lazy_regex!(r"(?i)\bOFFSET\s+(\d+)");

/// Classifies how a statement paginates
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationDetector {
    plugin_installed: bool,
}

impl PaginationDetector {
    /// `plugin_installed`: a pagination plugin rewrites page requests into SQL
    /// LIMIT clauses, so metadata-only pagination becomes physical.
    pub fn new(plugin_installed: bool) -> Self {
        Self { plugin_installed }
    }

    /// Classify the pagination of `ctx`
    ///
    /// # Examples
    /// ```
    /// # use sql_guard::{SqlContext, RowBounds, PaginationType};
    /// # use sql_guard::pagination::PaginationDetector;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let detector = PaginationDetector::new(false);
    ///
    /// let ctx = SqlContext::builder("SELECT * FROM t LIMIT 10").build()?;
    /// assert_eq!(detector.classify(&ctx), PaginationType::Physical);
    ///
    /// let ctx = SqlContext::builder("SELECT * FROM t")
    ///     .pagination_hint(RowBounds::new(0, 10))
    ///     .build()?;
    /// assert_eq!(detector.classify(&ctx), PaginationType::Logical);
    /// # Ok(())
    /// # }
    /// ```
    pub fn classify(&self, ctx: &SqlContext) -> PaginationType {
        if has_pagination_clause(ctx) {
            return PaginationType::Physical;
        }

        if has_page_request(ctx) {
            if self.plugin_installed {
                PaginationType::Physical
            } else {
                PaginationType::Logical
            }
        } else {
            PaginationType::None
        }
    }
}

/// Whether the caller asked for a page outside the SQL text
pub fn has_page_request(ctx: &SqlContext) -> bool {
    ctx.pagination_hint().is_some_and(|b| !b.is_unbounded()) || ctx.page_request().is_some()
}

/// Whether the SQL carries a bounding clause anywhere
pub fn has_pagination_clause(ctx: &SqlContext) -> bool {
    if let StatementKind::Select(query) = ctx.kind() {
        if has_structural_bound(query) {
            return true;
        }
    }
    has_keyword_bound(&mask(ctx.sql(), ctx.dialect()))
}

/// O(1) checks on the outermost query block
fn has_structural_bound(query: &Query) -> bool {
    limit_expr(query).is_some()
        || query.fetch.is_some()
        || outer_select(query).is_some_and(|s| s.top.is_some())
}

/// Keyword scan catching bounds inside nested blocks and unparsable SQL
fn has_keyword_bound(masked_sql: &str) -> bool {
    LIMIT_REGEX.is_match(masked_sql)
        || TOP_REGEX.is_match(masked_sql)
        || FETCH_REGEX.is_match(masked_sql)
        || ROWNUM_REGEX.is_match(masked_sql)
}

/// LIMIT expression of the outer query (`LIMIT n`, `LIMIT n OFFSET m`, `LIMIT m, n`)
pub fn limit_expr(query: &Query) -> Option<&Expr> {
    match query.limit_clause.as_ref()? {
        LimitClause::LimitOffset { limit, .. } => limit.as_ref(),
        LimitClause::OffsetCommaLimit { limit, .. } => Some(limit),
    }
}

/// OFFSET expression of the outer query, from `OFFSET m` or MySQL `LIMIT m, n`
pub fn offset_expr(query: &Query) -> Option<&Expr> {
    match query.limit_clause.as_ref()? {
        LimitClause::LimitOffset { offset, .. } => offset.as_ref().map(|o| &o.value),
        LimitClause::OffsetCommaLimit { offset, .. } => Some(offset),
    }
}

/// Numeric OFFSET, `None` when absent or not a literal (`OFFSET ?`)
///
/// Falls back to a keyword scan when the statement was not parsed as a query.
pub fn extract_offset(ctx: &SqlContext) -> Option<u64> {
    match ctx.kind() {
        StatementKind::Select(query) => offset_expr(query).and_then(numeric_literal),
        StatementKind::Unparsable => {
            let masked = mask(ctx.sql(), ctx.dialect());
            if let Some(caps) = OFFSET_VALUE_REGEX.captures(&masked) {
                return caps[1].parse().ok();
            }
            // MySQL `LIMIT m, n`: the first number is the offset
            LIMIT_VALUE_REGEX
                .captures(&masked)
                .and_then(|caps| match (caps.get(1), caps.get(2)) {
                    (Some(offset), Some(_)) => offset.as_str().parse().ok(),
                    _ => None,
                })
        }
        _ => None,
    }
}

/// Numeric row count from LIMIT, then TOP, then FETCH
pub fn extract_page_size(ctx: &SqlContext) -> Option<u64> {
    match ctx.kind() {
        StatementKind::Select(query) => {
            if let Some(limit) = limit_expr(query) {
                return numeric_literal(limit);
            }
            if let Some(top) = outer_select(query).and_then(|s| s.top.as_ref()) {
                return match top.quantity.as_ref()? {
                    TopQuantity::Expr(expr) => numeric_literal(expr),
                    TopQuantity::Constant(n) => Some(*n),
                };
            }
            query
                .fetch
                .as_ref()
                .and_then(|fetch| fetch.quantity.as_ref())
                .and_then(numeric_literal)
        }
        StatementKind::Unparsable => {
            let masked = mask(ctx.sql(), ctx.dialect());
            LIMIT_VALUE_REGEX.captures(&masked).and_then(|caps| {
                caps.get(2)
                    .or(caps.get(1))
                    .and_then(|m| m.as_str().parse().ok())
            })
        }
        _ => None,
    }
}
