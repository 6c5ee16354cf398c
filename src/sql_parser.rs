//! SQL parsing utilities: dialect selection, the parse-once facade, comment stripping
//! and leading-keyword extraction
//!
//! Uses the sqlparser crate so that quoting rules follow the selected dialect.

use crate::error::GuardError;
use crate::types::SqlDialect;
use sqlparser::ast::Statement;
use sqlparser::dialect::{
    Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

/// Longest SQL prefix written to log lines
const LOG_SNIPPET_CHARS: usize = 100;

/// Get appropriate SQL dialect for the database type
pub(crate) fn get_dialect(dialect: SqlDialect) -> Box<dyn Dialect> {
    match dialect {
        SqlDialect::Postgres => Box::new(PostgreSqlDialect {}),
        SqlDialect::MySQL | SqlDialect::MariaDB => Box::new(MySqlDialect {}),
        SqlDialect::SQLite => Box::new(SQLiteDialect {}),
        SqlDialect::SqlServer => Box::new(MsSqlDialect {}),
        SqlDialect::Generic => Box::new(GenericDialect {}),
    }
}

/// Parse SQL once and keep the first statement
///
/// Returns `None` when the text cannot be represented by the parser. That is an
/// expected outcome (MyBatis placeholders, vendor syntax, `INTO OUTFILE` ...), not
/// an error: lexical checkers still run against the raw text.
///
/// # Examples
/// ```
/// # use sql_guard::sql_parser::parse_statement;
/// # use sql_guard::types::SqlDialect;
/// assert!(parse_statement("SELECT * FROM users WHERE id = ?", SqlDialect::MySQL).is_some());
/// assert!(parse_statement("SELECT * FROM users WHERE id = #{id}", SqlDialect::MySQL).is_none());
/// ```
pub fn parse_statement(sql: &str, dialect: SqlDialect) -> Option<Statement> {
    let parser_dialect = get_dialect(dialect);

    match Parser::parse_sql(&*parser_dialect, sql) {
        Ok(statements) => {
            let mut statements = statements.into_iter();
            let first = statements.next();
            if first.is_none() {
                log::debug!("No statement found in SQL: {}", snippet(sql));
            }
            first
        }
        Err(e) => {
            log::debug!(
                "SQL not parseable as {} ({}), continuing with raw text: {}",
                dialect,
                e,
                snippet(sql)
            );
            None
        }
    }
}

/// Strip SQL comments (single-line and multi-line) using sqlparser tokenizer
///
/// # Examples
/// ```
/// # use sql_guard::sql_parser::strip_comments;
/// # use sql_guard::types::SqlDialect;
/// let sql = "/* audit */ SET autocommit = 0 -- session";
/// let cleaned = strip_comments(sql, SqlDialect::MySQL);
/// assert_eq!(cleaned.trim(), "SET autocommit = 0");
/// ```
///
/// # Error Handling
/// If tokenization fails (malformed SQL), returns the original SQL unchanged.
pub fn strip_comments(sql: &str, dialect: SqlDialect) -> String {
    let parser_dialect = get_dialect(dialect);
    let mut tokenizer = Tokenizer::new(&*parser_dialect, sql);

    match tokenizer.tokenize() {
        Ok(tokens) => tokens
            .iter()
            .filter(|token| {
                !matches!(
                    token,
                    Token::Whitespace(Whitespace::SingleLineComment { .. })
                        | Token::Whitespace(Whitespace::MultiLineComment(_))
                )
            })
            .map(|token| token.to_string())
            .collect::<Vec<_>>()
            .join(""),
        Err(_) => sql.to_string(),
    }
}

/// Extract first SQL keyword from statement (after stripping comments), lowercased
///
/// # Examples
/// ```
/// # use sql_guard::sql_parser::extract_first_keyword;
/// # use sql_guard::types::SqlDialect;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sql = "-- comment\nSHOW TABLES";
/// assert_eq!(extract_first_keyword(sql, SqlDialect::MySQL)?, "show");
/// # Ok(())
/// # }
/// ```
pub fn extract_first_keyword(sql: &str, dialect: SqlDialect) -> Result<String, GuardError> {
    let cleaned = strip_comments(sql, dialect);

    cleaned
        .split_whitespace()
        .next()
        .map(|word| word.to_lowercase())
        .ok_or(GuardError::EmptySql)
}

/// Truncate SQL for log output on a char boundary
pub fn snippet(sql: &str) -> String {
    let trimmed = sql.trim();
    match trimmed.char_indices().nth(LOG_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statement_keeps_first() {
        let stmt = parse_statement("SELECT 1; DROP TABLE t", SqlDialect::MySQL);
        assert!(
            matches!(stmt, Some(Statement::Query(_))),
            "First statement should be the SELECT: {:?}",
            stmt
        );
    }

    #[test]
    fn test_parse_statement_unparsable() {
        assert!(parse_statement("THIS IS NOT SQL", SqlDialect::MySQL).is_none());
        assert!(parse_statement("", SqlDialect::MySQL).is_none());
    }

    #[test]
    fn test_strip_comments_keeps_literals() {
        let sql = "SELECT '-- not a comment' FROM t";
        let cleaned = strip_comments(sql, SqlDialect::Postgres);
        assert!(cleaned.contains("-- not a comment"));
    }

    #[test]
    fn test_extract_first_keyword_empty() {
        assert!(extract_first_keyword("   ", SqlDialect::MySQL).is_err());
        assert!(extract_first_keyword("-- only a comment", SqlDialect::MySQL).is_err());
    }

    #[test]
    fn test_snippet_truncates() {
        let long = "x".repeat(150);
        let short = snippet(&long);
        assert_eq!(short.len(), 103);
        assert!(short.ends_with("..."));
        assert_eq!(snippet("  SELECT 1  "), "SELECT 1");
    }
}
