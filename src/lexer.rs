//! Literal-aware lexical scanning of raw SQL text
//!
//! The parser is not always able to represent a statement, so the raw-text checkers
//! work on a flat segmentation of the SQL into code, quoted literals and comments.
//! Segments come from the sqlparser tokenizer for the statement's dialect, which
//! knows its escaping rules (`\'` in MySQL, `$$...$$` in PostgreSQL). Text the
//! tokenizer rejects, such as an unterminated literal, is split by a byte scanner.

use crate::sql_parser::{get_dialect, snippet};
use crate::types::SqlDialect;
use lazy_regex::{Lazy, Regex, lazy_regex};
use sqlparser::tokenizer::{Location, Token, Tokenizer, Whitespace};

// MyBatis `#{name}` / `#{user.name,jdbcType=VARCHAR}` parameters
static MYBATIS_PARAM_REGEX: Lazy<Regex> = lazy_regex!(r"#\{[\w.,=: ]*\}");

/// Kind of comment found outside literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `-- ...` up to end of line
    SingleLine,
    /// `/* ... */`
    MultiLine,
    /// `/*+ ... */` optimizer hint
    Hint,
    /// `# ...` up to end of line (MySQL)
    Hash,
}

impl std::fmt::Display for CommentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleLine => write!(f, "single-line comment (--)"),
            Self::MultiLine => write!(f, "multi-line comment (/* */)"),
            Self::Hint => write!(f, "optimizer hint (/*+ */)"),
            Self::Hash => write!(f, "hash comment (#)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    /// Quoted string or quoted identifier, tagged with its opening delimiter
    Literal(u8),
    Comment(CommentKind),
}

/// Byte range `[start, end)` of the SQL text with its classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn text<'a>(&self, sql: &'a str) -> &'a str {
        &sql[self.start..self.end]
    }
}

/// Split SQL into code, literal and comment segments
///
/// Quoting follows `dialect`. In dialects where `#` opens a line comment, MyBatis
/// `#{name}` parameters are still treated as code.
///
/// # Examples
/// ```
/// # use sql_guard::lexer::{segments, SegmentKind};
/// # use sql_guard::types::SqlDialect;
/// let segs = segments("SELECT 'a;b' -- x", SqlDialect::MySQL);
/// assert_eq!(segs.len(), 4);
/// assert_eq!(segs[1].kind, SegmentKind::Literal(b'\''));
/// ```
pub fn segments(sql: &str, dialect: SqlDialect) -> Vec<Segment> {
    token_segments(sql, dialect).unwrap_or_else(|| scan_segments(sql, dialect))
}

/// Appends segments, merging adjacent code runs
#[derive(Debug, Default)]
struct SegmentList {
    segments: Vec<Segment>,
    cursor: usize,
}

impl SegmentList {
    fn push(&mut self, kind: SegmentKind, start: usize, end: usize) {
        if start > self.cursor {
            self.push(SegmentKind::Code, self.cursor, start);
        }
        self.cursor = end;

        if kind == SegmentKind::Code {
            if let Some(last) = self.segments.last_mut() {
                if last.kind == SegmentKind::Code && last.end == start {
                    last.end = end;
                    return;
                }
            }
        }
        self.segments.push(Segment { kind, start, end });
    }

    fn finish(mut self, len: usize) -> Vec<Segment> {
        if self.cursor < len {
            self.push(SegmentKind::Code, self.cursor, len);
        }
        self.segments
    }
}

/// Forward-only conversion of tokenizer locations (1-based line and char
/// column) into byte offsets
struct OffsetCursor<'a> {
    sql: &'a str,
    line: u64,
    column: u64,
    byte: usize,
}

impl<'a> OffsetCursor<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            line: 1,
            column: 1,
            byte: 0,
        }
    }

    fn seek(&mut self, location: Location) -> Option<usize> {
        let target = (location.line, location.column);
        if target < (self.line, self.column) {
            return None;
        }
        let mut chars = self.sql[self.byte..].chars();
        while (self.line, self.column) < target {
            let c = chars.next()?;
            self.byte += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        Some(self.byte)
    }
}

/// Blank out `#{...}` parameters with a same-length `?` placeholder
fn blank_mybatis_params(sql: &str) -> std::borrow::Cow<'_, str> {
    MYBATIS_PARAM_REGEX.replace_all(sql, |caps: &regex::Captures<'_>| {
        let len = caps.get(0).map_or(1, |m| m.len());
        format!("?{}", " ".repeat(len - 1))
    })
}

fn literal_delimiter(text: &str) -> u8 {
    text.bytes()
        .find(|b| !b.is_ascii_alphanumeric())
        .unwrap_or(b'\'')
}

fn token_segments(sql: &str, dialect: SqlDialect) -> Option<Vec<Segment>> {
    let prepared = blank_mybatis_params(sql);
    let parser_dialect = get_dialect(dialect);
    let tokens = match Tokenizer::new(&*parser_dialect, &prepared).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            log::debug!("Tokenizer rejected SQL ({}), scanning bytes: {}", e, snippet(sql));
            return None;
        }
    };

    let mut offsets = OffsetCursor::new(&prepared);
    let mut out = SegmentList::default();

    for token in &tokens {
        let start = offsets.seek(token.span.start)?;
        let end = offsets.seek(token.span.end)?;
        if end <= start || start < out.cursor {
            continue;
        }
        let text = &prepared[start..end];

        let kind = match &token.token {
            Token::Whitespace(Whitespace::SingleLineComment { prefix, .. }) => {
                if prefix.starts_with('#') {
                    SegmentKind::Comment(CommentKind::Hash)
                } else {
                    SegmentKind::Comment(CommentKind::SingleLine)
                }
            }
            Token::Whitespace(Whitespace::MultiLineComment(body)) => {
                if body.starts_with('+') {
                    SegmentKind::Comment(CommentKind::Hint)
                } else {
                    SegmentKind::Comment(CommentKind::MultiLine)
                }
            }
            Token::Sharp if dialect.hash_comments() => {
                out.push(
                    SegmentKind::Comment(CommentKind::Hash),
                    start,
                    line_end(prepared.as_bytes(), start),
                );
                continue;
            }
            Token::Word(word) if word.quote_style.is_some() => {
                SegmentKind::Literal(literal_delimiter(text))
            }
            Token::Word(_) | Token::Number(..) | Token::Placeholder(_) => SegmentKind::Code,
            Token::DollarQuotedString(_) => SegmentKind::Literal(b'$'),
            _ if text.ends_with(['\'', '"']) => SegmentKind::Literal(literal_delimiter(text)),
            _ => SegmentKind::Code,
        };
        out.push(kind, start, end);
    }

    Some(out.finish(sql.len()))
}

/// Byte scanner used when the tokenizer gives up
///
/// Unterminated literals and block comments run to the end of the text.
fn scan_segments(sql: &str, dialect: SqlDialect) -> Vec<Segment> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = SegmentList::default();
    let mut i = 0;

    while i < len {
        let next = bytes.get(i + 1).copied();
        let special = match bytes[i] {
            q @ (b'\'' | b'"' | b'`') => Some((
                SegmentKind::Literal(q),
                literal_end(bytes, i, q, dialect.backslash_escapes() && q != b'`'),
            )),
            b'-' if next == Some(b'-') => Some((
                SegmentKind::Comment(CommentKind::SingleLine),
                line_end(bytes, i),
            )),
            b'/' if next == Some(b'*') => {
                let kind = if bytes.get(i + 2) == Some(&b'+') {
                    CommentKind::Hint
                } else {
                    CommentKind::MultiLine
                };
                Some((SegmentKind::Comment(kind), block_end(bytes, i)))
            }
            b'#' if dialect.hash_comments() && !is_mybatis_param(bytes, i) => {
                Some((SegmentKind::Comment(CommentKind::Hash), line_end(bytes, i)))
            }
            _ => None,
        };

        match special {
            Some((kind, end)) => {
                out.push(kind, i, end);
                i = end;
            }
            None => i += 1,
        }
    }

    out.finish(len)
}

fn literal_end(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut j = start + 1;
    while j < bytes.len() {
        if backslash_escapes && bytes[j] == b'\\' {
            j += 2;
            continue;
        }
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

fn block_end(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}

fn is_mybatis_param(bytes: &[u8], start: usize) -> bool {
    if bytes.get(start + 1) != Some(&b'{') {
        return false;
    }
    bytes[start + 2..]
        .iter()
        .take_while(|&&b| b != b'\n')
        .any(|&b| b == b'}')
}

/// Comments found outside quoted literals
pub fn comments(sql: &str, dialect: SqlDialect) -> Vec<(CommentKind, Segment)> {
    segments(sql, dialect)
        .into_iter()
        .filter_map(|seg| match seg.kind {
            SegmentKind::Comment(kind) => Some((kind, seg)),
            _ => None,
        })
        .collect()
}

/// Byte offset of the first `;` that separates two statements
///
/// A semicolon only followed by whitespace, comments or further semicolons is a
/// harmless terminator and yields `None`.
///
/// # Examples
/// ```
/// # use sql_guard::lexer::stacked_statement_offset;
/// # use sql_guard::types::SqlDialect;
/// let mysql = SqlDialect::MySQL;
/// assert_eq!(stacked_statement_offset("SELECT 1; DROP TABLE t", mysql), Some(8));
/// assert_eq!(stacked_statement_offset("SELECT 1; -- done\n;", mysql), None);
/// assert_eq!(stacked_statement_offset("SELECT 'a;b'", mysql), None);
/// ```
pub fn stacked_statement_offset(sql: &str, dialect: SqlDialect) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut first_separator = None;
    let mut last_substantive = None;

    for seg in segments(sql, dialect) {
        match seg.kind {
            SegmentKind::Code => {
                for pos in seg.start..seg.end {
                    match bytes[pos] {
                        b';' => {
                            if first_separator.is_none() {
                                first_separator = Some(pos);
                            }
                        }
                        b if b.is_ascii_whitespace() => {}
                        _ => last_substantive = Some(pos),
                    }
                }
            }
            SegmentKind::Literal(_) => last_substantive = Some(seg.start),
            SegmentKind::Comment(_) => {}
        }
    }

    match (first_separator, last_substantive) {
        (Some(sep), Some(last)) if last > sep => Some(sep),
        _ => None,
    }
}

/// Blank out literal contents and comments, keeping byte offsets stable
///
/// A literal keeps its prefix up to the opening delimiter (`'`, `E'`, `$`) and
/// its closing byte, so callers can still see *where* a quoted argument sits.
/// Everything between them, and every comment, becomes spaces.
///
/// # Examples
/// ```
/// # use sql_guard::lexer::mask;
/// # use sql_guard::types::SqlDialect;
/// let sql = "SELECT 'LIMIT 5' FROM t -- LIMIT 9";
/// let masked = mask(sql, SqlDialect::MySQL);
/// assert!(!masked.contains("LIMIT"));
/// assert_eq!(masked.len(), sql.len());
/// ```
pub fn mask(sql: &str, dialect: SqlDialect) -> String {
    let mut out = String::with_capacity(sql.len());

    for seg in segments(sql, dialect) {
        let text = seg.text(sql);
        match seg.kind {
            SegmentKind::Code => out.push_str(text),
            SegmentKind::Comment(_) => out.extend(std::iter::repeat_n(' ', text.len())),
            SegmentKind::Literal(delimiter) => {
                let open = text
                    .bytes()
                    .position(|b| b == delimiter)
                    .map_or(0, |i| i + 1);
                let closed = text.len() > open
                    && text.as_bytes()[text.len() - 1].is_ascii_punctuation();
                let close = usize::from(closed);
                out.push_str(&text[..open]);
                out.extend(std::iter::repeat_n(' ', text.len() - open - close));
                out.push_str(&text[text.len() - close..]);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MYSQL: SqlDialect = SqlDialect::MySQL;
    const POSTGRES: SqlDialect = SqlDialect::Postgres;

    #[test]
    fn test_doubled_quote_escape_stays_in_literal() {
        let sql = "SELECT * FROM t WHERE name = 'It''s; fine'";
        assert_eq!(stacked_statement_offset(sql, MYSQL), None);
        let segs = segments(sql, MYSQL);
        let literal = segs
            .iter()
            .find(|s| matches!(s.kind, SegmentKind::Literal(_)))
            .map(|s| s.text(sql));
        assert_eq!(literal, Some("'It''s; fine'"));
    }

    #[test]
    fn test_stacked_statements() {
        assert!(stacked_statement_offset("SELECT * FROM t WHERE x=1; DROP TABLE t", MYSQL).is_some());
        assert!(stacked_statement_offset("SELECT * FROM t WHERE x=1;", MYSQL).is_none());
        assert!(stacked_statement_offset("SELECT * FROM t WHERE x=1;;  \n ;", MYSQL).is_none());
        assert!(stacked_statement_offset("SELECT 1; /* trailing */", MYSQL).is_none());
        assert!(stacked_statement_offset("SELECT 1; 'x'", MYSQL).is_some());
        assert!(stacked_statement_offset("SELECT * FROM t WHERE name='a;b'", MYSQL).is_none());
        assert!(stacked_statement_offset("SELECT `a;b` FROM t", MYSQL).is_none());
    }

    #[test]
    fn test_backslash_escape_in_mysql() {
        let sql = r"SELECT * FROM t WHERE name = 'x\''; DROP TABLE t";
        assert_eq!(stacked_statement_offset(sql, MYSQL), sql.find("; DROP"));

        let sql = r"SELECT * FROM t WHERE name = 'x\'' OR 1=1 -- '";
        let found = comments(sql, MYSQL);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, CommentKind::SingleLine);
        assert!(mask(sql, MYSQL).contains("OR 1=1"));
    }

    #[test]
    fn test_dollar_quoted_string_in_postgres() {
        let sql = "SELECT $$a;b$$ FROM t";
        assert_eq!(stacked_statement_offset(sql, POSTGRES), None);
        let segs = segments(sql, POSTGRES);
        assert!(segs.iter().any(|s| s.kind == SegmentKind::Literal(b'$')));

        let sql = "SELECT $tag$ -- x $tag$ FROM t";
        assert!(comments(sql, POSTGRES).is_empty());
    }

    #[test]
    fn test_comment_kinds() {
        let sql = "SELECT /*+ INDEX(t idx) */ a -- tail\nFROM t /* block */ # hash";
        let kinds: Vec<CommentKind> = comments(sql, MYSQL).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                CommentKind::Hint,
                CommentKind::SingleLine,
                CommentKind::MultiLine,
                CommentKind::Hash
            ]
        );
    }

    #[test]
    fn test_mybatis_param_is_not_comment() {
        let sql = "SELECT * FROM users WHERE id = #{id} AND name = #{user.name,jdbcType=VARCHAR}";
        assert!(comments(sql, MYSQL).is_empty());
        let sql = "SELECT * FROM users # {broken\n";
        assert_eq!(comments(sql, MYSQL).len(), 1);
    }

    #[test]
    fn test_mybatis_param_cannot_swallow_quotes() {
        let sql = "SELECT * FROM t WHERE a = '#{' ; DROP TABLE t; '}'";
        assert!(stacked_statement_offset(sql, MYSQL).is_some());
    }

    #[test]
    fn test_hash_ignored_without_hash_comments() {
        assert!(comments("SELECT a # b FROM t", POSTGRES).is_empty());
    }

    #[test]
    fn test_markers_inside_literals_ignored() {
        let sql = "SELECT '-- x', \"/* y */\", `#z` FROM t";
        assert!(comments(sql, MYSQL).is_empty());
    }

    #[test]
    fn test_mask_preserves_length_with_multibyte() {
        let sql = "SELECT 'héllo' FROM t /* ü */\nWHERE b = 'ç'";
        let masked = mask(sql, MYSQL);
        assert_eq!(masked.len(), sql.len());
        assert!(masked.starts_with("SELECT '"));
        assert!(masked.contains("WHERE b = '"));
        assert!(!masked.contains('é'));
        assert!(!masked.contains('ü'));
        assert!(!masked.contains('ç'));
    }

    #[test]
    fn test_unterminated_literal_falls_back_to_scanner() {
        let sql = "SELECT 'abc; DROP";
        assert_eq!(stacked_statement_offset(sql, MYSQL), None);
        assert_eq!(mask(sql, MYSQL).len(), sql.len());

        let sql = r"SELECT 'a\'; b";
        assert_eq!(stacked_statement_offset(sql, MYSQL), None);
    }
}
