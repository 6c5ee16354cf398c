//! Wildcard patterns for field, table and statement-id matching
//!
//! All patterns are compiled once when a checker is built and are read-only
//! afterwards, so matchers can be shared across threads freely.

use crate::error::GuardError;
use regex::{Regex, RegexBuilder};

/// Case-insensitive name list with trailing-`*` prefix wildcards
///
/// `create_*` matches `create_time` and `create_by`; `status` only matches `status`.
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl NameMatcher {
    /// Build a matcher, rejecting blank entries
    pub fn new<I, S>(names: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() || name == "*" {
                return Err(GuardError::invalid_config(format!(
                    "Name pattern '{}' is empty or matches everything",
                    name
                )));
            }
            match name.strip_suffix('*') {
                Some(prefix) => matcher.prefixes.push(prefix.to_string()),
                None => matcher.exact.push(name),
            }
        }
        Ok(matcher)
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.exact.iter().any(|e| *e == name) || self.prefixes.iter().any(|p| name.starts_with(p))
    }
}

/// Table patterns where `*` stands for one or more non-underscore characters
///
/// The wildcard never crosses an underscore, so `sys_*` matches `sys_user` but
/// neither `system` nor `sys_user_detail`.
#[derive(Debug, Clone, Default)]
pub struct TablePatternSet {
    patterns: Vec<Regex>,
}

impl TablePatternSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile_wildcard(p.as_ref(), "[^_]+"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, table: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(table))
    }
}

/// Statement-id globs where `*` matches any run of characters (`*.selectAll*`)
#[derive(Debug, Clone, Default)]
pub struct StatementIdPatterns {
    patterns: Vec<Regex>,
}

impl StatementIdPatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| compile_wildcard(p.as_ref(), ".*"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, statement_id: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(statement_id))
    }
}

/// Anchor a wildcard, escaping everything except `*`
fn compile_wildcard(pattern: &str, star: &str) -> Result<Regex, GuardError> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(GuardError::invalid_config("Wildcard pattern cannot be empty"));
    }

    let body = trimmed
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(star);

    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .map_err(|source| GuardError::InvalidPattern {
            pattern: trimmed.to_string(),
            source,
        })
}

/// Reduce a possibly qualified, quoted table reference to its bare name
///
/// # Examples
/// ```
/// # use sql_guard::patterns::bare_table_name;
/// assert_eq!(bare_table_name("`mydb`.`sys_user`"), "sys_user");
/// assert_eq!(bare_table_name("[dbo].[Orders]"), "Orders");
/// assert_eq!(bare_table_name("public.\"audit_log\""), "audit_log");
/// ```
pub fn bare_table_name(reference: &str) -> String {
    let last = reference.rsplit('.').next().unwrap_or(reference).trim();
    unquote(last).to_string()
}

/// Remove one pair of identifier quotes: backticks, double quotes or brackets
pub fn unquote(name: &str) -> &str {
    let pairs = [('`', '`'), ('"', '"'), ('[', ']')];
    for (open, close) in pairs {
        if name.len() >= 2 && name.starts_with(open) && name.ends_with(close) {
            return &name[1..name.len() - 1];
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_wildcard_word_boundary() {
        let set = TablePatternSet::new(["sys_*"]).unwrap();
        assert!(set.matches("sys_user"));
        assert!(set.matches("SYS_USER"), "matching is case-insensitive");
        assert!(!set.matches("system"));
        assert!(!set.matches("sys_user_detail"));
        assert!(!set.matches("sys_"));
    }

    #[test]
    fn test_table_exact_and_escaping() {
        let set = TablePatternSet::new(["audit.log", "admin_users"]).unwrap();
        assert!(set.matches("audit.log"));
        assert!(!set.matches("auditxlog"), "dot must be literal");
        assert!(set.matches("admin_users"));
        assert!(!set.matches("admin_users2"));
    }

    #[test]
    fn test_name_matcher_prefix() {
        let matcher = NameMatcher::new(["deleted", "create_*"]).unwrap();
        assert!(matcher.matches("DELETED"));
        assert!(matcher.matches("create_time"));
        assert!(!matcher.matches("created"));
        assert!(!matcher.matches("deleted_at"));
    }

    #[test]
    fn test_name_matcher_rejects_blank() {
        assert!(NameMatcher::new(["  "]).is_err());
        assert!(NameMatcher::new(["*"]).is_err());
    }

    #[test]
    fn test_statement_id_glob() {
        let ids = StatementIdPatterns::new(["com.example.UserMapper.*", "*.countAll"]).unwrap();
        assert!(ids.matches("com.example.UserMapper.selectById"));
        assert!(ids.matches("OrderMapper.countAll"));
        assert!(!ids.matches("comXexample.UserMapper.selectById"));
        assert!(!ids.matches("OrderMapper.countAllRows"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("`t`"), "t");
        assert_eq!(unquote("\"t\""), "t");
        assert_eq!(unquote("[t]"), "t");
        assert_eq!(unquote("t"), "t");
        assert_eq!(unquote("`"), "`");
    }
}
