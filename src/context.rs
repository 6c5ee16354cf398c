//! Per-statement evaluation input

use crate::error::GuardError;
use crate::sql_parser::parse_statement;
use crate::types::SqlDialect;
use sqlparser::ast::{Delete, Insert, Query, Statement, Update};
use std::collections::BTreeMap;

/// Offset/limit pagination requested by the caller outside the SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBounds {
    pub offset: u64,
    pub limit: u64,
}

impl RowBounds {
    /// Bounds that do not restrict anything
    pub const UNBOUNDED: RowBounds = RowBounds {
        offset: 0,
        limit: u64::MAX,
    };

    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }
}

/// Page descriptor passed as a bound parameter (1-based page number)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

/// Value bound to a named statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Page(PageRequest),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<PageRequest> for ParamValue {
    fn from(value: PageRequest) -> Self {
        Self::Page(value)
    }
}

/// Borrowed view of the statement used for per-kind dispatch
#[derive(Debug, Clone, Copy)]
pub enum StatementKind<'a> {
    Select(&'a Query),
    Update(&'a Update),
    Delete(&'a Delete),
    Insert(&'a Insert),
    /// Any other parsed statement (DDL, SET, SHOW, CALL ...)
    Other(&'a Statement),
    Unparsable,
}

/// Everything known about one statement at interception time
///
/// Built once per statement and read-only during evaluation.
#[derive(Debug, Clone)]
pub struct SqlContext {
    sql: String,
    statement: Option<Statement>,
    statement_id: Option<String>,
    params: BTreeMap<String, ParamValue>,
    pagination_hint: Option<RowBounds>,
    dialect: SqlDialect,
}

impl SqlContext {
    /// Start building a context for `sql`
    ///
    /// # Examples
    /// ```
    /// # use sql_guard::{SqlContext, RowBounds, StatementKind};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let ctx = SqlContext::builder("SELECT * FROM users WHERE id = ?")
    ///     .statement_id("UserMapper.selectById")
    ///     .param("id", 42)
    ///     .build()?;
    /// assert!(matches!(ctx.kind(), StatementKind::Select(_)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(sql: impl Into<String>) -> SqlContextBuilder {
        SqlContextBuilder {
            sql: sql.into(),
            statement: None,
            statement_id: None,
            params: BTreeMap::new(),
            pagination_hint: None,
            dialect: SqlDialect::default(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parsed statement, `None` when the SQL could not be parsed
    pub fn statement(&self) -> Option<&Statement> {
        self.statement.as_ref()
    }

    pub fn statement_id(&self) -> Option<&str> {
        self.statement_id.as_deref()
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    pub fn pagination_hint(&self) -> Option<RowBounds> {
        self.pagination_hint
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// First page descriptor among the bound parameters
    pub fn page_request(&self) -> Option<PageRequest> {
        self.params.values().find_map(|value| match value {
            ParamValue::Page(page) => Some(*page),
            _ => None,
        })
    }

    pub fn kind(&self) -> StatementKind<'_> {
        match &self.statement {
            None => StatementKind::Unparsable,
            Some(Statement::Query(query)) => StatementKind::Select(query),
            Some(Statement::Update(update)) => StatementKind::Update(update),
            Some(Statement::Delete(delete)) => StatementKind::Delete(delete),
            Some(Statement::Insert(insert)) => StatementKind::Insert(insert),
            Some(other) => StatementKind::Other(other),
        }
    }
}

/// Builder for [`SqlContext`]
#[derive(Debug)]
pub struct SqlContextBuilder {
    sql: String,
    statement: Option<Option<Statement>>,
    statement_id: Option<String>,
    params: BTreeMap<String, ParamValue>,
    pagination_hint: Option<RowBounds>,
    dialect: SqlDialect,
}

impl SqlContextBuilder {
    pub fn dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Supply an already parsed statement instead of parsing in `build`
    pub fn statement(mut self, statement: Statement) -> Self {
        self.statement = Some(Some(statement));
        self
    }

    /// Mark the statement as unparsable without attempting to parse it
    pub fn unparsable(mut self) -> Self {
        self.statement = Some(None);
        self
    }

    pub fn statement_id(mut self, statement_id: impl Into<String>) -> Self {
        self.statement_id = Some(statement_id.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn pagination_hint(mut self, bounds: RowBounds) -> Self {
        self.pagination_hint = Some(bounds);
        self
    }

    /// Finish the context, parsing the SQL once unless a statement was supplied
    pub fn build(self) -> Result<SqlContext, GuardError> {
        if self.sql.trim().is_empty() {
            return Err(GuardError::EmptySql);
        }

        let statement = match self.statement {
            Some(statement) => statement,
            None => parse_statement(&self.sql, self.dialect),
        };

        Ok(SqlContext {
            sql: self.sql,
            statement,
            statement_id: self.statement_id,
            params: self.params,
            pagination_hint: self.pagination_hint,
            dialect: self.dialect,
        })
    }
}
