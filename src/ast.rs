//! Shared AST helpers for the rule checkers
//!
//! WHERE extraction, column collection, dummy-condition detection and the
//! function/table collectors that walk a whole statement.

use crate::context::StatementKind;
use crate::patterns::{NameMatcher, bare_table_name};
use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName,
    Query, Select, SetExpr, Statement, TableFactor, Value, Visit, Visitor, visit_expressions,
};
use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;

/// Comparisons treated as no-op conditions unless configured otherwise
pub const DEFAULT_DUMMY_PATTERNS: &[&str] = &["1=1", "1 = 1", "'1'='1'", "'a'='a'", "true"];

/// Outermost plain SELECT of a query, looking through parentheses
pub fn outer_select(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(inner) => outer_select(inner),
        _ => None,
    }
}

/// WHERE expression of a SELECT, UPDATE or DELETE
pub fn where_clause<'a>(kind: &StatementKind<'a>) -> Option<&'a Expr> {
    match *kind {
        StatementKind::Select(query) => outer_select(query).and_then(|s| s.selection.as_ref()),
        StatementKind::Update(update) => update.selection.as_ref(),
        StatementKind::Delete(delete) => delete.selection.as_ref(),
        _ => None,
    }
}

/// Bare name of the table a DML statement writes to
pub fn target_table(kind: &StatementKind<'_>) -> Option<String> {
    match *kind {
        StatementKind::Update(update) => relation_name(&update.table.relation),
        StatementKind::Delete(delete) => {
            if let Some(name) = delete.tables.first() {
                return Some(bare_table_name(&name.to_string()));
            }
            let from = match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
            };
            from.first().and_then(|t| relation_name(&t.relation))
        }
        StatementKind::Insert(insert) => Some(bare_table_name(&insert.table.to_string())),
        _ => None,
    }
}

/// Bare name of the first table a statement reads or writes
pub fn primary_table(kind: &StatementKind<'_>) -> Option<String> {
    match *kind {
        StatementKind::Select(query) => outer_select(query)
            .and_then(|s| s.from.first())
            .and_then(|t| relation_name(&t.relation)),
        other => target_table(&other),
    }
}

fn relation_name(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { name, .. } => Some(bare_table_name(&name.to_string())),
        _ => None,
    }
}

fn strip_nested(mut expr: &Expr) -> &Expr {
    while let Expr::Nested(inner) = expr {
        expr = inner;
    }
    expr
}

/// Column name of a plain or qualified column reference, lowercased
pub fn column_name(expr: &Expr) -> Option<String> {
    match strip_nested(expr) {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|p| p.value.to_lowercase()),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Option<&Value> {
    match strip_nested(expr) {
        Expr::Value(v) => Some(&v.value),
        _ => None,
    }
}

/// Numeric literal value; placeholders and expressions yield `None`
pub fn numeric_literal(expr: &Expr) -> Option<u64> {
    match literal(expr)? {
        Value::Number(n, _) => n.parse().ok(),
        _ => None,
    }
}

fn is_bound_value(expr: &Expr) -> bool {
    matches!(
        literal(expr),
        Some(
            Value::Number(..)
                | Value::SingleQuotedString(_)
                | Value::DoubleQuotedString(_)
                | Value::Placeholder(_)
        )
    )
}

/// `<literal> = <same literal>`, e.g. `1 = 1` or `'a' = 'a'`
pub fn is_constant_equality(expr: &Expr) -> bool {
    let Expr::BinaryOp {
        left,
        op: BinaryOperator::Eq,
        right,
    } = strip_nested(expr)
    else {
        return false;
    };
    match (literal(left), literal(right)) {
        (Some(Value::Placeholder(_) | Value::Null), _) => false,
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// Collect column names referenced in an expression
///
/// Sub-queries are not entered: their columns belong to another scope.
pub fn collect_columns(expr: &Expr) -> BTreeSet<String> {
    let mut columns = BTreeSet::new();
    collect_columns_into(expr, &mut columns);
    columns
}

fn collect_columns_into(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => {
            if let Some(name) = column_name(expr) {
                out.insert(name);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_columns_into(left, out);
            collect_columns_into(right, out);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Cast { expr, .. }
        | Expr::Nested(expr)
        | Expr::InSubquery { expr, .. } => collect_columns_into(expr, out),
        Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::IsTrue(expr)
        | Expr::IsNotTrue(expr)
        | Expr::IsFalse(expr)
        | Expr::IsNotFalse(expr)
        | Expr::IsUnknown(expr)
        | Expr::IsNotUnknown(expr) => collect_columns_into(expr, out),
        Expr::InList { expr, list, .. } => {
            collect_columns_into(expr, out);
            for item in list {
                collect_columns_into(item, out);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_columns_into(expr, out);
            collect_columns_into(low, out);
            collect_columns_into(high, out);
        }
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            collect_columns_into(expr, out);
            collect_columns_into(pattern, out);
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(expr) = operand {
                collect_columns_into(expr, out);
            }
            for case_when in conditions {
                collect_columns_into(&case_when.condition, out);
                collect_columns_into(&case_when.result, out);
            }
            if let Some(expr) = else_result {
                collect_columns_into(expr, out);
            }
        }
        Expr::Function(func) => {
            if let FunctionArguments::List(arg_list) = &func.args {
                for arg in &arg_list.args {
                    if let Some(expr) = function_arg_expr(arg) {
                        collect_columns_into(expr, out);
                    }
                }
            }
        }
        Expr::Tuple(exprs) => {
            for expr in exprs {
                collect_columns_into(expr, out);
            }
        }
        _ => {}
    }
}

fn function_arg_expr(arg: &FunctionArg) -> Option<&Expr> {
    match arg {
        FunctionArg::Unnamed(arg_expr)
        | FunctionArg::Named { arg: arg_expr, .. }
        | FunctionArg::ExprNamed { arg: arg_expr, .. } => match arg_expr {
            FunctionArgExpr::Expr(expr) => Some(expr),
            _ => None,
        },
    }
}

/// Whether the condition pins one of `keys` to a literal or placeholder
///
/// `id = ?`, `user_id = 42` or `code = 'X'` qualify when the column is a key. One
/// pinned operand is enough under AND; under OR every branch must be pinned, so
/// `id = 1 OR 1=1` does not qualify.
pub fn has_key_equality(expr: &Expr, keys: &NameMatcher) -> bool {
    match strip_nested(expr) {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => has_key_equality(left, keys) || has_key_equality(right, keys),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => has_key_equality(left, keys) && has_key_equality(right, keys),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            let keyed = |col: &Expr, val: &Expr| {
                column_name(col).is_some_and(|name| keys.matches(&name)) && is_bound_value(val)
            };
            keyed(&**left, &**right) || keyed(&**right, &**left)
        }
        _ => false,
    }
}

/// Recognizes no-op WHERE conditions by text pattern and by AST shape
#[derive(Debug, Clone)]
pub struct DummyConditionMatcher {
    normalized: Vec<String>,
}

impl Default for DummyConditionMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DUMMY_PATTERNS.iter().copied())
    }
}

impl DummyConditionMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = patterns
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        Self { normalized }
    }

    /// Whether any operand of the top-level AND/OR tree is a no-op comparison
    ///
    /// Matches `1=1 AND status = 'x'` as well as a bare `1=1`.
    pub fn contains_dummy(&self, expr: &Expr) -> bool {
        match strip_nested(expr) {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And | BinaryOperator::Or,
                right,
            } => self.contains_dummy(left) || self.contains_dummy(right),
            leaf => self.is_dummy_leaf(leaf),
        }
    }

    /// Whether the condition as a whole can never filter out a row
    ///
    /// `1=1 AND status = 'x'` filters, `status = 'x' OR 1=1` does not.
    pub fn is_always_true(&self, expr: &Expr) -> bool {
        match strip_nested(expr) {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => self.is_always_true(left) && self.is_always_true(right),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right,
            } => self.is_always_true(left) || self.is_always_true(right),
            leaf => self.is_dummy_leaf(leaf),
        }
    }

    fn is_dummy_leaf(&self, expr: &Expr) -> bool {
        if is_constant_equality(expr) || matches!(literal(expr), Some(Value::Boolean(true))) {
            return true;
        }
        let text = normalize(&expr.to_string());
        self.normalized.iter().any(|p| *p == text)
    }
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Collects every function name reachable from a statement
///
/// The walk is driven by the sqlparser visitor, so every expression position is
/// covered: projections, joins, SET and VALUES lists, `ON DUPLICATE KEY UPDATE`,
/// `UPDATE ... FROM`, `DELETE ... USING`, window specs, aggregate filters and
/// sub-queries. Expressions are tracked by address in a visited set and entered
/// once.
#[derive(Debug, Default)]
pub struct FunctionCollector {
    names: BTreeSet<String>,
    visited: HashSet<*const Expr>,
}

impl FunctionCollector {
    /// Lowercased, unqualified names of all functions called by `statement`
    ///
    /// # Examples
    /// ```
    /// # use sql_guard::ast::FunctionCollector;
    /// # use sql_guard::sql_parser::parse_statement;
    /// # use sql_guard::types::SqlDialect;
    /// let stmt = parse_statement(
    ///     "SELECT UPPER(name) FROM t WHERE id = (SELECT MAX(id) FROM t WHERE SLEEP(5) = 0)",
    ///     SqlDialect::MySQL,
    /// ).unwrap();
    /// let names = FunctionCollector::collect(&stmt);
    /// assert!(names.contains("sleep"));
    /// assert!(names.contains("max"));
    /// ```
    pub fn collect(statement: &Statement) -> BTreeSet<String> {
        let mut collector = Self::default();
        let _ = visit_expressions(statement, |expr| {
            collector.expr(expr);
            ControlFlow::<()>::Continue(())
        });
        collector.names
    }

    fn expr(&mut self, expr: &Expr) {
        if !self.visited.insert(expr as *const Expr) {
            return;
        }
        if let Expr::Function(func) = expr {
            let name = bare_table_name(&func.name.to_string()).to_lowercase();
            self.names.insert(name);
        }
    }
}

/// Collects table names referenced anywhere in a statement
#[derive(Debug, Default)]
struct TableCollector {
    tables: Vec<String>,
}

impl Visitor for TableCollector {
    type Break = ();

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let name = bare_table_name(&relation.to_string());
        if !self.tables.contains(&name) {
            self.tables.push(name);
        }
        ControlFlow::Continue(())
    }
}

/// Bare names of every table the statement touches, in first-seen order
///
/// Covers FROM, JOIN, derived tables, sub-queries, CTE bodies and DML targets.
pub fn collect_tables(statement: &Statement, kind: &StatementKind<'_>) -> Vec<String> {
    let mut collector = TableCollector::default();
    let _ = statement.visit(&mut collector);

    if let Some(target) = target_table(kind) {
        if !collector.tables.contains(&target) {
            collector.tables.insert(0, target);
        }
    }
    collector.tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SqlContext;

    fn ctx(sql: &str) -> SqlContext {
        SqlContext::builder(sql).build().unwrap()
    }

    fn where_of(ctx: &SqlContext) -> Expr {
        where_clause(&ctx.kind()).cloned().expect("statement has a WHERE")
    }

    #[test]
    fn test_where_clause_per_kind() {
        assert!(where_clause(&ctx("SELECT * FROM t WHERE a = 1").kind()).is_some());
        assert!(where_clause(&ctx("UPDATE t SET a = 1 WHERE id = 2").kind()).is_some());
        assert!(where_clause(&ctx("DELETE FROM t WHERE id = 2").kind()).is_some());
        assert!(where_clause(&ctx("DELETE FROM t").kind()).is_none());
        assert!(where_clause(&ctx("SELECT * FROM t").kind()).is_none());
    }

    #[test]
    fn test_collect_columns_dedup_case_insensitive() {
        let c = ctx("SELECT * FROM t WHERE Status = 1 AND t.status = 2 OR (deleted IN (0, 1))");
        let cols = collect_columns(&where_of(&c));
        assert_eq!(
            cols.into_iter().collect::<Vec<_>>(),
            vec!["deleted".to_string(), "status".to_string()]
        );
    }

    #[test]
    fn test_collect_columns_skips_subquery_body() {
        let c = ctx("SELECT * FROM t WHERE id IN (SELECT user_id FROM u WHERE flag = 1)");
        let cols = collect_columns(&where_of(&c));
        assert_eq!(cols.into_iter().collect::<Vec<_>>(), vec!["id".to_string()]);
    }

    #[test]
    fn test_dummy_condition_detection() {
        let matcher = DummyConditionMatcher::default();
        for sql in [
            "SELECT * FROM t WHERE 1=1",
            "SELECT * FROM t WHERE 1 = 1 AND status = 'x'",
            "SELECT * FROM t WHERE 'a' = 'a'",
            "SELECT * FROM t WHERE (2 = 2)",
            "SELECT * FROM t WHERE true",
        ] {
            let c = ctx(sql);
            assert!(matcher.contains_dummy(&where_of(&c)), "Expected dummy: {}", sql);
        }

        let c = ctx("SELECT * FROM t WHERE active = true AND id = ?");
        assert!(!matcher.contains_dummy(&where_of(&c)));
        let c = ctx("SELECT * FROM t WHERE ? = ?");
        assert!(!matcher.contains_dummy(&where_of(&c)));
    }

    #[test]
    fn test_always_true() {
        let matcher = DummyConditionMatcher::default();
        let c = ctx("SELECT * FROM t WHERE 1=1 AND status = 'x'");
        assert!(!matcher.is_always_true(&where_of(&c)));
        let c = ctx("SELECT * FROM t WHERE status = 'x' OR 1=1");
        assert!(matcher.is_always_true(&where_of(&c)));
    }

    #[test]
    fn test_key_equality() {
        let keys = NameMatcher::new(["id", "order_no"]).unwrap();
        let c = ctx("SELECT * FROM t WHERE id = ?");
        assert!(has_key_equality(&where_of(&c), &keys));
        let c = ctx("SELECT * FROM t WHERE status = 1 AND order_no = 'A1'");
        assert!(has_key_equality(&where_of(&c), &keys));
        let c = ctx("SELECT * FROM t WHERE id > 5");
        assert!(!has_key_equality(&where_of(&c), &keys));
        let c = ctx("SELECT * FROM t WHERE id = other_id");
        assert!(!has_key_equality(&where_of(&c), &keys));
        let c = ctx("SELECT * FROM t WHERE id = 1 OR 1=1");
        assert!(!has_key_equality(&where_of(&c), &keys));
        let c = ctx("SELECT * FROM t WHERE id = 1 OR id = 2");
        assert!(has_key_equality(&where_of(&c), &keys));
    }

    #[test]
    fn test_function_collector_reaches_nested_scopes() {
        let c = ctx(
            "SELECT CASE WHEN a > 0 THEN load_file('/etc/passwd') ELSE 'x' END \
             FROM t JOIN u ON t.id = u.id AND benchmark(100, md5('a')) > 0 \
             WHERE EXISTS (SELECT 1 FROM v WHERE pg_sleep(1) IS NULL) \
             ORDER BY LOWER(name)",
        );
        let names = FunctionCollector::collect(c.statement().unwrap());
        for expected in ["load_file", "benchmark", "md5", "pg_sleep", "lower"] {
            assert!(names.contains(expected), "Missing {} in {:?}", expected, names);
        }
    }

    #[test]
    fn test_function_collector_dml() {
        let c = ctx("UPDATE t SET a = SLEEP(1) WHERE id = 1");
        assert!(FunctionCollector::collect(c.statement().unwrap()).contains("sleep"));
        let c = ctx("INSERT INTO t (a) VALUES (LOAD_FILE('/x'))");
        assert!(FunctionCollector::collect(c.statement().unwrap()).contains("load_file"));
        let c = ctx("INSERT INTO t (a) SELECT SYS_EXEC('id') FROM dual");
        assert!(FunctionCollector::collect(c.statement().unwrap()).contains("sys_exec"));
    }

    #[test]
    fn test_function_collector_reaches_every_clause() {
        use crate::types::SqlDialect::{MySQL, Postgres};
        let cases = [
            (MySQL, "INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = SLEEP(5)"),
            (MySQL, "INSERT INTO t SET a = SLEEP(5)"),
            (MySQL, "SELECT SUM(a) OVER (PARTITION BY SLEEP(5)) FROM t"),
            (MySQL, "SELECT GROUP_CONCAT(a ORDER BY SLEEP(5)) FROM t"),
            (Postgres, "UPDATE t SET a = 1 FROM (SELECT SLEEP(5) AS s) x WHERE t.id = x.s"),
            (Postgres, "DELETE FROM t USING (SELECT SLEEP(5) AS s) x WHERE t.id = x.s"),
            (Postgres, "SELECT COUNT(*) FILTER (WHERE SLEEP(5) = 0) FROM t"),
        ];
        for (dialect, sql) in cases {
            let c = SqlContext::builder(sql).dialect(dialect).build().unwrap();
            let statement = c.statement().unwrap_or_else(|| panic!("Should parse: {}", sql));
            assert!(
                FunctionCollector::collect(statement).contains("sleep"),
                "Missed sleep in {}",
                sql
            );
        }
    }

    #[test]
    fn test_function_collector_qualify() {
        let c = SqlContext::builder(
            "SELECT a FROM t QUALIFY ROW_NUMBER() OVER (ORDER BY pg_sleep(1)) = 1",
        )
        .dialect(crate::types::SqlDialect::Generic)
        .build()
        .unwrap();
        let names = FunctionCollector::collect(c.statement().expect("QUALIFY parses"));
        assert!(names.contains("pg_sleep"), "{:?}", names);
    }

    #[test]
    fn test_collect_tables() {
        let c = ctx(
            "WITH recent AS (SELECT * FROM db1.orders) \
             SELECT * FROM `users` u JOIN recent r ON r.uid = u.id \
             WHERE u.id IN (SELECT uid FROM sys_user)",
        );
        let tables = collect_tables(c.statement().unwrap(), &c.kind());
        for expected in ["orders", "users", "recent", "sys_user"] {
            assert!(tables.iter().any(|t| t == expected), "Missing {} in {:?}", expected, tables);
        }
    }

    #[test]
    fn test_target_and_primary_table() {
        assert_eq!(
            target_table(&ctx("UPDATE `app`.`audit_log` SET a = 1").kind()),
            Some("audit_log".to_string())
        );
        assert_eq!(
            target_table(&ctx("DELETE FROM history WHERE id = 1").kind()),
            Some("history".to_string())
        );
        assert_eq!(
            target_table(&ctx("INSERT INTO config (k) VALUES ('v')").kind()),
            Some("config".to_string())
        );
        assert_eq!(
            primary_table(&ctx("SELECT * FROM users u WHERE u.id = 1").kind()),
            Some("users".to_string())
        );
    }
}
