//! Statement parser (component C): turns a parameterized SQL statement plus
//! its bound arguments into a classified, structurally flattened shape the
//! reactive router can dispatch on.
//!
//! Grounded on the original service's `mypg.Parser`/`mypg.ReactiveToPublish`:
//! bound parameters are interpolated into the SQL text for classification
//! only — the database itself always receives the original parameterized
//! statement, never this interpolated copy. Interpolation exists purely so a
//! real SQL parser can tell us what table and columns were touched.

use std::collections::HashMap;
use std::fmt;

use sqlparser::ast::{
    Assignment, AssignmentTarget, BinaryOperator, Expr, ObjectName, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// A bound parameter value, already typed — the caller knows what it sent to
/// sqlx, so this enum is how it tells the parser how to render `$1`, `$2`, ...
#[derive(Debug, Clone)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null => write!(f, "NULL"),
            BindValue::Bool(b) => write!(f, "{b}"),
            BindValue::Int(i) => write!(f, "{i}"),
            BindValue::Float(v) => write!(f, "{v}"),
            BindValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
}

#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub kind: StatementKind,
    pub table: String,
    /// Columns touched by an INSERT/UPDATE, or the SELECT projection list.
    pub columns: Vec<String>,
    /// Column -> literal value, for the columns written by an INSERT/UPDATE.
    pub values: HashMap<String, String>,
    /// Flattened WHERE clause, simple-comparison and two-level-AND only.
    /// Left empty (never an error) for OR / nested / subquery predicates.
    pub where_kv: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("sql parse error: {0}")]
    Sql(#[from] sqlparser::parser::ParserError),
    #[error("unsupported query")]
    Unsupported,
}

/// Replace each positional placeholder `$1`, `$2`, ... with its bound value,
/// rendered as a SQL literal. Classification-only: the caller must still
/// execute the original parameterized statement against the database.
pub fn interpolate(sql: &str, args: &[BindValue]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '$' {
            let mut digits = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Ok(idx) = digits.parse::<usize>() {
                if idx >= 1 {
                    if let Some(value) = args.get(idx - 1) {
                        out.push_str(&value.to_string());
                        continue;
                    }
                }
            }
            out.push('$');
            out.push_str(&digits);
        } else {
            out.push(c);
        }
    }
    out
}

/// Classifies the mutating statement a repository method is about to run and
/// returns the domain `Operation` the reactive router should publish under.
/// Bound values are irrelevant to verb/table classification, so callers pass
/// the statement text alone; `fallback` covers the (never-expected-in-
/// practice) case where the statement fails to parse or classifies as a
/// `SELECT`, so a parser regression degrades to the caller's own intent
/// rather than losing the event entirely.
pub fn classify_operation(sql: &str, fallback: crate::domain::events::Operation) -> crate::domain::events::Operation {
    use crate::domain::events::Operation;
    match parse(sql, &[]) {
        Ok(parsed) => match parsed.kind {
            StatementKind::Insert => Operation::Insert,
            StatementKind::Update => Operation::Update,
            StatementKind::Delete => Operation::Delete,
            StatementKind::Select => fallback,
        },
        Err(_) => fallback,
    }
}

pub fn parse(sql: &str, args: &[BindValue]) -> Result<ParsedStatement, ParseError> {
    let concrete = interpolate(sql, args);
    let statements = Parser::parse_sql(&GenericDialect {}, &concrete)?;
    let statement = statements.first().ok_or(ParseError::Unsupported)?;

    match statement {
        Statement::Insert(insert) => {
            let table = last_dot_segment(&insert.table.to_string());
            let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();
            let values = extract_insert_values(&columns, insert.source.as_deref());
            Ok(ParsedStatement {
                kind: StatementKind::Insert,
                table,
                columns,
                values,
                where_kv: HashMap::new(),
            })
        }
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table_name = table_with_joins_name(table);
            let (columns, values) = extract_assignments(assignments);
            let where_kv = selection.as_ref().map(flatten_where).unwrap_or_default();
            Ok(ParsedStatement {
                kind: StatementKind::Update,
                table: table_name,
                columns,
                values,
                where_kv,
            })
        }
        Statement::Delete(delete) => {
            let table_name = delete
                .tables
                .first()
                .map(object_name_to_table)
                .or_else(|| delete.from.first().map(table_with_joins_name_ref))
                .ok_or(ParseError::Unsupported)?;
            let where_kv = delete.selection.as_ref().map(flatten_where).unwrap_or_default();
            Ok(ParsedStatement {
                kind: StatementKind::Delete,
                table: table_name,
                columns: Vec::new(),
                values: HashMap::new(),
                where_kv,
            })
        }
        Statement::Query(query) => parse_select(query),
        _ => Err(ParseError::Unsupported),
    }
}

fn parse_select(query: &Query) -> Result<ParsedStatement, ParseError> {
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(ParseError::Unsupported);
    };
    let select: &Select = select.as_ref();
    let table = select
        .from
        .first()
        .map(table_with_joins_name_ref)
        .ok_or(ParseError::Unsupported)?;
    let columns = select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => ident.value.clone(),
            SelectItem::ExprWithAlias { alias, .. } => alias.value.clone(),
            SelectItem::Wildcard(_) => "*".to_string(),
            other => other.to_string(),
        })
        .collect();
    let where_kv = select.selection.as_ref().map(flatten_where).unwrap_or_default();
    Ok(ParsedStatement {
        kind: StatementKind::Select,
        table,
        columns,
        values: HashMap::new(),
        where_kv,
    })
}

/// Flattens a WHERE predicate to a column->value map. Only a bare comparison
/// (`col = value`) or a two-level AND of two such comparisons is supported;
/// anything else (OR, nested AND, subqueries, function calls) yields an empty
/// map rather than an error — matching the original's documented behavior.
fn flatten_where(expr: &Expr) -> HashMap<String, String> {
    let mut out = HashMap::new();
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            if let (Some(col), Some(val)) = (expr_column_name(left), expr_literal(right)) {
                out.insert(col, val);
            }
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            if let (Some((lc, lv)), Some((rc, rv))) = (single_comparison(left), single_comparison(right))
            {
                out.insert(lc, lv);
                out.insert(rc, rv);
            }
        }
        _ => {}
    }
    out
}

fn single_comparison(expr: &Expr) -> Option<(String, String)> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => Some((expr_column_name(left)?, expr_literal(right)?)),
        _ => None,
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.clone()),
        _ => None,
    }
}

fn expr_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(value_with_span) => Some(value_to_string(&value_with_span.value)),
        Expr::Identifier(ident) => Some(ident.value.clone()),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => s.clone(),
        Value::Number(n, _) => n.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn extract_assignments(assignments: &[Assignment]) -> (Vec<String>, HashMap<String, String>) {
    let mut columns = Vec::with_capacity(assignments.len());
    let mut values = HashMap::with_capacity(assignments.len());
    for assignment in assignments {
        let name = match &assignment.target {
            AssignmentTarget::ColumnName(object_name) => object_name_to_table(object_name),
            AssignmentTarget::Tuple(names) => names
                .first()
                .map(object_name_to_table)
                .unwrap_or_default(),
        };
        if let Some(literal) = expr_literal(&assignment.value) {
            values.insert(name.clone(), literal);
        }
        columns.push(name);
    }
    (columns, values)
}

fn extract_insert_values(columns: &[String], source: Option<&Query>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(query) = source else { return out };
    let SetExpr::Values(values) = query.body.as_ref() else {
        return out;
    };
    let Some(row) = values.rows.first() else {
        return out;
    };
    for (col, expr) in columns.iter().zip(row.iter()) {
        if let Some(literal) = expr_literal(expr) {
            out.insert(col.clone(), literal);
        }
    }
    out
}

fn object_name_to_table(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|part| part.to_string())
        .unwrap_or_default()
}

fn table_with_joins_name(table: &sqlparser::ast::TableWithJoins) -> String {
    table_with_joins_name_ref(table)
}

fn table_with_joins_name_ref(table: &sqlparser::ast::TableWithJoins) -> String {
    match &table.relation {
        TableFactor::Table { name, .. } => object_name_to_table(name),
        _ => String::new(),
    }
}

fn last_dot_segment(name: &str) -> String {
    name.rsplit('.')
        .next()
        .unwrap_or(name)
        .trim_matches('"')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_positional_placeholders() {
        let sql = "INSERT INTO friends (user_id, friend_id) VALUES ($1, $2)";
        let rendered = interpolate(sql, &[BindValue::Text("1".into()), BindValue::Text("2".into())]);
        assert_eq!(rendered, "INSERT INTO friends (user_id, friend_id) VALUES ('1', '2')");
    }

    #[test]
    fn classifies_insert_and_extracts_columns() {
        let sql = "INSERT INTO friends (user_id, friend_id, status) VALUES ($1, $2, $3)";
        let parsed = parse(
            sql,
            &[
                BindValue::Text("1".into()),
                BindValue::Text("2".into()),
                BindValue::Text("pending".into()),
            ],
        )
        .unwrap();
        assert_eq!(parsed.kind, StatementKind::Insert);
        assert_eq!(parsed.table, "friends");
        assert_eq!(parsed.values.get("status").unwrap(), "pending");
    }

    #[test]
    fn classifies_update_with_simple_where() {
        let sql = "UPDATE friends SET status = $1 WHERE id = $2";
        let parsed = parse(
            sql,
            &[BindValue::Text("accepted".into()), BindValue::Int(42)],
        )
        .unwrap();
        assert_eq!(parsed.kind, StatementKind::Update);
        assert_eq!(parsed.table, "friends");
        assert_eq!(parsed.where_kv.get("id").unwrap(), "42");
    }

    #[test]
    fn two_level_and_where_is_flattened() {
        let sql = "UPDATE messages SET content = $1 WHERE channel_id = $2 AND id = $3";
        let parsed = parse(
            sql,
            &[
                BindValue::Text("hi".into()),
                BindValue::Int(7),
                BindValue::Int(9),
            ],
        )
        .unwrap();
        assert_eq!(parsed.where_kv.len(), 2);
    }

    #[test]
    fn unsupported_where_structure_leaves_where_kv_empty() {
        let sql = "UPDATE messages SET content = $1 WHERE channel_id = $2 OR id = $3";
        let parsed = parse(
            sql,
            &[
                BindValue::Text("hi".into()),
                BindValue::Int(7),
                BindValue::Int(9),
            ],
        )
        .unwrap();
        assert!(parsed.where_kv.is_empty());
    }

    #[test]
    fn aliased_table_reduces_to_underlying_name() {
        let sql = "SELECT m.id FROM messages AS m WHERE m.channel_id = $1";
        let parsed = parse(sql, &[BindValue::Int(3)]).unwrap();
        assert_eq!(parsed.table, "messages");
    }

    #[test]
    fn classify_operation_matches_statement_verb() {
        use crate::domain::events::Operation;
        assert!(matches!(
            classify_operation("INSERT INTO friends (id) VALUES ($1)", Operation::Delete),
            Operation::Insert
        ));
        assert!(matches!(
            classify_operation("UPDATE friends SET status = $1 WHERE id = $2", Operation::Insert),
            Operation::Update
        ));
        assert!(matches!(
            classify_operation("DELETE FROM friends WHERE id = $1", Operation::Insert),
            Operation::Delete
        ));
    }

    #[test]
    fn classify_operation_falls_back_on_parse_failure() {
        use crate::domain::events::Operation;
        assert!(matches!(
            classify_operation("not sql at all", Operation::Update),
            Operation::Update
        ));
    }

    #[test]
    fn unsupported_statement_kind_is_an_error() {
        let sql = "CREATE TABLE foo (id INT)";
        let err = parse(sql, &[]).unwrap_err();
        assert!(matches!(err, ParseError::Unsupported) || matches!(err, ParseError::Sql(_)));
    }
}
