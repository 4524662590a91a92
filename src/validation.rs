use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Why a query was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialKind {
    WriteStatement,
    SelectInto,
    CteWrappedWrite,
    MultipleStatements,
    Empty,
    ParseFailure,
    Unrecognized,
}

/// A single denial reason.
#[derive(Debug, Clone)]
pub struct DenialReason {
    pub statement_index: usize,
    pub kind: DenialKind,
    pub detail: String,
}

/// Outcome of read-only query validation.
#[derive(Debug)]
pub enum ValidationResult {
    Safe,
    Denied { reasons: Vec<DenialReason> },
}

fn denied(statement_index: usize, kind: DenialKind, detail: impl Into<String>) -> ValidationResult {
    ValidationResult::Denied {
        reasons: vec![DenialReason {
            statement_index,
            kind,
            detail: detail.into(),
        }],
    }
}

/// Check that `sql` is exactly one read-only PostgreSQL statement.
pub fn validate(sql: &str) -> ValidationResult {
    let statements = match Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        Ok(stmts) => stmts,
        Err(e) => {
            return denied(
                0,
                DenialKind::ParseFailure,
                format!("cannot verify query safety: {}", e),
            );
        }
    };

    match statements.as_slice() {
        [] => denied(0, DenialKind::Empty, "no statement found"),
        [stmt] => {
            if is_safe_statement(stmt) {
                ValidationResult::Safe
            } else {
                let (kind, detail) = classify_denial(stmt);
                denied(0, kind, detail)
            }
        }
        many => denied(
            1,
            DenialKind::MultipleStatements,
            format!("expected a single statement, found {}", many.len()),
        ),
    }
}

fn is_safe_statement(stmt: &Statement) -> bool {
    match stmt {
        Statement::Query(query) => is_safe_query(query),
        _ => false,
    }
}

fn is_safe_query(query: &Query) -> bool {
    let ctes_safe = query
        .with
        .as_ref()
        .is_none_or(|with| with.cte_tables.iter().all(|cte| is_safe_query(&cte.query)));
    ctes_safe && is_safe_query_body(&query.body)
}

fn is_safe_query_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => is_safe_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            is_safe_query_body(left) && is_safe_query_body(right)
        }
        SetExpr::Values(_) => true,
        SetExpr::Table(_) => true,
        _ => false,
    }
}

fn classify_denial(stmt: &Statement) -> (DenialKind, String) {
    match stmt {
        Statement::Insert(_) => (
            DenialKind::WriteStatement,
            "query would modify state: INSERT".to_string(),
        ),
        Statement::Update { .. } => (
            DenialKind::WriteStatement,
            "query would modify state: UPDATE".to_string(),
        ),
        Statement::Delete(_) => (
            DenialKind::WriteStatement,
            "query would modify state: DELETE".to_string(),
        ),
        Statement::Drop { .. } => (
            DenialKind::WriteStatement,
            "query would modify state: DROP".to_string(),
        ),
        Statement::CreateTable { .. } | Statement::CreateView { .. } => (
            DenialKind::WriteStatement,
            "query would modify state: DDL".to_string(),
        ),
        Statement::Truncate { .. } => (
            DenialKind::WriteStatement,
            "query would modify state: TRUNCATE".to_string(),
        ),
        Statement::Query(query) => classify_query_denial(query),
        _ => (
            DenialKind::Unrecognized,
            "only SELECT queries are allowed".to_string(),
        ),
    }
}

fn classify_query_denial(query: &Query) -> (DenialKind, String) {
    let writes_in_cte = query
        .with
        .as_ref()
        .is_some_and(|with| with.cte_tables.iter().any(|cte| !is_safe_query(&cte.query)));
    if writes_in_cte {
        return (
            DenialKind::CteWrappedWrite,
            "data-modifying statement inside WITH is not allowed".to_string(),
        );
    }

    match query.body.as_ref() {
        SetExpr::Select(select) if select.into.is_some() => (
            DenialKind::SelectInto,
            "SELECT INTO would create a table".to_string(),
        ),
        SetExpr::Insert(_) | SetExpr::Update(_) | SetExpr::Delete(_) => (
            DenialKind::CteWrappedWrite,
            "data-modifying statement is not allowed".to_string(),
        ),
        _ => (
            DenialKind::Unrecognized,
            "query contains unsafe operations".to_string(),
        ),
    }
}
