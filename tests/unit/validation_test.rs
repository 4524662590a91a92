use dbpush::validation::{validate, DenialKind, ValidationResult};

fn assert_safe(sql: &str) {
    match validate(sql) {
        ValidationResult::Safe => {}
        ValidationResult::Denied { reasons } => {
            panic!(
                "Expected Safe for '{}', got Denied: {:?}",
                sql,
                reasons.iter().map(|r| &r.detail).collect::<Vec<_>>()
            );
        }
    }
}

fn assert_denied(sql: &str, expected: DenialKind) {
    match validate(sql) {
        ValidationResult::Safe => {
            panic!("Expected Denied for '{}', got Safe", sql);
        }
        ValidationResult::Denied { reasons } => {
            assert!(!reasons.is_empty(), "Expected denial reasons for '{}'", sql);
            assert_eq!(
                reasons[0].kind, expected,
                "Unexpected kind for '{}': {:?}",
                sql, reasons[0].detail
            );
        }
    }
}

// --- SELECT (allowed) ---

#[test]
fn test_select_allowed() {
    assert_safe("SELECT 1");
}

#[test]
fn test_select_from_table_allowed() {
    assert_safe("SELECT id, value, updatedon FROM readings");
}

#[test]
fn test_quoted_identifiers_allowed() {
    assert_safe("SELECT \"id\", \"value\", \"updatedon\" FROM \"Sensor Readings\"");
}

#[test]
fn test_aggregate_with_group_by_allowed() {
    assert_safe(
        "SELECT region AS id, avg(latency_ms) AS value, max(ts) AS updatedon \
         FROM requests WHERE ts > now() - interval '1 hour' GROUP BY region",
    );
}

#[test]
fn test_select_with_cte_allowed() {
    assert_safe("WITH recent AS (SELECT id, value FROM t) SELECT * FROM recent");
}

#[test]
fn test_union_allowed() {
    assert_safe("SELECT id, value FROM a UNION ALL SELECT id, value FROM b");
}

#[test]
fn test_trailing_semicolon_is_one_statement() {
    assert_safe("SELECT 1;");
}

// --- Writes (denied) ---

#[test]
fn test_insert_denied() {
    assert_denied(
        "INSERT INTO readings (id, value) VALUES ('a', 1)",
        DenialKind::WriteStatement,
    );
}

#[test]
fn test_update_denied() {
    assert_denied("UPDATE readings SET value = 0", DenialKind::WriteStatement);
}

#[test]
fn test_delete_denied() {
    assert_denied("DELETE FROM readings", DenialKind::WriteStatement);
}

#[test]
fn test_drop_denied() {
    assert_denied("DROP TABLE readings", DenialKind::WriteStatement);
}

#[test]
fn test_truncate_denied() {
    assert_denied("TRUNCATE readings", DenialKind::WriteStatement);
}

#[test]
fn test_select_into_denied() {
    assert_denied("SELECT * INTO backup FROM readings", DenialKind::SelectInto);
}

#[test]
fn test_cte_wrapped_insert_denied() {
    assert_denied(
        "WITH src AS (SELECT 1 AS id) INSERT INTO readings (id) SELECT id FROM src",
        DenialKind::CteWrappedWrite,
    );
}

#[test]
fn test_cte_wrapped_delete_denied() {
    assert_denied(
        "WITH src AS (SELECT 1 AS id) DELETE FROM readings WHERE id IN (SELECT id FROM src)",
        DenialKind::CteWrappedWrite,
    );
}

// --- Shape ---

#[test]
fn test_multiple_statements_denied() {
    assert_denied("SELECT 1; SELECT 2", DenialKind::MultipleStatements);
}

#[test]
fn test_write_hidden_after_select_denied() {
    assert_denied(
        "SELECT 1; DELETE FROM readings",
        DenialKind::MultipleStatements,
    );
}

#[test]
fn test_empty_denied() {
    assert_denied("", DenialKind::Empty);
}

#[test]
fn test_parse_failure_denied() {
    assert_denied("SELEC id FROM", DenialKind::ParseFailure);
}

#[test]
fn test_set_denied() {
    assert_denied("SET search_path TO evil", DenialKind::Unrecognized);
}
