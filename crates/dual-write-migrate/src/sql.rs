//! SQL text generation for validation and repair.
//!
//! Statement shapes are fixed here, in one place, and built once per
//! validator/fixer instance. All statements use `$n` placeholders and
//! double-quoted identifiers; the same text is sent to both stores, so the
//! schema and dialect are assumed to match on both sides.

/// Quote an identifier for use in generated statements.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholder_list(count: usize) -> String {
    (1..=count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Query for one full row at a given scan position.
///
/// Used by the base→target scan to walk the base store one row at a time in
/// ascending id order. Parameter: `$1` = offset.
pub fn select_row_at_query(table: &str, id_column: &str, columns: &[&str]) -> String {
    format!(
        "SELECT {cols} FROM {table} ORDER BY {id} LIMIT 1 OFFSET $1",
        cols = column_list(columns),
        table = quote_ident(table),
        id = quote_ident(id_column),
    )
}

/// Point lookup of one full row by id. Parameter: `$1` = id.
pub fn select_by_id_query(table: &str, id_column: &str, columns: &[&str]) -> String {
    format!(
        "SELECT {cols} FROM {table} WHERE {id} = $1",
        cols = column_list(columns),
        table = quote_ident(table),
        id = quote_ident(id_column),
    )
}

/// Query for one id-only page, ordered ascending.
///
/// Used by the target→base scan, which only needs to detect omissions and
/// projects just the identifier column. Parameters: `$1` = limit,
/// `$2` = offset.
pub fn select_id_page_query(table: &str, id_column: &str) -> String {
    format!(
        "SELECT {id} FROM {table} ORDER BY {id} LIMIT $1 OFFSET $2",
        table = quote_ident(table),
        id = quote_ident(id_column),
    )
}

/// Existence probe for a batch of ids. Parameters: `$1..$n` = ids.
pub fn select_ids_in_query(table: &str, id_column: &str, count: usize) -> String {
    format!(
        "SELECT {id} FROM {table} WHERE {id} IN ({placeholders})",
        table = quote_ident(table),
        id = quote_ident(id_column),
        placeholders = placeholder_list(count),
    )
}

/// Upsert of a full row keyed on the id column.
///
/// Insert-or-update in a single statement so the repair path needs no
/// duplicate existence lookup. Parameters: `$1..$n` = values in column order.
pub fn upsert_query(table: &str, id_column: &str, columns: &[&str]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .filter(|c| **c != id_column)
        .map(|c| format!("{col} = EXCLUDED.{col}", col = quote_ident(c)))
        .collect();

    let conflict_action = if assignments.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", assignments.join(", "))
    };

    format!(
        "INSERT INTO {table} ({cols}) VALUES ({placeholders}) ON CONFLICT ({id}) {action}",
        table = quote_ident(table),
        cols = column_list(columns),
        placeholders = placeholder_list(columns.len()),
        id = quote_ident(id_column),
        action = conflict_action,
    )
}

/// Delete of one row by id. Parameter: `$1` = id.
pub fn delete_by_id_query(table: &str, id_column: &str) -> String {
    format!(
        "DELETE FROM {table} WHERE {id} = $1",
        table = quote_ident(table),
        id = quote_ident(id_column),
    )
}
