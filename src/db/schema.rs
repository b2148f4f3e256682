//! SQL generated from entity mappings.
//! SQLite dialect; identifiers are always double-quoted.

use crate::db::mapping::{EntityModel, SqlType};

/// Table names compare like SQLite identifiers, case-insensitively.
pub const SQLITE_TABLE_EXISTS: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE";

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` for the mapped table.
/// - integer keys become `INTEGER PRIMARY KEY` (rowid alias)
/// - other keys get an explicit `NOT NULL`, which SQLite does not imply
pub fn create_table_sql(model: &EntityModel) -> String {
    let key_idx = model.key_index();
    let columns = model
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mut def = format!("    {} {}", quote_ident(&c.column), c.sql_type.as_sql());
            if Some(i) == key_idx {
                def.push_str(" PRIMARY KEY");
                if c.sql_type != SqlType::Integer {
                    def.push_str(" NOT NULL");
                }
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_ident(model.table()),
        columns
    )
}

fn column_list(model: &EntityModel) -> String {
    model
        .columns()
        .iter()
        .map(|c| quote_ident(&c.column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn key_ident(model: &EntityModel) -> String {
    model
        .key_column()
        .map(|c| quote_ident(&c.column))
        .unwrap_or_default()
}

pub fn insert_sql(model: &EntityModel) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(model.table()),
        column_list(model),
        placeholders(model.columns().len())
    )
}

/// Insert that leaves an existing row with the same key untouched.
pub fn insert_seed_sql(model: &EntityModel) -> String {
    format!(
        "{} ON CONFLICT({}) DO NOTHING",
        insert_sql(model),
        key_ident(model)
    )
}

/// Columns are aliased to attribute names so rows decode by attribute.
pub fn select_sql(model: &EntityModel) -> String {
    let columns = model
        .columns()
        .iter()
        .map(|c| format!("{} AS {}", quote_ident(&c.column), quote_ident(c.attribute)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", columns, quote_ident(model.table()))
}

pub fn select_all_sql(model: &EntityModel) -> String {
    format!("{} ORDER BY {}", select_sql(model), key_ident(model))
}

pub fn select_by_key_sql(model: &EntityModel) -> String {
    format!("{} WHERE {} = ?", select_sql(model), key_ident(model))
}

/// `None` when the entity has no attribute besides its key.
pub fn update_sql(model: &EntityModel) -> Option<String> {
    let key_idx = model.key_index();
    let assignments = model
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != key_idx)
        .map(|(_, c)| format!("{} = ?", quote_ident(&c.column)))
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        return None;
    }
    Some(format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(model.table()),
        assignments.join(", "),
        key_ident(model)
    ))
}

pub fn delete_sql(model: &EntityModel) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_ident(model.table()),
        key_ident(model)
    )
}

pub fn count_sql(model: &EntityModel) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(model.table()))
}
