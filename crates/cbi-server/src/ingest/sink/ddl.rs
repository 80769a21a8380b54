//! SQL text for the staging-and-swap table lifecycle
//!
//! Identifiers come from static schemas, but they are still quoted so a
//! column named like a keyword (`suffix`, `ward`) never breaks the statement.

use crate::ingest::schema::DatasetSchema;

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `CREATE TABLE` for `table` with a surrogate key, every schema column and a
/// `UNIQUE` constraint over the natural key.
pub fn create_table_sql(schema: &DatasetSchema, table: &str) -> String {
    let mut definitions = vec!["\"id\" SERIAL PRIMARY KEY".to_string()];
    definitions.extend(
        schema
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(c.name), c.kind.sql_type())),
    );
    definitions.push(format!(
        "UNIQUE ({})",
        schema
            .natural_key
            .iter()
            .map(|k| quote_ident(k))
            .collect::<Vec<_>>()
            .join(", ")
    ));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table),
        definitions.join(",\n    ")
    )
}

/// Drops a serving table. Fails while views depend on it.
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

/// Drops a staging table along with anything built on it.
pub fn drop_staging_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table))
}

/// Positional insert into `table`, one `$n` per column in `columns()` order.
pub fn insert_sql(schema: &DatasetSchema, table: &str) -> String {
    let columns = schema.columns();
    let names = columns
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let params = (1..=columns.len())
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ");

    format!("INSERT INTO {} ({}) VALUES ({})", quote_ident(table), names, params)
}

pub fn rename_table_sql(from: &str, to: &str) -> String {
    format!("ALTER TABLE {} RENAME TO {}", quote_ident(from), quote_ident(to))
}
