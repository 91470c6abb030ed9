//! Database access and schema introspection.
//!
//! The pipeline talks to storage exclusively through the [`Database`] trait:
//! list tables, describe columns, run the coarse substring pre-filter, and
//! issue keyed updates. [`mysql::MysqlDatabase`] implements it for
//! MySQL/MariaDB; [`memory::MemoryDatabase`] keeps everything in process.

pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;

use std::fmt;

use serde::Serialize;

use crate::FixError;

/// Declared column types treated as text.
pub const TEXT_TYPES: &[&str] = &["text", "tinytext", "mediumtext", "longtext", "char", "varchar"];

/// A primary-key value as read from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Null => write!(f, "NULL"),
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::UInt(v) => write!(f, "{}", v),
            KeyValue::Float(v) => write!(f, "{}", v),
            KeyValue::Text(v) => write!(f, "{}", v),
            KeyValue::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

/// Ordered `column = value` pairs identifying one row.
pub type PrimaryKey = Vec<(String, KeyValue)>;

/// Render a primary key as `id=7, lang=en`.
pub fn format_primary_key(key: &[(String, KeyValue)]) -> String {
    key.iter()
        .map(|(column, value)| format!("{}={}", column, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Column metadata from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type, e.g. `varchar` or `varchar(255)`.
    pub data_type: String,
    pub primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: &str, data_type: &str, primary_key: bool) -> Self {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            primary_key,
        }
    }
}

/// A row returned by the coarse pre-filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub primary_key: PrimaryKey,
    /// Raw column bytes; not guaranteed to be valid UTF-8.
    pub content: Vec<u8>,
}

/// Storage operations the rewrite pipeline needs.
pub trait Database {
    /// Base tables in catalog order.
    fn list_tables(&mut self) -> Result<Vec<String>, FixError>;

    /// Columns of `table` in ordinal order. An unknown table is an error.
    fn describe_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, FixError>;

    /// Rows whose `column` contains `needle`, compared case-insensitively.
    fn select_candidates(
        &mut self,
        table: &str,
        column: &str,
        primary_key: &[String],
        needle: &str,
    ) -> Result<Vec<CandidateRow>, FixError>;

    /// Set `column` to `value` on the row matching every key pair.
    /// Returns the number of rows the engine reports as affected.
    fn update_row(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        primary_key: &[(String, KeyValue)],
    ) -> Result<u64, FixError>;
}

/// Text-like and primary-key columns of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub text_columns: Vec<String>,
    pub primary_key_columns: Vec<String>,
}

impl TableDescriptor {
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key_columns.is_empty()
    }
}

/// Whether a declared column type counts as text.
///
/// Matching ignores case and any length or modifier suffix, so
/// `VARCHAR(255)` and `char(2) binary` qualify.
pub fn is_text_type(declared: &str) -> bool {
    let base = declared
        .trim()
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or("");
    TEXT_TYPES.iter().any(|t| base.eq_ignore_ascii_case(t))
}

/// Classify the columns of `table`.
pub fn describe_table(db: &mut dyn Database, table: &str) -> Result<TableDescriptor, FixError> {
    let columns = db.describe_columns(table)?;
    if columns.is_empty() {
        return Err(FixError::TableAccess {
            table: table.to_string(),
            message: "table does not exist".to_string(),
        });
    }

    let mut descriptor = TableDescriptor {
        name: table.to_string(),
        text_columns: Vec::new(),
        primary_key_columns: Vec::new(),
    };
    for column in columns {
        if is_text_type(&column.data_type) {
            descriptor.text_columns.push(column.name.clone());
        }
        if column.primary_key {
            descriptor.primary_key_columns.push(column.name);
        }
    }
    tracing::debug!(
        table,
        text_columns = descriptor.text_columns.len(),
        primary_key = ?descriptor.primary_key_columns,
        "described table"
    );
    Ok(descriptor)
}

/// Tables to process: the trimmed explicit list, or every table in the catalog.
pub fn resolve_tables(db: &mut dyn Database, explicit: &[String]) -> Result<Vec<String>, FixError> {
    let named: Vec<String> = explicit
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if !named.is_empty() {
        return Ok(named);
    }
    db.list_tables()
}

/// Back-tick quote an identifier, doubling embedded back-ticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
