//! In-process [`Database`] backend.
//!
//! Tables are vectors of rows keyed by column name. Every update issued
//! through the trait is logged so callers can check exactly which
//! statements the pipeline would have sent to a real server.

use std::collections::HashMap;

use crate::db::{CandidateRow, ColumnInfo, Database, KeyValue};
use crate::FixError;

/// One `update_row` call as received.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub table: String,
    pub column: String,
    pub value: String,
    pub primary_key: Vec<(String, KeyValue)>,
    pub affected: u64,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnInfo>,
    rows: Vec<HashMap<String, KeyValue>>,
}

/// Tables held in memory, listed in creation order.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Vec<(String, MemoryTable)>,
    updates: Vec<UpdateRecord>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given columns.
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnInfo>) {
        let table = MemoryTable {
            columns,
            rows: Vec::new(),
        };
        match self.tables.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = table,
            None => self.tables.push((name.to_string(), table)),
        }
    }

    /// Append a row. Columns left out read as `NULL`.
    ///
    /// # Panics
    ///
    /// Panics if the table has not been created.
    pub fn insert(&mut self, table: &str, values: Vec<(&str, KeyValue)>) {
        let table = self
            .table_mut(table)
            .unwrap_or_else(|| panic!("insert into unknown table {}", table));
        table
            .rows
            .push(values.into_iter().map(|(c, v)| (c.to_string(), v)).collect());
    }

    /// Remove rows matching every key pair, returning how many were removed.
    pub fn delete(&mut self, table: &str, primary_key: &[(String, KeyValue)]) -> usize {
        let Some(table) = self.table_mut(table) else {
            return 0;
        };
        let before = table.rows.len();
        table.rows.retain(|row| !row_matches(row, primary_key));
        before - table.rows.len()
    }

    /// Current value of `column` in the first row matching `primary_key`.
    pub fn value(
        &self,
        table: &str,
        column: &str,
        primary_key: &[(String, KeyValue)],
    ) -> Option<&KeyValue> {
        self.table(table)?
            .rows
            .iter()
            .find(|row| row_matches(row, primary_key))?
            .get(column)
    }

    /// Every update received, in order.
    pub fn updates(&self) -> &[UpdateRecord] {
        &self.updates
    }

    fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut MemoryTable> {
        self.tables
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    fn require(&self, name: &str) -> Result<&MemoryTable, FixError> {
        self.table(name).ok_or_else(|| FixError::TableAccess {
            table: name.to_string(),
            message: "table does not exist".to_string(),
        })
    }
}

fn row_matches(row: &HashMap<String, KeyValue>, primary_key: &[(String, KeyValue)]) -> bool {
    primary_key
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&KeyValue::Null) == value)
}

fn text_of(value: &KeyValue) -> Option<&str> {
    match value {
        KeyValue::Text(s) => Some(s),
        KeyValue::Bytes(b) => std::str::from_utf8(b).ok(),
        _ => None,
    }
}

impl Database for MemoryDatabase {
    fn list_tables(&mut self) -> Result<Vec<String>, FixError> {
        Ok(self.tables.iter().map(|(n, _)| n.clone()).collect())
    }

    fn describe_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, FixError> {
        Ok(self.require(table)?.columns.clone())
    }

    fn select_candidates(
        &mut self,
        table: &str,
        column: &str,
        primary_key: &[String],
        needle: &str,
    ) -> Result<Vec<CandidateRow>, FixError> {
        let needle = needle.to_lowercase();
        let table = self.require(table)?;
        let rows = table
            .rows
            .iter()
            .filter_map(|row| {
                let content = match row.get(column)? {
                    KeyValue::Bytes(b) => b.clone(),
                    other => text_of(other)?.as_bytes().to_vec(),
                };
                if !String::from_utf8_lossy(&content).to_lowercase().contains(&needle) {
                    return None;
                }
                let key = primary_key
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(KeyValue::Null)))
                    .collect();
                Some(CandidateRow {
                    primary_key: key,
                    content,
                })
            })
            .collect();
        Ok(rows)
    }

    fn update_row(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        primary_key: &[(String, KeyValue)],
    ) -> Result<u64, FixError> {
        self.require(table)?;
        let mut affected = 0;
        if let Some(t) = self.table_mut(table) {
            for row in t.rows.iter_mut().filter(|row| row_matches(row, primary_key)) {
                let new_value = KeyValue::Text(value.to_string());
                // Engines only count rows whose value actually changed.
                if row.get(column) != Some(&new_value) {
                    row.insert(column.to_string(), new_value);
                    affected += 1;
                }
            }
        }
        self.updates.push(UpdateRecord {
            table: table.to_string(),
            column: column.to_string(),
            value: value.to_string(),
            primary_key: primary_key.to_vec(),
            affected,
        });
        Ok(affected)
    }
}
