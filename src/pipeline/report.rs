//! Run results and console reporting.

use std::io::Write;
use std::ops::Index;

use colored::Colorize;
use serde::{Serialize, Serializer};

use crate::db::format_primary_key;
use crate::pipeline::scan::{RowFailure, TableScan};
use crate::util::wprintln;
use crate::FixError;

/// Per-table row counts in the order tables were processed.
///
/// Serializes as a JSON object whose keys keep that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCounts(Vec<(String, u64)>);

impl TableCounts {
    /// Set the count for `table`, keeping its original position if present.
    pub fn insert(&mut self, table: &str, rows: u64) {
        match self.0.iter_mut().find(|(t, _)| t == table) {
            Some(entry) => entry.1 = rows,
            None => self.0.push((table.to_string(), rows)),
        }
    }

    pub fn get(&self, table: &str) -> Option<u64> {
        self.0.iter().find(|(t, _)| t == table).map(|(_, n)| *n)
    }

    pub fn contains_key(&self, table: &str) -> bool {
        self.get(table).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(t, n)| (t.as_str(), *n))
    }
}

impl Index<&str> for TableCounts {
    type Output = u64;

    /// # Panics
    ///
    /// Panics if `table` has no count.
    fn index(&self, table: &str) -> &u64 {
        self.0
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, n)| n)
            .unwrap_or_else(|| panic!("no row count for table {}", table))
    }
}

impl Serialize for TableCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(t, n)| (t, n)))
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunResult {
    /// Rows updated, per approved table.
    pub rows_updated: TableCounts,
    /// Tables the operator declined to update.
    pub skipped_tables: Vec<String>,
    /// Tables that were scanned but cannot be updated.
    pub tables_without_primary_key: Vec<String>,
    /// Matching rows that were left untouched, with the reason.
    pub row_failures: Vec<RowFailure>,
    /// The operator declined to start scanning.
    pub scan_declined: bool,
}

impl RunResult {
    pub fn record_updated(&mut self, table: &str, rows: u64) {
        self.rows_updated.insert(table, rows);
    }

    pub fn record_skipped(&mut self, table: &str) {
        if !self.skipped_tables.iter().any(|t| t == table) {
            self.skipped_tables.push(table.to_string());
        }
    }

    pub fn record_missing_primary_key(&mut self, table: &str) {
        if !self.tables_without_primary_key.iter().any(|t| t == table) {
            self.tables_without_primary_key.push(table.to_string());
        }
    }

    /// Total rows updated across all tables.
    pub fn total_rows_updated(&self) -> u64 {
        self.rows_updated.iter().map(|(_, n)| n).sum()
    }
}

/// Print each fix of a scanned table for review.
pub fn print_table_scan(writer: &mut dyn Write, table: &str, scan: &TableScan) -> Result<(), FixError> {
    wprintln!(
        writer,
        "{}",
        format!(
            "Found {} records in the database which need fixing",
            scan.fixes.len()
        )
        .yellow()
    )?;
    for fix in &scan.fixes {
        wprintln!(writer)?;
        wprintln!(
            writer,
            "In {}.{} ({})",
            fix.table,
            fix.column,
            format_primary_key(&fix.primary_key)
        )?;
        wprintln!(writer, "Found {} instance/s of the staging URL:", fix.match_count)?;
        wprintln!(writer, "Content: {}", fix.original_summary.red())?;
        wprintln!(writer, "Replacement: {}", fix.replaced_summary.green())?;
        if fix.is_serialized {
            wprintln!(writer, "This data is serialized")?;
        }
    }
    wprintln!(writer)?;
    wprintln!(
        writer,
        "Found {} records with {} replacements in the table {} which need fixing",
        scan.fixes.len(),
        scan.replacement_count(),
        table
    )?;
    Ok(())
}

/// Print the end-of-run summary.
pub fn print_summary(writer: &mut dyn Write, result: &RunResult) -> Result<(), FixError> {
    wprintln!(writer)?;
    for (table, count) in result.rows_updated.iter() {
        wprintln!(writer, "{}", format!("Updated {} rows in {}", count, table).green())?;
    }
    if !result.skipped_tables.is_empty() {
        wprintln!(
            writer,
            "{}",
            format!(
                "You skipped updating the following tables: {}",
                result.skipped_tables.join(", ")
            )
            .green()
        )?;
    }
    for table in &result.tables_without_primary_key {
        wprintln!(
            writer,
            "{}",
            format!(
                "Cannot replace content in {} since there is no primary key set for this table",
                table
            )
            .red()
        )?;
    }
    for failure in &result.row_failures {
        wprintln!(
            writer,
            "{}",
            format!("Not rewritten: {} - {}", failure.location(), failure.reason).red()
        )?;
    }
    wprintln!(writer)?;
    wprintln!(writer, "{}", "All done!".yellow())?;
    Ok(())
}
