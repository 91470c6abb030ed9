//! Row scanning.
//!
//! For every text column of a table the database is asked for rows that
//! contain the staging host anywhere (a cheap substring filter). Each row is
//! then checked against the precise [`RewriteRule`]; rows that only mention
//! the host without a scheme are dropped here. Surviving rows are rewritten
//! in memory and turned into [`CandidateFix`] records, or into a
//! [`RowFailure`] when the content cannot be rewritten safely.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::db::{format_primary_key, CandidateRow, Database, PrimaryKey, TableDescriptor};
use crate::rewrite::content::rewrite_content;
use crate::rewrite::pattern::RewriteRule;
use crate::rewrite::summary::summarize;
use crate::util::{wprint, wprintln};
use crate::FixError;

/// A row that will be updated once the table is approved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFix {
    pub table: String,
    pub column: String,
    pub primary_key: PrimaryKey,
    pub original_summary: String,
    pub replaced_summary: String,
    #[serde(skip)]
    pub rewritten_content: String,
    pub match_count: usize,
    pub is_serialized: bool,
}

/// A matching row that was left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFailure {
    pub table: String,
    pub column: String,
    pub primary_key: PrimaryKey,
    pub reason: String,
}

impl RowFailure {
    /// `table.column (id=7)` location string.
    pub fn location(&self) -> String {
        format!(
            "{}.{} ({})",
            self.table,
            self.column,
            format_primary_key(&self.primary_key)
        )
    }
}

/// Everything found in one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableScan {
    pub fixes: Vec<CandidateFix>,
    pub failures: Vec<RowFailure>,
}

impl TableScan {
    /// Total replacements across all fixes.
    pub fn replacement_count(&self) -> usize {
        self.fixes.iter().map(|f| f.match_count).sum()
    }

    pub fn has_serialized(&self) -> bool {
        self.fixes.iter().any(|f| f.is_serialized)
    }
}

/// Evaluate one pre-filtered row.
///
/// Returns `None` when the precise rule does not match (a pre-filter false
/// positive), otherwise the fix or the reason the row cannot be fixed.
pub fn scan_row(
    rule: &RewriteRule,
    table: &str,
    column: &str,
    row: CandidateRow,
) -> Option<Result<CandidateFix, RowFailure>> {
    let failure = |primary_key: PrimaryKey, reason: String| RowFailure {
        table: table.to_string(),
        column: column.to_string(),
        primary_key,
        reason,
    };

    let content = match String::from_utf8(row.content) {
        Ok(content) => content,
        Err(e) => {
            if !rule.is_match(&String::from_utf8_lossy(e.as_bytes())) {
                return None;
            }
            return Some(Err(failure(
                row.primary_key,
                "content is not valid UTF-8".to_string(),
            )));
        }
    };

    if !rule.is_match(&content) {
        return None;
    }

    let rewritten = match rewrite_content(rule, &content) {
        Ok(rewritten) => rewritten,
        Err(e) => return Some(Err(failure(row.primary_key, e.to_string()))),
    };
    let summary = summarize(rule, &content);

    Some(Ok(CandidateFix {
        table: table.to_string(),
        column: column.to_string(),
        primary_key: row.primary_key,
        original_summary: summary.before,
        replaced_summary: summary.after,
        rewritten_content: rewritten.content,
        match_count: rewritten.match_count,
        is_serialized: rewritten.serialized,
    }))
}

/// Scan every text column of `descriptor`.
///
/// Progress goes to `writer`: `+` for each fix found, `.` after each
/// column, and an error line for each row that cannot be rewritten.
pub fn scan_table(
    db: &mut dyn Database,
    rule: &RewriteRule,
    descriptor: &TableDescriptor,
    writer: &mut dyn Write,
) -> Result<TableScan, FixError> {
    let mut scan = TableScan::default();

    for column in &descriptor.text_columns {
        let rows = db.select_candidates(
            &descriptor.name,
            column,
            &descriptor.primary_key_columns,
            rule.needle(),
        )?;
        tracing::debug!(table = %descriptor.name, %column, rows = rows.len(), "pre-filter");

        for row in rows {
            match scan_row(rule, &descriptor.name, column, row) {
                None => {}
                Some(Ok(fix)) => {
                    wprint!(writer, "{}", "+".green())?;
                    scan.fixes.push(fix);
                }
                Some(Err(failure)) => {
                    tracing::warn!(location = %failure.location(), reason = %failure.reason, "row excluded");
                    wprintln!(writer)?;
                    wprintln!(
                        writer,
                        "{}",
                        format!(
                            "Table {}, Primary Key {} - {}",
                            failure.table,
                            format_primary_key(&failure.primary_key),
                            failure.reason
                        )
                        .red()
                    )?;
                    scan.failures.push(failure);
                }
            }
        }
        wprint!(writer, "{}", ".".green())?;
    }
    wprintln!(writer)?;

    Ok(scan)
}
