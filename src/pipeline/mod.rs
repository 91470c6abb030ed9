//! The scan, review, confirm and update pipeline.
//!
//! [`run`] processes tables one at a time, in the order given or in catalog
//! order:
//!
//! 1. describe the table (text columns, primary key)
//! 2. [`scan::scan_table`] every text column
//! 3. print the before/after review ([`report::print_table_scan`])
//! 4. pass the table through the [`gate::Gate`]
//! 5. [`update::apply_fixes`] when approved
//!
//! A table without a primary key is scanned and reviewed but never reaches
//! step 4. Results accumulate in a [`report::RunResult`] which is printed at
//! the end.

pub mod gate;
pub mod report;
pub mod scan;
pub mod update;

use std::io::Write;

use colored::Colorize;

use crate::db::{self, Database};
use crate::pipeline::gate::{Gate, Prompt};
use crate::pipeline::report::RunResult;
use crate::rewrite::pattern::{RewriteRule, TargetSpec};
use crate::util::wprintln;
use crate::FixError;

/// Everything the pipeline needs besides the connection.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: TargetSpec,
    /// Tables to scan; empty means every table in the database.
    pub tables: Vec<String>,
    /// Update without asking.
    pub auto_confirm: bool,
}

/// Run the whole pipeline against `db`.
///
/// Fatal errors (connection loss, inaccessible table, failed statement)
/// abort immediately; updates already issued stay applied.
pub fn run(
    config: &RunConfig,
    db: &mut dyn Database,
    prompt: &mut dyn Prompt,
    writer: &mut dyn Write,
) -> Result<RunResult, FixError> {
    let rule = RewriteRule::new(&config.target)?;
    let host = config.target.host();
    let mut result = RunResult::default();

    if config.auto_confirm {
        wprintln!(
            writer,
            "This script will auto-run and update the database without any confirmation messages"
        )?;
    } else {
        let scope = if config.tables.is_empty() {
            "all database tables".to_string()
        } else {
            format!("database table/s {}", config.tables.join(", "))
        };
        let question = format!(
            "Do you want to continue scanning {} for links starting with http(s)://{}?",
            scope, host
        );
        if !prompt.confirm(&question)? {
            result.scan_declined = true;
            return Ok(result);
        }
    }

    let tables = db::resolve_tables(db, &config.tables)?;
    tracing::info!(count = tables.len(), "tables to check");

    for table in &tables {
        process_table(config, &rule, db, prompt, writer, table, &mut result)?;
    }

    report::print_summary(writer, &result)?;
    Ok(result)
}

fn process_table(
    config: &RunConfig,
    rule: &RewriteRule,
    db: &mut dyn Database,
    prompt: &mut dyn Prompt,
    writer: &mut dyn Write,
    table: &str,
    result: &mut RunResult,
) -> Result<(), FixError> {
    wprintln!(writer)?;
    wprintln!(
        writer,
        "Checking table {} for links starting with http(s)://{}",
        table,
        config.target.host()
    )?;
    tracing::info!(table, "checking table");

    let descriptor = db::describe_table(db, table)?;
    if !descriptor.has_primary_key() {
        wprintln!(
            writer,
            "Cannot replace content in {} since there is no primary key set for this table",
            table
        )?;
        result.record_missing_primary_key(table);
    }

    let scan = scan::scan_table(db, rule, &descriptor, writer)?;
    result.row_failures.extend(scan.failures.iter().cloned());

    if scan.fixes.is_empty() {
        wprintln!(writer, "No records found that need fixing")?;
        return Ok(());
    }

    report::print_table_scan(writer, table, &scan)?;

    if !descriptor.has_primary_key() {
        return Ok(());
    }

    let mut gate = Gate::new();
    gate.open(config.auto_confirm);
    let question = format!(
        "Do you want me to replace all content in {}? ({} records, {} replacements)",
        table,
        scan.fixes.len(),
        scan.replacement_count()
    );
    if !gate.resolve(prompt, &question)? {
        wprintln!(writer, "Skipping this table")?;
        result.record_skipped(table);
        return Ok(());
    }

    let affected = update::apply_fixes(db, &scan.fixes)?;
    result.record_updated(table, affected);
    wprintln!(writer, "{}", format!("Updated {} rows", affected).green())?;
    tracing::info!(table, affected, "table updated");
    Ok(())
}
