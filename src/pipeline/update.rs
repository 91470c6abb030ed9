//! Batch update of approved fixes.

use crate::db::{format_primary_key, Database};
use crate::pipeline::scan::CandidateFix;
use crate::FixError;

/// Write every fix back, keyed by its primary key, and return the number of
/// rows the database reports as affected.
///
/// A fix without a primary key is never written; an `UPDATE` without a
/// predicate would hit every row in the table. Statements are not wrapped in
/// a transaction.
pub fn apply_fixes(db: &mut dyn Database, fixes: &[CandidateFix]) -> Result<u64, FixError> {
    let mut affected = 0;
    for fix in fixes {
        if fix.primary_key.is_empty() {
            tracing::warn!(table = %fix.table, column = %fix.column, "fix without primary key not applied");
            continue;
        }
        let n = db.update_row(&fix.table, &fix.column, &fix.rewritten_content, &fix.primary_key)?;
        if n == 0 {
            tracing::info!(
                table = %fix.table,
                key = %format_primary_key(&fix.primary_key),
                "update matched no changed rows"
            );
        }
        affected += n;
    }
    Ok(affected)
}
