//! Staging URL cleanup for database content.
//!
//! The `fix-staging-urls` crate (library name `fixurls`) scans the text
//! columns of a relational database for absolute links that point at a
//! staging host and rewrites them into root-relative paths. Content that was
//! written with PHP's `serialize()` is decoded, rewritten leaf by leaf and
//! re-encoded so that byte-length prefixes stay valid.
//!
//! # CLI Reference
//!
//! ```text
//! fix-urls staging.example.com                      # scan every table
//! fix-urls staging.example.com exp_channel_data     # scan one table
//! fix-urls staging.example.com wp_posts \
//!     --base-path-remove /sites/default/files/ --base-path-replace /files/
//! fix-urls staging.example.com --auto-confirm yes   # no prompts (cron)
//! ```
//!
//! Missing credentials are read from a MySQL defaults file (`~/.my.cnf`)
//! and then prompted for interactively.
//!
//! # Library API
//!
//! The pipeline only depends on the [`db::Database`] trait, so it can run
//! against the bundled MySQL backend or any other implementation:
//!
//! ```no_run
//! use fixurls::db::memory::MemoryDatabase;
//! use fixurls::pipeline::{self, RunConfig};
//! use fixurls::pipeline::gate::AutoApprove;
//! use fixurls::rewrite::pattern::TargetSpec;
//!
//! let target = TargetSpec::new("staging.example.com", None, None).unwrap();
//! let config = RunConfig { target, tables: vec![], auto_confirm: true };
//! let mut db = MemoryDatabase::new();
//! let mut out = Vec::new();
//! let result = pipeline::run(&config, &mut db, &mut AutoApprove, &mut out).unwrap();
//! println!("{:?}", result.rows_updated);
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`rewrite::pattern`] | Match/replace rule built from the staging host and base-path remap |
//! | [`rewrite::serial`] | PHP `serialize()` decoder/encoder |
//! | [`rewrite::content`] | Plain vs. serialized rewrite of a single column value |
//! | [`rewrite::summary`] | Before/after context snippets for review |
//! | [`db`] | Database trait, schema introspection, MySQL and in-memory backends |
//! | [`pipeline`] | Scan, confirm, update and report stages |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | The `fix-urls` binary and interactive prompts |
//! | `mysql` | on | MySQL/MariaDB backend via `mysql_async` + `tokio` |

#[cfg(feature = "cli")]
pub mod cli;
pub mod db;
pub mod pipeline;
pub mod rewrite;
pub mod util;

use thiserror::Error;

/// Errors that abort a run.
///
/// Problems confined to a single row (an unsupported serialized payload)
/// are not represented here; see [`pipeline::scan::RowFailure`].
#[derive(Error, Debug)]
pub enum FixError {
    /// Invalid invocation: bad host format, half of a base-path pair, unknown engine.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database connection could not be opened or was lost.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A table could not be listed or described.
    #[error("Cannot access table {table}: {message}")]
    TableAccess { table: String, message: String },

    /// A SELECT or UPDATE statement failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Terminal or output I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl FixError {
    /// Process exit status for this error.
    ///
    /// Configuration problems and connection failures get distinct codes so
    /// wrapper scripts can tell them apart from a successful run.
    pub fn exit_code(&self) -> i32 {
        match self {
            FixError::Config(_) => 2,
            FixError::Connection(_) => 3,
            FixError::TableAccess { .. } | FixError::Query(_) | FixError::Io(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(FixError::Config("x".into()).exit_code(), 2);
        assert_eq!(FixError::Connection("x".into()).exit_code(), 3);
        assert_eq!(
            FixError::TableAccess {
                table: "t".into(),
                message: "gone".into()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_table_access_message() {
        let err = FixError::TableAccess {
            table: "pages".into(),
            message: "does not exist".into(),
        };
        assert_eq!(err.to_string(), "Cannot access table pages: does not exist");
    }
}
