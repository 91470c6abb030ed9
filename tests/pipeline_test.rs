//! Integration tests for the scan/confirm/update pipeline.
//!
//! Each test builds an in-memory database, runs [`pipeline::run`] against it
//! with a scripted prompt, and checks both the returned result and the
//! statements that reached the database.

use std::collections::VecDeque;

use fixurls::db::memory::MemoryDatabase;
use fixurls::db::{ColumnInfo, KeyValue};
use fixurls::pipeline::gate::{AutoApprove, Prompt};
use fixurls::pipeline::report::RunResult;
use fixurls::pipeline::{self, RunConfig};
use fixurls::rewrite::pattern::TargetSpec;
use fixurls::FixError;

const HOST: &str = "staging.example.com";

/// Prompt that replays canned answers and records every question.
struct Scripted {
    answers: VecDeque<bool>,
    asked: Vec<String>,
}

impl Scripted {
    fn new(answers: &[bool]) -> Self {
        Scripted {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompt for Scripted {
    fn confirm(&mut self, question: &str) -> Result<bool, FixError> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

fn config(auto_confirm: bool) -> RunConfig {
    RunConfig {
        target: TargetSpec::new(HOST, None, None).unwrap(),
        tables: vec![],
        auto_confirm,
    }
}

fn key(id: i64) -> Vec<(String, KeyValue)> {
    vec![("id".to_string(), KeyValue::Int(id))]
}

/// `pages(id PK, body varchar)` with one staging link at id=7.
fn pages_db() -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "pages",
        vec![
            ColumnInfo::new("id", "int", true),
            ColumnInfo::new("body", "varchar", false),
        ],
    );
    db.insert(
        "pages",
        vec![
            ("id", KeyValue::Int(7)),
            ("body", r#"<img src="http://staging.example.com/a.jpg">"#.into()),
        ],
    );
    db
}

fn run(
    config: &RunConfig,
    db: &mut MemoryDatabase,
    prompt: &mut dyn Prompt,
) -> (RunResult, String) {
    colored::control::set_override(false);
    let mut out = Vec::new();
    let result = pipeline::run(config, db, prompt, &mut out).unwrap();
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn auto_confirm_rewrites_single_row() {
    let mut db = pages_db();
    let (result, output) = run(&config(true), &mut db, &mut AutoApprove);

    assert_eq!(result.rows_updated.len(), 1);
    assert_eq!(result.rows_updated["pages"], 1);
    assert!(result.skipped_tables.is_empty());
    assert!(result.tables_without_primary_key.is_empty());

    assert_eq!(db.updates().len(), 1);
    assert_eq!(db.updates()[0].value, r#"<img src="/a.jpg">"#);
    assert_eq!(
        db.value("pages", "body", &key(7)),
        Some(&KeyValue::from(r#"<img src="/a.jpg">"#))
    );
    assert!(output.contains("In pages.body (id=7)"));
    assert!(output.contains("Updated 1 rows in pages"));
}

#[test]
fn declined_table_is_skipped() {
    let mut db = pages_db();
    // Yes to start scanning, no to the table update.
    let mut prompt = Scripted::new(&[true, false]);
    let (result, output) = run(&config(false), &mut db, &mut prompt);

    assert_eq!(result.skipped_tables, vec!["pages"]);
    assert!(result.rows_updated.is_empty());
    assert!(db.updates().is_empty());
    assert_eq!(prompt.asked.len(), 2);
    assert!(prompt.asked[1].contains("pages"));
    assert!(prompt.asked[1].contains("1 records, 1 replacements"));
    assert!(output.contains("Skipping this table"));
}

#[test]
fn declining_initial_scan_touches_nothing() {
    let mut db = pages_db();
    let mut prompt = Scripted::new(&[false]);
    let (result, _) = run(&config(false), &mut db, &mut prompt);

    assert!(result.scan_declined);
    assert!(result.rows_updated.is_empty());
    assert!(db.updates().is_empty());
    assert!(prompt.asked[0].contains("all database tables"));
    assert!(prompt.asked[0].contains("http(s)://staging.example.com"));
}

#[test]
fn table_without_primary_key_is_never_updated() {
    let mut db = pages_db();
    db.create_table("log", vec![ColumnInfo::new("message", "text", false)]);
    db.insert(
        "log",
        vec![("message", "fetched http://staging.example.com/feed".into())],
    );

    let (result, output) = run(&config(true), &mut db, &mut AutoApprove);

    assert_eq!(result.tables_without_primary_key, vec!["log"]);
    assert!(!result.rows_updated.contains_key("log"));
    assert!(db.updates().iter().all(|u| u.table != "log"));
    // Still scanned and reported.
    assert!(output.contains("In log.message ()"));
    assert!(output.contains("Cannot replace content in log"));
}

#[test]
fn explicit_table_list_order_is_respected() {
    let mut db = pages_db();
    db.create_table(
        "posts",
        vec![ColumnInfo::new("id", "int", true), ColumnInfo::new("body", "text", false)],
    );
    let mut cfg = config(true);
    cfg.tables = vec!["posts".to_string(), " pages ".to_string()];

    let (_, output) = run(&cfg, &mut db, &mut AutoApprove);
    let posts_at = output.find("Checking table posts").unwrap();
    let pages_at = output.find("Checking table pages").unwrap();
    assert!(posts_at < pages_at);
}

#[test]
fn table_with_no_matches_gets_no_entry() {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "posts",
        vec![ColumnInfo::new("id", "int", true), ColumnInfo::new("body", "text", false)],
    );
    db.insert("posts", vec![("id", KeyValue::Int(1)), ("body", "visit staging.example.com".into())]);

    let (result, output) = run(&config(true), &mut db, &mut AutoApprove);
    assert!(result.rows_updated.is_empty());
    assert!(output.contains("No records found that need fixing"));
}

#[test]
fn missing_table_is_fatal() {
    let mut db = pages_db();
    let mut cfg = config(true);
    cfg.tables = vec!["nope".to_string()];
    let mut out = Vec::new();
    let err = pipeline::run(&cfg, &mut db, &mut AutoApprove, &mut out).unwrap_err();
    assert!(matches!(err, FixError::TableAccess { ref table, .. } if table == "nope"));
}

#[test]
fn composite_key_update_uses_every_column() {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "i18n",
        vec![
            ColumnInfo::new("id", "int", true),
            ColumnInfo::new("lang", "int", true),
            ColumnInfo::new("body", "mediumtext", false),
        ],
    );
    for lang in 1..=2 {
        db.insert(
            "i18n",
            vec![
                ("id", KeyValue::Int(1)),
                ("lang", KeyValue::Int(lang)),
                ("body", "https://staging.example.com/x".into()),
            ],
        );
    }

    let (result, _) = run(&config(true), &mut db, &mut AutoApprove);
    assert_eq!(result.rows_updated["i18n"], 2);
    for update in db.updates() {
        assert_eq!(update.primary_key.len(), 2);
        assert_eq!(update.affected, 1);
    }
}

#[test]
fn base_path_remap_only_touches_matching_paths() {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "files",
        vec![ColumnInfo::new("id", "int", true), ColumnInfo::new("body", "text", false)],
    );
    db.insert("files", vec![("id", KeyValue::Int(1)), ("body", "http://HOST/files/old/img.jpg".into())]);
    db.insert("files", vec![("id", KeyValue::Int(2)), ("body", "http://HOST/other/img.jpg".into())]);

    let cfg = RunConfig {
        target: TargetSpec::new("HOST", Some("/files/old/"), Some("/new/")).unwrap(),
        tables: vec![],
        auto_confirm: true,
    };
    let (result, _) = run(&cfg, &mut db, &mut AutoApprove);

    assert_eq!(result.rows_updated["files"], 1);
    assert_eq!(db.value("files", "body", &key(1)), Some(&KeyValue::from("/new/img.jpg")));
    assert_eq!(
        db.value("files", "body", &key(2)),
        Some(&KeyValue::from("http://HOST/other/img.jpg"))
    );
}

#[test]
fn unsupported_serialized_row_is_reported_not_updated() {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "options",
        vec![ColumnInfo::new("id", "int", true), ColumnInfo::new("value", "longtext", false)],
    );
    let url = "http://staging.example.com/logo.png";
    db.insert(
        "options",
        vec![("id", KeyValue::Int(4)), ("value", format!("s:{}:\"{}\";", url.len(), url).as_str().into())],
    );
    db.insert(
        "options",
        vec![("id", KeyValue::Int(5)), ("value", "<a href=\"http://staging.example.com/\">home</a>".into())],
    );

    let (result, output) = run(&config(true), &mut db, &mut AutoApprove);

    assert_eq!(result.row_failures.len(), 1);
    assert_eq!(result.row_failures[0].primary_key, key(4));
    assert_eq!(result.rows_updated["options"], 1);
    assert_eq!(db.updates().len(), 1);
    assert!(output.contains("Table options, Primary Key id=4 - cannot rewrite: unsupported serialized shape"));
    assert!(output.contains("Not rewritten: options.value (id=4)"));
}

#[test]
fn rerun_is_a_no_op() {
    let mut db = pages_db();
    run(&config(true), &mut db, &mut AutoApprove);
    let (result, output) = run(&config(true), &mut db, &mut AutoApprove);
    assert!(result.rows_updated.is_empty());
    assert_eq!(db.updates().len(), 1);
    assert!(output.contains("No records found that need fixing"));
}

#[test]
fn summary_lists_tables_in_processing_order() {
    let mut db = pages_db();
    db.create_table(
        "articles",
        vec![ColumnInfo::new("id", "int", true), ColumnInfo::new("body", "text", false)],
    );
    db.insert(
        "articles",
        vec![("id", KeyValue::Int(1)), ("body", "http://staging.example.com/news".into())],
    );
    let mut cfg = config(true);
    cfg.tables = vec!["pages".to_string(), "articles".to_string()];

    let (result, output) = run(&cfg, &mut db, &mut AutoApprove);

    let tables: Vec<&str> = result.rows_updated.iter().map(|(t, _)| t).collect();
    assert_eq!(tables, vec!["pages", "articles"]);
    let pages_at = output.find("Updated 1 rows in pages").unwrap();
    let articles_at = output.find("Updated 1 rows in articles").unwrap();
    assert!(pages_at < articles_at);
}
