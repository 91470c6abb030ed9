//! MySQL / MariaDB backend.
//!
//! Wraps a single `mysql_async` connection driven by a current-thread tokio
//! runtime. Every trait call blocks on one statement; there is no pool and
//! no reconnect, so a dropped connection surfaces as
//! [`FixError::Connection`] and ends the run.

use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Params, Row, Value};
use tokio::runtime::Runtime;

use crate::db::{like_pattern, quote_identifier, CandidateRow, ColumnInfo, Database, KeyValue};
use crate::util::mysql::ConnectionConfig;
use crate::FixError;

pub struct MysqlDatabase {
    runtime: Runtime,
    conn: Option<Conn>,
}

/// Build driver options from connection settings.
pub fn to_opts(config: &ConnectionConfig) -> OptsBuilder {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(config.host.as_deref().unwrap_or("localhost"))
        .tcp_port(config.port.unwrap_or(3306))
        .user(config.user.as_deref());

    if let Some(ref pw) = config.password {
        builder = builder.pass(Some(pw));
    }
    if let Some(ref db) = config.database {
        builder = builder.db_name(Some(db));
    }
    if let Some(ref sock) = config.socket {
        builder = builder.socket(Some(sock));
    }

    builder
}

impl MysqlDatabase {
    /// Open the connection used for the whole run.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, FixError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| FixError::Io(format!("Cannot create async runtime: {}", e)))?;

        tracing::info!(url = %config.display_url(), "connecting");
        let conn = runtime
            .block_on(Conn::new(to_opts(config)))
            .map_err(|e| FixError::Connection(e.to_string()))?;

        Ok(MysqlDatabase {
            runtime,
            conn: Some(conn),
        })
    }

    fn conn(&mut self) -> Result<(&Runtime, &mut Conn), FixError> {
        match self.conn.as_mut() {
            Some(conn) => Ok((&self.runtime, conn)),
            None => Err(FixError::Connection("connection already closed".to_string())),
        }
    }
}

impl Drop for MysqlDatabase {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.disconnect()).ok();
        }
    }
}

/// Network and protocol failures end the run as connection errors;
/// everything else is reported through `other`.
fn classify(err: mysql_async::Error, other: impl FnOnce(String) -> FixError) -> FixError {
    match err {
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => {
            FixError::Connection(err.to_string())
        }
        _ => other(err.to_string()),
    }
}

fn key_value(value: Value) -> KeyValue {
    match value {
        Value::NULL => KeyValue::Null,
        Value::Int(v) => KeyValue::Int(v),
        Value::UInt(v) => KeyValue::UInt(v),
        Value::Float(v) => KeyValue::Float(f64::from(v)),
        Value::Double(v) => KeyValue::Float(v),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => KeyValue::Text(s),
            Err(e) => KeyValue::Bytes(e.into_bytes()),
        },
        Value::Date(y, mo, d, h, mi, s, us) => {
            let mut text = format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s);
            if us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            KeyValue::Text(text)
        }
        Value::Time(neg, days, h, mi, s, us) => {
            let hours = days * 24 + u32::from(h);
            let mut text = format!("{}{:02}:{:02}:{:02}", if neg { "-" } else { "" }, hours, mi, s);
            if us > 0 {
                text.push_str(&format!(".{:06}", us));
            }
            KeyValue::Text(text)
        }
    }
}

fn sql_value(value: &KeyValue) -> Value {
    match value {
        KeyValue::Null => Value::NULL,
        KeyValue::Int(v) => Value::Int(*v),
        KeyValue::UInt(v) => Value::UInt(*v),
        KeyValue::Float(v) => Value::Double(*v),
        KeyValue::Text(v) => Value::Bytes(v.clone().into_bytes()),
        KeyValue::Bytes(v) => Value::Bytes(v.clone()),
    }
}

/// Pre-filter statement: key columns then `column`, one `LIKE` placeholder.
pub fn select_sql(table: &str, column: &str, primary_key: &[String]) -> String {
    let mut select: Vec<String> = primary_key.iter().map(|k| quote_identifier(k)).collect();
    select.push(quote_identifier(column));
    format!(
        "SELECT {} FROM {} WHERE LOWER({}) LIKE ?",
        select.join(", "),
        quote_identifier(table),
        quote_identifier(column)
    )
}

/// Keyed update statement: the new value first, then one placeholder per
/// key column, AND-combined. Refuses an empty key.
pub fn update_sql(table: &str, column: &str, primary_key: &[&str]) -> Result<String, FixError> {
    if primary_key.is_empty() {
        return Err(FixError::Query(format!(
            "refusing to update {} without a primary key",
            table
        )));
    }
    let predicate = primary_key
        .iter()
        .map(|k| format!("{} = ?", quote_identifier(k)))
        .collect::<Vec<_>>()
        .join(" AND ");
    Ok(format!(
        "UPDATE {} SET {} = ? WHERE {}",
        quote_identifier(table),
        quote_identifier(column),
        predicate
    ))
}

/// Key columns holding floats. Equality on `FLOAT` columns is unreliable.
fn float_key_columns(primary_key: &[(String, KeyValue)]) -> impl Iterator<Item = &str> {
    primary_key
        .iter()
        .filter(|(_, v)| matches!(v, KeyValue::Float(_)))
        .map(|(k, _)| k.as_str())
}

impl Database for MysqlDatabase {
    fn list_tables(&mut self) -> Result<Vec<String>, FixError> {
        let sql = "SELECT TABLE_NAME FROM information_schema.TABLES \
                   WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                   ORDER BY TABLE_NAME";
        tracing::debug!(sql, "listing tables");
        let (rt, conn) = self.conn()?;
        rt.block_on(conn.query::<String, _>(sql))
            .map_err(|e| classify(e, |m| FixError::TableAccess {
                table: "*".to_string(),
                message: m,
            }))
    }

    fn describe_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, FixError> {
        let sql = "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_KEY FROM information_schema.COLUMNS \
                   WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                   ORDER BY ORDINAL_POSITION";
        tracing::debug!(sql, table, "describing table");
        let (rt, conn) = self.conn()?;
        let rows: Vec<(String, String, String)> = rt
            .block_on(conn.exec(sql, (table,)))
            .map_err(|e| classify(e, |m| FixError::TableAccess {
                table: table.to_string(),
                message: m,
            }))?;
        Ok(rows
            .into_iter()
            .map(|(name, data_type, key)| ColumnInfo {
                name,
                data_type,
                primary_key: key.eq_ignore_ascii_case("PRI"),
            })
            .collect())
    }

    fn select_candidates(
        &mut self,
        table: &str,
        column: &str,
        primary_key: &[String],
        needle: &str,
    ) -> Result<Vec<CandidateRow>, FixError> {
        let sql = select_sql(table, column, primary_key);
        let pattern = like_pattern(&needle.to_lowercase());
        tracing::debug!(%sql, %pattern, "selecting candidates");

        let (rt, conn) = self.conn()?;
        let rows: Vec<Row> = rt
            .block_on(conn.exec(sql.as_str(), (pattern,)))
            .map_err(|e| classify(e, FixError::Query))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = row.unwrap();
            let content = match values.pop() {
                Some(Value::Bytes(bytes)) => bytes,
                Some(Value::NULL) | None => continue,
                Some(other) => other.as_sql(false).into_bytes(),
            };
            let key = primary_key
                .iter()
                .cloned()
                .zip(values.into_iter().map(key_value))
                .collect();
            candidates.push(CandidateRow {
                primary_key: key,
                content,
            });
        }
        Ok(candidates)
    }

    fn update_row(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        primary_key: &[(String, KeyValue)],
    ) -> Result<u64, FixError> {
        let columns: Vec<&str> = primary_key.iter().map(|(k, _)| k.as_str()).collect();
        let sql = update_sql(table, column, &columns)?;
        for key in float_key_columns(primary_key) {
            tracing::warn!(
                table,
                column = key,
                "floating-point primary key used in an equality match; the row may not be found"
            );
        }
        let mut params = Vec::with_capacity(primary_key.len() + 1);
        params.push(Value::Bytes(value.as_bytes().to_vec()));
        params.extend(primary_key.iter().map(|(_, v)| sql_value(v)));
        tracing::debug!(%sql, "updating row");

        let (rt, conn) = self.conn()?;
        rt.block_on(conn.exec_drop(sql.as_str(), Params::Positional(params)))
            .map_err(|e| classify(e, FixError::Query))?;
        Ok(conn.affected_rows())
    }
}
