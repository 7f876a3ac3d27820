//! Read-only query gateway over the mail store's SQLite database.

use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OpenFlags, params_from_iter};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{Outcome, SyncError};

/// One result row: column name → scalar.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: HashMap<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text value; numbers are rendered, NULL and blobs yield None.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(f.to_string()),
            _ => None,
        }
    }

    pub fn text_or_default(&self, column: &str) -> String {
        self.text(column).unwrap_or_default()
    }

    /// Non-zero integer columns are true.
    pub fn flag(&self, column: &str) -> bool {
        self.int(column).is_some_and(|v| v != 0)
    }
}

pub struct QueryGateway {
    conn: Connection,
    retry_delay: Duration,
}

impl QueryGateway {
    /// Open the store read-only. SQLite's own busy handler is disabled so
    /// the single retry in `query` is the only retry.
    pub fn open(db: &Path, retry_delay: Duration) -> Result<Self, SyncError> {
        let unreadable = |e: rusqlite::Error| SyncError::StoreUnreadable {
            path: db.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        };
        let conn = Connection::open_with_flags(
            db,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unreadable)?;
        conn.busy_timeout(Duration::ZERO).map_err(unreadable)?;
        Ok(QueryGateway { conn, retry_delay })
    }

    /// Run a read-only statement.
    ///
    /// A locked/busy failure is retried once after the fixed delay. Any
    /// other failure, or a second failure, yields an empty result.
    pub fn query(&self, sql: &str, params: &[Value]) -> Outcome<Vec<Row>> {
        let first = match self.run(sql, params) {
            Ok(rows) => return Outcome::Complete(rows),
            Err(e) => e,
        };
        if !is_transient(&first) {
            error!("SQLite error: {}", first);
            return Outcome::Degraded {
                value: Vec::new(),
                reason: SyncError::QueryFailed(first.to_string()),
            };
        }

        warn!("Database locked, retrying in {:?}", self.retry_delay);
        std::thread::sleep(self.retry_delay);
        match self.run(sql, params) {
            Ok(rows) => Outcome::Complete(rows),
            Err(e) => {
                error!("SQLite error after retry: {}", e);
                let reason = if is_transient(&e) {
                    SyncError::TransientLock(e.to_string())
                } else {
                    SyncError::QueryFailed(e.to_string())
                };
                Outcome::Degraded {
                    value: Vec::new(),
                    reason,
                }
            }
        }
    }

    /// Run `f` inside a deferred read transaction so every query it makes
    /// sees the same database state.
    pub fn snapshot<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        let tx = match self.conn.unchecked_transaction() {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Could not open read snapshot: {}", e);
                return f(self);
            }
        };
        let out = f(self);
        if let Err(e) = tx.commit() {
            debug!("Ending read snapshot failed: {}", e);
        }
        out
    }

    fn run(&self, sql: &str, params: &[Value]) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut columns = HashMap::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                columns.insert(name.clone(), row.get::<_, Value>(i)?);
            }
            out.push(Row { columns });
        }
        Ok(out)
    }
}

fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// `?, ?, ?` for an IN list of `n` values.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
