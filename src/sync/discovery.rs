//! Thread-grouping column resolution and changed-thread discovery.

use rusqlite::types::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use super::cursor::Cursor;
use super::query::QueryGateway;
use crate::error::SyncError;

/// Which `messages` column groups messages into threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadColumn {
    ConversationId,
    ThreadId,
}

impl ThreadColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            ThreadColumn::ConversationId => "conversation_id",
            ThreadColumn::ThreadId => "thread_id",
        }
    }

    /// Pick the grouping column from the `messages` column names.
    /// `conversation_id` wins when both exist.
    pub fn from_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let columns: HashSet<&str> = columns.into_iter().collect();
        if columns.contains("conversation_id") {
            Some(ThreadColumn::ConversationId)
        } else if columns.contains("thread_id") {
            Some(ThreadColumn::ThreadId)
        } else {
            None
        }
    }
}

/// Inspect the schema once per run.
pub fn discover_thread_column(gw: &QueryGateway) -> Result<ThreadColumn, SyncError> {
    let rows = gw.query("PRAGMA table_info(messages)", &[]).into_value();
    let names: Vec<String> = rows.iter().filter_map(|r| r.text("name")).collect();
    let column = ThreadColumn::from_columns(names.iter().map(String::as_str))
        .ok_or(SyncError::SchemaUnsupported)?;
    debug!("Grouping threads by messages.{}", column.as_sql());
    Ok(column)
}

/// Distinct thread ids with a non-deleted, in-scope message newer than
/// `since`, at most `max_threads` of them.
pub fn find_changed_threads(
    gw: &QueryGateway,
    column: ThreadColumn,
    since: &Cursor,
    mailbox_patterns: &[String],
    max_threads: u32,
) -> Vec<i64> {
    if mailbox_patterns.is_empty() {
        return Vec::new();
    }
    let col = column.as_sql();
    let url_filter = vec!["url LIKE ?"; mailbox_patterns.len()].join(" OR ");
    let sql = format!(
        "SELECT DISTINCT m.{col} AS tid
         FROM messages m
         WHERE m.date_received > ?
           AND m.deleted = 0
           AND m.{col} IS NOT NULL
           AND m.mailbox IN (SELECT ROWID FROM mailboxes WHERE {url_filter})
         LIMIT ?"
    );

    let mut params = Vec::with_capacity(mailbox_patterns.len() + 2);
    params.push(Value::Integer(since.timestamp()));
    params.extend(mailbox_patterns.iter().cloned().map(Value::Text));
    params.push(Value::Integer(i64::from(max_threads)));

    let ids: Vec<i64> = gw
        .query(&sql, &params)
        .into_value()
        .iter()
        .filter_map(|r| r.int("tid"))
        .collect();
    info!("Found {} changed thread(s)", ids.len());
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_conversation_id() {
        assert_eq!(
            ThreadColumn::from_columns(["ROWID", "thread_id", "conversation_id"]),
            Some(ThreadColumn::ConversationId)
        );
    }

    #[test]
    fn test_falls_back_to_thread_id() {
        assert_eq!(
            ThreadColumn::from_columns(["ROWID", "thread_id"]),
            Some(ThreadColumn::ThreadId)
        );
    }

    #[test]
    fn test_no_grouping_column() {
        assert_eq!(ThreadColumn::from_columns(["ROWID", "subject"]), None);
        assert_eq!(ThreadColumn::from_columns(Vec::<&str>::new()), None);
    }
}
