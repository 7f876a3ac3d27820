//! Thread assembly: one messages query plus one batched recipients query
//! and one batched attachments query per thread, all in one read snapshot.

use rusqlite::types::Value;
use std::collections::HashMap;
use tracing::debug;

use super::discovery::ThreadColumn;
use super::query::{QueryGateway, Row, placeholders};
use super::types::{AssembledThread, AttachmentMeta, Message, Recipient, RecipientRole, Recipients};

/// Assemble a thread, or None when it has no remaining messages.
pub fn assemble_thread(
    gw: &QueryGateway,
    column: ThreadColumn,
    thread_id: i64,
) -> Option<AssembledThread> {
    gw.snapshot(|gw| {
        let messages = fetch_thread_messages(gw, column, thread_id);
        if messages.is_empty() {
            debug!("Thread {} has no messages, skipping", thread_id);
            return None;
        }
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        Some(AssembledThread {
            id: thread_id,
            recipients: fetch_recipients(gw, &ids),
            attachments: fetch_attachments(gw, &ids),
            messages,
        })
    })
}

/// Non-deleted messages of a thread, oldest first.
pub fn fetch_thread_messages(
    gw: &QueryGateway,
    column: ThreadColumn,
    thread_id: i64,
) -> Vec<Message> {
    let col = column.as_sql();
    let sql = format!(
        "SELECT
            m.ROWID AS message_id,
            m.{col} AS thread_id,
            COALESCE(s.subject, '(No Subject)') AS subject,
            COALESCE(a.address, 'Unknown') AS sender,
            COALESCE(a.comment, '') AS sender_name,
            m.date_received AS date_received,
            COALESCE(su.summary, '') AS summary,
            COALESCE(m.list_id_hash, 0) AS list_id_hash,
            COALESCE(m.automated_conversation, 0) AS automated_conversation
         FROM messages m
         LEFT JOIN subjects s ON m.subject = s.ROWID
         LEFT JOIN addresses a ON m.sender = a.ROWID
         LEFT JOIN summaries su ON m.summary = su.ROWID
         WHERE m.{col} = ?
           AND m.deleted = 0
         ORDER BY m.date_received ASC, m.ROWID ASC"
    );
    gw.query(&sql, &[Value::Integer(thread_id)])
        .into_value()
        .iter()
        .filter_map(|row| message_from_row(row, thread_id))
        .collect()
}

fn message_from_row(row: &Row, thread_id: i64) -> Option<Message> {
    Some(Message {
        id: row.int("message_id")?,
        thread_id: row.int("thread_id").unwrap_or(thread_id),
        subject: row.text("subject").unwrap_or_else(|| "(No Subject)".to_string()),
        sender: row.text_or_default("sender"),
        sender_name: row.text_or_default("sender_name"),
        date_received: row.int("date_received"),
        summary: row.text_or_default("summary"),
        mailing_list: row.flag("list_id_hash"),
        automated: row.flag("automated_conversation"),
    })
}

/// To/Cc recipients for all given messages in one query. Bcc rows are
/// dropped here so they can never reach the renderer.
pub fn fetch_recipients(gw: &QueryGateway, message_ids: &[i64]) -> HashMap<i64, Recipients> {
    let mut result: HashMap<i64, Recipients> = HashMap::new();
    if message_ids.is_empty() {
        return result;
    }
    let sql = format!(
        "SELECT
            r.message AS message_id,
            r.type AS role,
            COALESCE(a.address, '') AS address,
            COALESCE(a.comment, '') AS name
         FROM recipients r
         LEFT JOIN addresses a ON r.address = a.ROWID
         WHERE r.message IN ({})
         ORDER BY r.message, r.type, r.position",
        placeholders(message_ids.len())
    );
    let rows = gw.query(&sql, &id_params(message_ids)).into_value();
    for row in &rows {
        let (Some(mid), Some(role)) = (
            row.int("message_id"),
            row.int("role").and_then(RecipientRole::from_code),
        ) else {
            continue;
        };
        let recipient = Recipient {
            address: row.text_or_default("address"),
            name: row.text_or_default("name"),
        };
        let entry = result.entry(mid).or_default();
        match role {
            RecipientRole::To => entry.to.push(recipient),
            RecipientRole::Cc => entry.cc.push(recipient),
            RecipientRole::Bcc => {}
        }
    }
    result
}

/// Attachment metadata for all given messages in one query.
pub fn fetch_attachments(
    gw: &QueryGateway,
    message_ids: &[i64],
) -> HashMap<i64, Vec<AttachmentMeta>> {
    let mut result: HashMap<i64, Vec<AttachmentMeta>> = HashMap::new();
    if message_ids.is_empty() {
        return result;
    }
    let sql = format!(
        "SELECT a.message AS message_id, a.attachment_id AS attachment_id, a.name AS name
         FROM attachments a
         WHERE a.message IN ({})
         ORDER BY a.message, a.ROWID",
        placeholders(message_ids.len())
    );
    let rows = gw.query(&sql, &id_params(message_ids)).into_value();
    for row in &rows {
        let (Some(mid), Some(attachment_id)) = (row.int("message_id"), row.text("attachment_id"))
        else {
            continue;
        };
        result.entry(mid).or_default().push(AttachmentMeta {
            attachment_id,
            name: row.text_or_default("name"),
        });
    }
    result
}

fn id_params(ids: &[i64]) -> Vec<Value> {
    ids.iter().copied().map(Value::Integer).collect()
}
