//! Sync data types: Message, Recipient, attachments, assembled threads.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::SyncError;

/// One row of the `messages` table with its joins resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub thread_id: i64,
    pub subject: String,
    pub sender: String,
    pub sender_name: String,
    pub date_received: Option<i64>,
    pub summary: String,
    pub mailing_list: bool,
    pub automated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientRole {
    To,
    Cc,
    Bcc,
}

impl RecipientRole {
    /// Decode the store's `recipients.type` column.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(RecipientRole::To),
            1 => Some(RecipientRole::Cc),
            2 => Some(RecipientRole::Bcc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub name: String,
}

/// To/Cc recipients of one message, each in position order. Bcc is never
/// stored here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub to: Vec<Recipient>,
    pub cc: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub attachment_id: String,
    pub name: String,
}

/// A thread as read in one snapshot of the store.
#[derive(Debug, Clone, Default)]
pub struct AssembledThread {
    pub id: i64,
    pub messages: Vec<Message>,
    pub recipients: HashMap<i64, Recipients>,
    pub attachments: HashMap<i64, Vec<AttachmentMeta>>,
}

impl AssembledThread {
    pub fn subject(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.subject.as_str())
            .unwrap_or("(No Subject)")
    }

    /// `mailing-list` / `automated`, in that order, when any message has them.
    pub fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.messages.iter().any(|m| m.mailing_list) {
            flags.push("mailing-list");
        }
        if self.messages.iter().any(|m| m.automated) {
            flags.push("automated");
        }
        flags
    }
}

#[derive(Debug)]
pub enum Availability {
    Available(PathBuf),
    Unavailable(SyncError),
}

/// One attachment as it will be listed in the document.
#[derive(Debug)]
pub struct MaterializedAttachment {
    pub display_name: String,
    pub availability: Availability,
}

impl MaterializedAttachment {
    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Available(_))
    }
}

/// Materialized attachments keyed by owning message id.
pub type AttachmentListing = HashMap<i64, Vec<MaterializedAttachment>>;
