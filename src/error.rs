//! Error taxonomy for the sync pipeline, plus the `Outcome` type used at
//! every best-effort step.
//!
//! Only `StoreNotFound`, `StoreUnreadable`, `SchemaUnsupported` and `Config`
//! abort a run. Everything else is attached to a degraded value and handled
//! at the call site.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Mail database not found under {0}. Is Mail configured?")]
    StoreNotFound(PathBuf),

    #[error("Cannot read mail database {path}: {source}. Grant Full Disk Access to the terminal.")]
    StoreUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Mail database is locked: {0}")]
    TransientLock(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Could not find conversation_id or thread_id column in messages table")]
    SchemaUnsupported,

    #[error("File index traversal exceeded {0:?}")]
    TraversalTimeout(Duration),

    #[error("File index traversal failed: {0}")]
    TraversalError(String),

    #[error("No raw message file indexed for message {0}")]
    MissingRawFile(i64),

    #[error("Malformed message {path}: {reason}")]
    MalformedMessage { path: PathBuf, reason: String },

    #[error("No attachment file for message {message_id}, attachment {attachment_id}")]
    MissingAttachmentFile {
        message_id: i64,
        attachment_id: String,
    },

    #[error("Failed to copy attachment {path}: {source}")]
    AttachmentCopyFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    DocumentWriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl SyncError {
    /// Whether this error ends the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::StoreNotFound(_)
                | SyncError::StoreUnreadable { .. }
                | SyncError::SchemaUnsupported
                | SyncError::Config { .. }
        )
    }
}

/// Result of a best-effort step: either the real value, or a fallback value
/// together with the reason it had to be used.
#[derive(Debug)]
pub enum Outcome<T> {
    Complete(T),
    Degraded { value: T, reason: SyncError },
}

impl<T> Outcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&SyncError> {
        match self {
            Outcome::Complete(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Complete(value) | Outcome::Degraded { value, .. } => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::SchemaUnsupported.is_fatal());
        assert!(SyncError::StoreNotFound(PathBuf::from("/x")).is_fatal());
        assert!(!SyncError::MissingRawFile(7).is_fatal());
        assert!(!SyncError::TraversalTimeout(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok: Outcome<Vec<u8>> = Outcome::Complete(vec![1]);
        assert!(!ok.is_degraded());
        assert!(ok.reason().is_none());
        assert_eq!(ok.into_value(), vec![1]);

        let degraded: Outcome<Vec<u8>> = Outcome::Degraded {
            value: Vec::new(),
            reason: SyncError::TransientLock("database is locked".to_string()),
        };
        assert!(degraded.is_degraded());
        assert!(degraded.value().is_empty());
        assert!(matches!(
            degraded.reason(),
            Some(SyncError::TransientLock(_))
        ));
    }
}
