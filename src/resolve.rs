//! Path resolution for the mail store, output tree and sync state.
//!
//! Resolution order for each path:
//!   1. MAILMIRROR_* environment variable
//!   2. config.toml value
//!   3. built-in default under the home directory

use std::path::{Path, PathBuf};

use crate::error::SyncError;

pub const ENV_MAIL_ROOT: &str = "MAILMIRROR_MAIL_ROOT";
pub const ENV_OUTPUT: &str = "MAILMIRROR_OUTPUT";
pub const ENV_STATE: &str = "MAILMIRROR_STATE";

/// Return a non-empty environment variable as a path.
pub fn env_path(var: &str) -> Option<PathBuf> {
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => Some(expand_tilde(&v)),
        _ => None,
    }
}

// --- Defaults ---

pub fn default_mail_root() -> PathBuf {
    home_dir().join("Library").join("Mail")
}

pub fn default_output_dir() -> PathBuf {
    home_dir().join(".cache/fit/basecamp/apple_mail")
}

pub fn default_state_file() -> PathBuf {
    home_dir().join(".cache/fit/basecamp/state/apple_mail_last_sync")
}

// --- Derived helpers: output paths ---

pub fn attachments_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("attachments")
}

pub fn thread_attachments_dir(output_dir: &Path, thread_id: i64) -> PathBuf {
    attachments_dir(output_dir).join(thread_id.to_string())
}

pub fn thread_document(output_dir: &Path, thread_id: i64) -> PathBuf {
    output_dir.join(format!("{}.md", thread_id))
}

// --- Store location ---

/// Find `V<n>/MailData/Envelope Index` under the mail root.
///
/// The highest numeric version wins, so V10 is preferred over V9.
pub fn locate_store(mail_root: &Path) -> Result<PathBuf, SyncError> {
    let pattern = format!(
        "{}/V*/MailData/Envelope Index",
        glob::Pattern::escape(&mail_root.to_string_lossy())
    );

    let mut candidates: Vec<(u32, PathBuf)> = glob::glob(&pattern)
        .map_err(|_| SyncError::StoreNotFound(mail_root.to_path_buf()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| store_version(&path).map(|v| (v, path)))
        .collect();
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let (_, db) = candidates
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::StoreNotFound(mail_root.to_path_buf()))?;

    // Opening for read surfaces permission problems before any query runs.
    std::fs::File::open(&db).map_err(|source| SyncError::StoreUnreadable {
        path: db.clone(),
        source,
    })?;
    Ok(db)
}

/// Numeric version of `.../V<n>/MailData/Envelope Index`.
fn store_version(db: &Path) -> Option<u32> {
    let version_dir = db.parent()?.parent()?.file_name()?.to_str()?;
    version_dir.strip_prefix('V')?.parse().ok()
}

/// Get the user's home directory.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Expand ~ to home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else if path == "~" {
        home_dir()
    } else {
        PathBuf::from(path)
    }
}
