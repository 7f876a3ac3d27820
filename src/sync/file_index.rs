//! One-pass index of `.emlx` files and attachment files under the mail root.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{Outcome, SyncError};

const ATTACHMENTS_DIR: &str = "Attachments";
const RAW_EXTENSION: &str = ".emlx";

#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    raw_messages: HashMap<i64, PathBuf>,
    attachments: HashMap<(i64, String), PathBuf>,
}

impl FileIndex {
    pub fn raw_message(&self, message_id: i64) -> Option<&Path> {
        self.raw_messages.get(&message_id).map(PathBuf::as_path)
    }

    pub fn attachment(&self, message_id: i64, attachment_id: &str) -> Option<&Path> {
        self.attachments
            .get(&(message_id, attachment_id.to_string()))
            .map(PathBuf::as_path)
    }

    pub fn raw_message_count(&self) -> usize {
        self.raw_messages.len()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// File `path` (found at `relative` below the root) into whichever map
    /// it belongs to. Paths of any other shape are ignored.
    fn record(&mut self, path: &Path, relative: &Path) {
        let segments: Vec<&OsStr> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s),
                _ => None,
            })
            .collect();

        if let Some(pos) = segments.iter().rposition(|s| *s == ATTACHMENTS_DIR) {
            // .../Attachments/<message-id>/<attachment-id>/<filename>
            let tail = &segments[pos + 1..];
            if tail.len() == 3 {
                let ids = (tail[0].to_str().and_then(numeric_id), tail[1].to_str());
                if let (Some(mid), Some(att_id)) = ids {
                    self.attachments
                        .insert((mid, att_id.to_string()), path.to_path_buf());
                }
            }
            return;
        }

        let Some(name) = path.file_name().and_then(OsStr::to_str) else {
            return;
        };
        if !name.ends_with(RAW_EXTENSION) {
            return;
        }
        let Some(mid) = name.split('.').next().and_then(numeric_id) else {
            return;
        };
        self.insert_raw(mid, path);
    }

    /// `12.emlx` and `12.partial.emlx` share an id; the shorter file name
    /// (the full message) wins. This is a naming heuristic, not a content
    /// check.
    fn insert_raw(&mut self, mid: i64, path: &Path) {
        let name_len = |p: &Path| p.file_name().map(OsStr::len).unwrap_or(usize::MAX);
        let keep_existing = self
            .raw_messages
            .get(&mid)
            .is_some_and(|existing| name_len(existing.as_path()) <= name_len(path));
        if !keep_existing {
            self.raw_messages.insert(mid, path.to_path_buf());
        }
    }
}

fn numeric_id(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Walk `root` once, within `timeout`. Any traversal error or running out
/// of time yields an empty index.
pub fn build_file_index(root: &Path, timeout: Duration) -> Outcome<FileIndex> {
    let deadline = Instant::now() + timeout;
    let mut index = FileIndex::default();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        if Instant::now() >= deadline {
            warn!("Indexing {} timed out after {:?}", root.display(), timeout);
            return Outcome::Degraded {
                value: FileIndex::default(),
                reason: SyncError::TraversalTimeout(timeout),
            };
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Indexing {} failed: {}", root.display(), e);
                return Outcome::Degraded {
                    value: FileIndex::default(),
                    reason: SyncError::TraversalError(e.to_string()),
                };
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        index.record(entry.path(), relative);
    }

    info!(
        "Indexed {} raw message(s), {} attachment(s)",
        index.raw_message_count(),
        index.attachment_count()
    );
    Outcome::Complete(index)
}
