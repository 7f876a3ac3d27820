//! Copy a thread's attachment files into the output tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::file_index::FileIndex;
use super::types::{
    AssembledThread, AttachmentListing, AttachmentMeta, Availability, MaterializedAttachment,
};
use crate::error::SyncError;

const UNNAMED: &str = "unnamed";

/// Reduce a declared file name to one safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .replace('\0', "");
    if base.is_empty() || base == "." || base == ".." {
        UNNAMED.to_string()
    } else {
        base
    }
}

/// Picks collision-free destination names within one thread. Names are
/// compared case-insensitively, as on the default macOS volume format.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    /// `name`, else `<message-id>_name`, else `<message-id>_<n>_name`.
    pub fn allocate(&mut self, message_id: i64, name: &str) -> String {
        let mut candidate = name.to_string();
        if self.is_taken(&candidate) {
            candidate = format!("{}_{}", message_id, name);
        }
        let mut n = 2;
        while self.is_taken(&candidate) {
            candidate = format!("{}_{}_{}", message_id, n, name);
            n += 1;
        }
        self.used.insert(candidate.to_lowercase());
        candidate
    }

    fn is_taken(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }
}

/// Copy bytes, permissions and timestamps.
fn copy_with_metadata(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::copy(source, dest)?;
    let meta = std::fs::metadata(source)?;
    let atime = filetime::FileTime::from_last_access_time(&meta);
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dest, atime, mtime)
}

/// Resolve and copy every declared attachment of a thread into
/// `<output>/attachments/<thread-id>/`.
pub fn materialize_attachments(
    thread: &AssembledThread,
    index: &FileIndex,
    output_dir: &Path,
) -> AttachmentListing {
    let dest_dir = crate::resolve::thread_attachments_dir(output_dir, thread.id);
    let mut names = NameAllocator::default();
    let mut listing = AttachmentListing::new();

    for msg in &thread.messages {
        let Some(declared) = thread.attachments.get(&msg.id) else {
            continue;
        };
        let results = declared
            .iter()
            .map(|att| materialize_one(msg.id, att, index, &dest_dir, &mut names))
            .collect();
        listing.insert(msg.id, results);
    }
    listing
}

fn materialize_one(
    message_id: i64,
    att: &AttachmentMeta,
    index: &FileIndex,
    dest_dir: &Path,
    names: &mut NameAllocator,
) -> MaterializedAttachment {
    let name = sanitize_filename(&att.name);
    let unavailable = |reason: SyncError| {
        debug!("Attachment {} unavailable: {}", att.name, reason);
        MaterializedAttachment {
            display_name: name.clone(),
            availability: Availability::Unavailable(reason),
        }
    };

    let source = match index.attachment(message_id, &att.attachment_id) {
        Some(p) if p.is_file() => p,
        _ => {
            return unavailable(SyncError::MissingAttachmentFile {
                message_id,
                attachment_id: att.attachment_id.clone(),
            });
        }
    };

    let dest_name = names.allocate(message_id, &name);
    let dest: PathBuf = dest_dir.join(&dest_name);
    let copied = std::fs::create_dir_all(dest_dir).and_then(|_| copy_with_metadata(source, &dest));
    match copied {
        Ok(()) => MaterializedAttachment {
            display_name: dest_name,
            availability: Availability::Available(dest),
        },
        Err(source_err) => {
            warn!("Failed to copy {}: {}", source.display(), source_err);
            unavailable(SyncError::AttachmentCopyFailure {
                path: source.to_path_buf(),
                source: source_err,
            })
        }
    }
}
