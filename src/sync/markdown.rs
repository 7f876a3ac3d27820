//! Thread → Markdown rendering and the atomic document write.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::body::BodyResolver;
use super::types::{AssembledThread, AttachmentListing, Recipient};
use crate::error::SyncError;
use crate::util::{
    attachment_link, escape_link_text, format_address, single_line, unix_to_readable,
};

fn join_recipients(list: &[Recipient]) -> String {
    list.iter()
        .map(|r| format_address(&r.name, &r.address))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Serialize an assembled thread to Markdown.
pub fn thread_to_markdown(
    thread: &AssembledThread,
    bodies: &BodyResolver,
    attachments: &AttachmentListing,
) -> String {
    let mut lines = vec![
        format!("# {}", single_line(thread.subject())),
        String::new(),
        format!("**Thread ID:** {}", thread.id),
        format!("**Message Count:** {}", thread.messages.len()),
    ];
    let flags = thread.flags();
    if !flags.is_empty() {
        lines.push(format!("**Flags:** {}", flags.join(", ")));
    }
    lines.push(String::new());

    for msg in &thread.messages {
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(format!(
            "### From: {}",
            format_address(&msg.sender_name, &msg.sender)
        ));
        lines.push(format!("**Date:** {}", unix_to_readable(msg.date_received)));

        if let Some(recips) = thread.recipients.get(&msg.id) {
            if !recips.to.is_empty() {
                lines.push(format!("**To:** {}", join_recipients(&recips.to)));
            }
            if !recips.cc.is_empty() {
                lines.push(format!("**Cc:** {}", join_recipients(&recips.cc)));
            }
        }
        lines.push(String::new());

        if let Some(body) = bodies.body_for(msg) {
            lines.push(body);
        }
        lines.push(String::new());

        let msg_atts = attachments.get(&msg.id).map(Vec::as_slice).unwrap_or_default();
        if !msg_atts.is_empty() {
            lines.push("**Attachments:**".to_string());
            for att in msg_atts {
                if att.is_available() {
                    lines.push(format!(
                        "- [{}]({})",
                        escape_link_text(&att.display_name),
                        attachment_link(thread.id, &att.display_name)
                    ));
                } else {
                    lines.push(format!("- {} *(not available)*", att.display_name));
                }
            }
            lines.push(String::new());
        }
    }
    lines.join("\n")
}

/// Replace `path` with `content` via a temp file in the same directory, so
/// a failed write leaves the previous document intact.
pub fn write_document(path: &Path, content: &str) -> Result<PathBuf, SyncError> {
    let fail = |source: std::io::Error| SyncError::DocumentWriteFailure {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(fail)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(content.as_bytes()).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(path.to_path_buf())
}
