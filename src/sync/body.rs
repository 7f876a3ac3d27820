//! Message body resolution: `.emlx` → MIME text, then the store summary.

use mailparse::{DispositionType, ParsedMail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use super::file_index::FileIndex;
use super::types::Message;
use crate::error::SyncError;

static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<style[^>]*>.*?</style\s*>|<script[^>]*>.*?</script\s*>").unwrap()
});
static BR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?\s*>").unwrap());
static P_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Turns a raw RFC 822 message into its best plain-text body.
pub trait BodyExtractor {
    fn extract(&self, raw: &[u8]) -> Option<String>;
}

/// `mailparse`-backed extractor with an HTML fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeBodyExtractor;

impl BodyExtractor for MimeBodyExtractor {
    fn extract(&self, raw: &[u8]) -> Option<String> {
        match mailparse::parse_mail(raw) {
            Ok(parsed) => best_text(&parsed),
            Err(e) => {
                debug!("MIME parse failed: {}", e);
                None
            }
        }
    }
}

/// A node in a MIME tree.
pub trait MimePart: Sized {
    fn mimetype(&self) -> String;
    fn is_attachment(&self) -> bool;
    fn decoded_text(&self) -> Option<String>;
    fn parts(&self) -> &[Self];
}

impl MimePart for ParsedMail<'_> {
    fn mimetype(&self) -> String {
        self.ctype.mimetype.to_lowercase()
    }

    fn is_attachment(&self) -> bool {
        matches!(
            self.get_content_disposition().disposition,
            DispositionType::Attachment
        )
    }

    fn decoded_text(&self) -> Option<String> {
        self.get_body().ok()
    }

    fn parts(&self) -> &[Self] {
        &self.subparts
    }
}

/// Depth-first walk: the first non-empty text/plain leaf wins; otherwise the
/// first non-empty text/html leaf is converted to text. Attachment parts are
/// skipped.
pub fn best_text<P: MimePart>(root: &P) -> Option<String> {
    let mut html: Option<String> = None;
    let mut stack = vec![root];
    while let Some(part) = stack.pop() {
        let children = part.parts();
        if !children.is_empty() {
            stack.extend(children.iter().rev());
            continue;
        }
        if part.is_attachment() {
            continue;
        }
        match part.mimetype().as_str() {
            "text/plain" => {
                if let Some(text) = part.decoded_text().filter(|t| !t.trim().is_empty()) {
                    return Some(text);
                }
            }
            "text/html" if html.is_none() => {
                html = part.decoded_text().filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }
    html.map(|h| html_to_text(&h)).filter(|t| !t.is_empty())
}

/// Strip HTML down to readable text.
pub fn html_to_text(html: &str) -> String {
    let text = BLOCK_RE.replace_all(html, "");
    let text = BR_RE.replace_all(&text, "\n");
    let text = P_END_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text).replace('\u{a0}', " ");
    let text = SPACES_RE.replace_all(&text, " ");
    let text = NEWLINES_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn malformed(path: &Path, reason: impl Into<String>) -> SyncError {
    SyncError::MalformedMessage {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read the RFC 822 payload of an `.emlx` file.
///
/// The first line holds the payload's byte count; anything after the
/// payload (Mail's property list) is dropped.
pub fn read_emlx(path: &Path) -> Result<Vec<u8>, SyncError> {
    let data = std::fs::read(path).map_err(|e| malformed(path, e.to_string()))?;
    let newline = data
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| malformed(path, "missing byte count line"))?;
    let count: usize = std::str::from_utf8(&data[..newline])
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| malformed(path, "invalid byte count line"))?;
    let payload = &data[newline + 1..];
    Ok(payload[..count.min(payload.len())].to_vec())
}

/// Body lookup for one run: raw file, then summary, then nothing.
pub struct BodyResolver<'a> {
    index: &'a FileIndex,
    extractor: &'a dyn BodyExtractor,
}

impl<'a> BodyResolver<'a> {
    pub fn new(index: &'a FileIndex, extractor: &'a dyn BodyExtractor) -> Self {
        BodyResolver { index, extractor }
    }

    /// Extract from the indexed raw file.
    pub fn raw_body(&self, message_id: i64) -> Result<String, SyncError> {
        let path = self
            .index
            .raw_message(message_id)
            .ok_or(SyncError::MissingRawFile(message_id))?;
        let raw = read_emlx(path)?;
        self.extractor
            .extract(&raw)
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| malformed(path, "no text body"))
    }

    /// The body to render, or None when the section should be omitted.
    pub fn body_for(&self, message: &Message) -> Option<String> {
        match self.raw_body(message.id) {
            Ok(body) => Some(body),
            Err(reason) => {
                debug!("Message {}: {}; using summary", message.id, reason);
                let summary = message.summary.trim();
                (!summary.is_empty()).then(|| summary.to_string())
            }
        }
    }
}
