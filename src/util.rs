use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Format an address as `Name <addr>`, or whichever part is non-empty.
pub fn format_address(name: &str, address: &str) -> String {
    let name = name.trim();
    let address = address.trim();
    match (name.is_empty(), address.is_empty()) {
        (false, false) => format!("{} <{}>", name, address),
        (true, _) => address.to_string(),
        (false, true) => name.to_string(),
    }
}

/// Render a Unix timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn unix_to_readable(ts: Option<i64>) -> String {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| readable(&dt))
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn readable(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Characters escaped in a link path segment. `(`, `)`, `<` and `>` are
/// added because they end a Markdown link target.
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'(')
    .add(b')')
    .add(b'<')
    .add(b'>')
    .add(b'\\');

/// Relative link from `<thread-id>.md` to one of its copied attachments.
pub fn attachment_link(thread_id: i64, file_name: &str) -> String {
    format!(
        "attachments/{}/{}",
        thread_id,
        utf8_percent_encode(file_name, LINK_SEGMENT)
    )
}

/// Escape text placed inside `[...]` of a Markdown link.
pub fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fold line breaks and runs of whitespace into single spaces.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_address_both() {
        assert_eq!(
            format_address("Alice", "alice@example.com"),
            "Alice <alice@example.com>"
        );
    }

    #[test]
    fn test_format_address_partial() {
        assert_eq!(format_address("", "a@x.com"), "a@x.com");
        assert_eq!(format_address("  Bob ", ""), "Bob");
        assert_eq!(format_address("", ""), "");
    }

    #[test]
    fn test_unix_to_readable() {
        assert_eq!(unix_to_readable(Some(0)), "1970-01-01 00:00:00 UTC");
        assert_eq!(
            unix_to_readable(Some(1_739_181_600)),
            "2025-02-10 10:00:00 UTC"
        );
        assert_eq!(unix_to_readable(None), "Unknown");
    }

    #[test]
    fn test_attachment_link_escapes_spaces_and_parens() {
        assert_eq!(
            attachment_link(1, "Q3 report (final).pdf"),
            "attachments/1/Q3%20report%20%28final%29.pdf"
        );
    }

    #[test]
    fn test_attachment_link_escapes_fragment_and_percent() {
        assert_eq!(
            attachment_link(7, "Invoice #5.pdf"),
            "attachments/7/Invoice%20%235.pdf"
        );
        assert_eq!(attachment_link(7, "100%.pdf"), "attachments/7/100%25.pdf");
        assert_eq!(attachment_link(7, "a?b[1].txt"), "attachments/7/a%3Fb%5B1%5D.txt");
    }

    #[test]
    fn test_attachment_link_encodes_non_ascii() {
        assert_eq!(attachment_link(3, "caf\u{e9}.txt"), "attachments/3/caf%C3%A9.txt");
    }

    #[test]
    fn test_escape_link_text() {
        assert_eq!(escape_link_text("notes [draft].txt"), "notes \\[draft\\].txt");
        assert_eq!(escape_link_text("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("Re: lunch\r\n  on Friday"), "Re: lunch on Friday");
        assert_eq!(single_line("  "), "");
    }
}
