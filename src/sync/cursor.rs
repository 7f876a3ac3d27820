//! Sync watermark: the instant through which the store has been mirrored.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    pub fn new(at: DateTime<Utc>) -> Self {
        Cursor(at)
    }

    /// First-run cursor: `lookback_days` before now.
    pub fn lookback(days: u32) -> Self {
        let now = Utc::now();
        Cursor(
            now.checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// The cursor to persist after a run ending at `now`. Never moves back.
    pub fn advance_to(self, now: DateTime<Utc>) -> Cursor {
        Cursor(self.0.max(now))
    }

    /// Parse RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Cursor(dt.with_timezone(&Utc)));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|naive| Cursor(naive.and_utc()))
    }

    pub fn to_iso(&self) -> String {
        self.0.format(FORMAT).to_string()
    }
}

/// Single-file persistence for the cursor.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CursorStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved cursor. Absent or corrupt state counts as a first run.
    pub fn load(&self, default_lookback_days: u32) -> Cursor {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => match Cursor::parse(&text) {
                Some(cursor) => return cursor,
                None => warn!(
                    "Ignoring unreadable sync state in {}: {:?}",
                    self.path.display(),
                    text.trim()
                ),
            },
            Err(e) => debug!("No sync state at {}: {}", self.path.display(), e),
        }
        Cursor::lookback(default_lookback_days)
    }

    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(&self.path, cursor.to_iso())
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
