//! Apple Mail sync: mirror threads with new messages into Markdown.

pub mod assemble;
pub mod attachments;
pub mod body;
pub mod cursor;
pub mod discovery;
pub mod file_index;
pub mod markdown;
pub mod query;
pub mod types;

use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{self, Settings};
use crate::error::SyncError;
use crate::resolve;
use crate::util::readable;

use self::assemble::assemble_thread;
use self::attachments::materialize_attachments;
use self::body::{BodyExtractor, BodyResolver, MimeBodyExtractor};
use self::cursor::{Cursor, CursorStore};
use self::discovery::{ThreadColumn, discover_thread_column, find_changed_threads};
use self::file_index::{FileIndex, build_file_index};
use self::markdown::{thread_to_markdown, write_document};
use self::query::QueryGateway;

/// What one run did, and the cursor to persist for the next one.
#[derive(Debug)]
pub struct SyncReport {
    pub since: Cursor,
    pub next_cursor: Cursor,
    pub threads_discovered: usize,
    pub documents_written: usize,
    pub failures: Vec<(i64, SyncError)>,
}

impl SyncReport {
    pub fn summary_lines(&self, output_dir: &Path) -> Vec<String> {
        let mut lines = vec!["Mail sync complete".to_string()];
        if self.threads_discovered == 0 {
            lines.push("Threads processed: 0 (no new messages)".to_string());
        } else {
            lines.push(format!("Threads processed: {}", self.threads_discovered));
            lines.push(format!("New/updated files: {}", self.documents_written));
            if !self.failures.is_empty() {
                let ids: Vec<String> = self.failures.iter().map(|(id, _)| id.to_string()).collect();
                lines.push(format!("Failed threads: {}", ids.join(", ")));
            }
        }
        lines.push(format!("Time range: {} to now", readable(&self.since.instant())));
        lines.push(format!("Output: {}", output_dir.display()));
        lines
    }
}

/// Mirror every thread changed since `since` from the store at `db`.
///
/// Only an unopenable store or an unusable schema is an error; per-thread
/// failures are collected in the report. The report's `next_cursor` is
/// set whenever this returns Ok.
pub fn sync_store(
    db: &Path,
    settings: &Settings,
    extractor: &dyn BodyExtractor,
    since: Cursor,
) -> Result<SyncReport, SyncError> {
    let gw = QueryGateway::open(db, settings.lock_retry_delay)?;
    let column = discover_thread_column(&gw)?;
    let thread_ids = find_changed_threads(
        &gw,
        column,
        &since,
        &settings.mailbox_patterns,
        settings.max_threads,
    );

    let mut report = SyncReport {
        since,
        next_cursor: since,
        threads_discovered: thread_ids.len(),
        documents_written: 0,
        failures: Vec::new(),
    };

    if !thread_ids.is_empty() {
        let index = build_file_index(&settings.mail_root, settings.index_timeout);
        if let Some(reason) = index.reason() {
            warn!("Continuing without raw message files: {}", reason);
        }
        let index = index.into_value();
        let bodies = BodyResolver::new(&index, extractor);

        for &tid in &thread_ids {
            match sync_thread(&gw, column, tid, &index, &bodies, &settings.output_dir) {
                Ok(Some(path)) => {
                    report.documents_written += 1;
                    info!("Wrote {}", path.display());
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Thread {}: {}", tid, e);
                    report.failures.push((tid, e));
                }
            }
        }
    }

    report.next_cursor = since.advance_to(Utc::now());
    Ok(report)
}

/// Assemble, materialize and render one thread. Ok(None) when the thread
/// has no messages left.
fn sync_thread(
    gw: &QueryGateway,
    column: ThreadColumn,
    thread_id: i64,
    index: &FileIndex,
    bodies: &BodyResolver,
    output_dir: &Path,
) -> Result<Option<PathBuf>, SyncError> {
    let Some(thread) = assemble_thread(gw, column, thread_id) else {
        return Ok(None);
    };
    let attachments = materialize_attachments(&thread, index, output_dir);
    let content = thread_to_markdown(&thread, bodies, &attachments);
    write_document(&resolve::thread_document(output_dir, thread_id), &content).map(Some)
}

/// mailmirror sync [--days N]
pub fn run(days: Option<u32>, config_path: Option<&Path>) -> Result<()> {
    let mut settings = config::load(config_path)?;
    if let Some(days) = days {
        settings.lookback_days = days;
    }

    let db = resolve::locate_store(&settings.mail_root)?;
    info!("Using mail database {}", db.display());

    let cursor_store = CursorStore::new(&settings.state_file);
    let since = cursor_store.load(settings.lookback_days);
    info!("Syncing messages received after {}", readable(&since.instant()));

    let report = sync_store(&db, &settings, &MimeBodyExtractor, since)?;

    // A lost cursor only means the next run re-renders some threads.
    if let Err(e) = cursor_store.save(&report.next_cursor) {
        error!("Failed to save sync state: {:#}", e);
    }

    for line in report.summary_lines(&settings.output_dir) {
        println!("{}", line);
    }
    Ok(())
}
