//! Shared test fixtures and helpers.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use mailmirror::config::Settings;
use mailmirror::sync::body::MimeBodyExtractor;
use mailmirror::sync::cursor::Cursor;
use mailmirror::sync::{SyncReport, sync_store};

/// 2025-02-10 10:00:00 UTC
pub const T0: i64 = 1_739_181_600;

pub const INBOX: i64 = 1;
pub const SENT: i64 = 2;
pub const JUNK: i64 = 3;

pub const TO: i64 = 0;
pub const CC: i64 = 1;
pub const BCC: i64 = 2;

const SUPPORT_TABLES: &str = "
    CREATE TABLE mailboxes (ROWID INTEGER PRIMARY KEY, url TEXT);
    CREATE TABLE subjects (ROWID INTEGER PRIMARY KEY, subject TEXT);
    CREATE TABLE summaries (ROWID INTEGER PRIMARY KEY, summary TEXT);
    CREATE TABLE addresses (ROWID INTEGER PRIMARY KEY, address TEXT, comment TEXT);
    CREATE TABLE recipients (
        ROWID INTEGER PRIMARY KEY, message INTEGER, type INTEGER,
        address INTEGER, position INTEGER
    );
    CREATE TABLE attachments (
        ROWID INTEGER PRIMARY KEY, message INTEGER, attachment_id TEXT, name TEXT
    );
    INSERT INTO mailboxes (ROWID, url) VALUES
        (1, 'imap://me@mail.example.com/INBOX'),
        (2, 'imap://me@mail.example.com/Sent%20Messages'),
        (3, 'imap://me@mail.example.com/Junk');
";

/// Cursor at the given unix time.
pub fn cursor_at(ts: i64) -> Cursor {
    Cursor::new(Utc.timestamp_opt(ts, 0).unwrap())
}

/// A message row to insert, with chainable overrides.
#[derive(Debug, Clone)]
pub struct Msg {
    pub id: i64,
    pub thread: i64,
    pub date: i64,
    pub subject: Option<String>,
    pub sender: String,
    pub sender_name: String,
    pub summary: Option<String>,
    pub mailbox: i64,
    pub deleted: bool,
}

impl Msg {
    pub fn new(id: i64, thread: i64, date: i64) -> Self {
        Msg {
            id,
            thread,
            date,
            subject: Some("Lunch".to_string()),
            sender: "a@x.com".to_string(),
            sender_name: String::new(),
            summary: None,
            mailbox: INBOX,
            deleted: false,
        }
    }

    pub fn subject(mut self, subject: Option<&str>) -> Self {
        self.subject = subject.map(str::to_string);
        self
    }

    pub fn sender(mut self, address: &str, name: &str) -> Self {
        self.sender = address.to_string();
        self.sender_name = name.to_string();
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn mailbox(mut self, mailbox: i64) -> Self {
        self.mailbox = mailbox;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// A temporary Apple Mail layout: `V10/MailData/Envelope Index` plus the
/// directories raw messages and attachments live in.
pub struct MailFixture {
    pub tmp: TempDir,
    pub mail_root: PathBuf,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    thread_column: String,
    conn: Connection,
}

impl MailFixture {
    /// Store whose messages table groups threads by `conversation_id`.
    pub fn new() -> Self {
        Self::with_thread_column("conversation_id")
    }

    pub fn with_thread_column(column: &str) -> Self {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let mail_root = tmp.path().join("Mail");
        let mail_data = mail_root.join("V10").join("MailData");
        std::fs::create_dir_all(&mail_data).unwrap();
        let db_path = mail_data.join("Envelope Index");

        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE messages (
                ROWID INTEGER PRIMARY KEY, {column} INTEGER, subject INTEGER,
                sender INTEGER, date_received INTEGER, summary INTEGER,
                list_id_hash INTEGER, automated_conversation INTEGER,
                deleted INTEGER DEFAULT 0, mailbox INTEGER
            );
            {SUPPORT_TABLES}"
        ))
        .unwrap();

        MailFixture {
            output_dir: tmp.path().join("out"),
            state_file: tmp.path().join("state").join("last_sync"),
            tmp,
            mail_root,
            db_path,
            thread_column: column.to_string(),
            conn,
        }
    }

    /// Settings pointing at this fixture, with a short lock retry delay.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::with_paths(
            self.mail_root.clone(),
            self.output_dir.clone(),
            self.state_file.clone(),
        );
        settings.lock_retry_delay = Duration::from_millis(50);
        settings
    }

    pub fn sync(&self, since: Cursor) -> SyncReport {
        self.sync_with(&self.settings(), since)
    }

    pub fn sync_with(&self, settings: &Settings, since: Cursor) -> SyncReport {
        sync_store(&self.db_path, settings, &MimeBodyExtractor, since).expect("sync failed")
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn insert_address(&self, address: &str, name: &str) -> i64 {
        self.conn
            .execute(
                "INSERT INTO addresses (address, comment) VALUES (?1, ?2)",
                params![address, name],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    fn insert_text(&self, table: &str, column: &str, value: &str) -> i64 {
        self.conn
            .execute(
                &format!("INSERT INTO {table} ({column}) VALUES (?1)"),
                params![value],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn add_message(&self, msg: &Msg) {
        let subject = msg
            .subject
            .as_deref()
            .map(|s| self.insert_text("subjects", "subject", s));
        let summary = msg
            .summary
            .as_deref()
            .map(|s| self.insert_text("summaries", "summary", s));
        let sender = self.insert_address(&msg.sender, &msg.sender_name);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO messages
                     (ROWID, {}, subject, sender, date_received, summary,
                      list_id_hash, automated_conversation, deleted, mailbox)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8)",
                    self.thread_column
                ),
                params![
                    msg.id,
                    msg.thread,
                    subject,
                    sender,
                    msg.date,
                    summary,
                    msg.deleted as i64,
                    msg.mailbox
                ],
            )
            .unwrap();
    }

    pub fn set_flags(&self, message_id: i64, mailing_list: bool, automated: bool) {
        self.conn
            .execute(
                "UPDATE messages SET list_id_hash = ?1, automated_conversation = ?2 WHERE ROWID = ?3",
                params![mailing_list as i64, automated as i64, message_id],
            )
            .unwrap();
    }

    pub fn add_recipient(&self, message_id: i64, role: i64, address: &str, name: &str) {
        let addr = self.insert_address(address, name);
        self.conn
            .execute(
                "INSERT INTO recipients (message, type, address, position)
                 VALUES (?1, ?2, ?3, (SELECT COUNT(*) FROM recipients WHERE message = ?1))",
                params![message_id, role, addr],
            )
            .unwrap();
    }

    pub fn add_attachment(&self, message_id: i64, attachment_id: &str, name: &str) {
        self.conn
            .execute(
                "INSERT INTO attachments (message, attachment_id, name) VALUES (?1, ?2, ?3)",
                params![message_id, attachment_id, name],
            )
            .unwrap();
    }

    fn mailbox_dir(&self) -> PathBuf {
        self.mail_root.join("V10").join("ACCOUNT-1").join("INBOX.mbox")
    }

    /// Write `<id>.emlx` (or any other file name) wrapping `payload`.
    pub fn write_emlx(&self, file_name: &str, payload: &str) -> PathBuf {
        let dir = self.mailbox_dir().join("Data").join("Messages");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        std::fs::write(&path, emlx(payload)).unwrap();
        path
    }

    pub fn write_attachment(
        &self,
        message_id: i64,
        attachment_id: &str,
        file_name: &str,
        content: &[u8],
    ) -> PathBuf {
        let dir = self
            .mailbox_dir()
            .join("Attachments")
            .join(message_id.to_string())
            .join(attachment_id);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn document_path(&self, thread_id: i64) -> PathBuf {
        self.output_dir.join(format!("{thread_id}.md"))
    }

    pub fn document(&self, thread_id: i64) -> String {
        std::fs::read_to_string(self.document_path(thread_id)).expect("document not written")
    }

    pub fn attachment_path(&self, thread_id: i64, name: &str) -> PathBuf {
        self.output_dir
            .join("attachments")
            .join(thread_id.to_string())
            .join(name)
    }
}

/// `.emlx` framing: byte count line, payload, trailing plist.
pub fn emlx(payload: &str) -> String {
    format!(
        "{}\n{}<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\"><dict/></plist>\n",
        payload.len(),
        payload
    )
}

/// A single-part plain text message.
pub fn plain_message(body: &str) -> String {
    format!(
        "From: a@x.com\r\nTo: b@x.com\r\nSubject: Lunch\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
    )
}

/// A single-part HTML message.
pub fn html_message(html: &str) -> String {
    format!(
        "From: a@x.com\r\nTo: b@x.com\r\nSubject: Lunch\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{html}\r\n"
    )
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
