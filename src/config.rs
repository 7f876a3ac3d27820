//! App-level config for mailmirror.
//!
//! Reads {user_config_dir}/mailmirror/config.toml. Every key is optional;
//! a missing file yields the defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::resolve;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_MAX_THREADS: u32 = 500;
pub const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOCK_RETRY_DELAY_MS: u64 = 2000;

/// Mailbox URL patterns (SQL LIKE) that count as inbox/sent.
pub fn default_mailbox_patterns() -> Vec<String> {
    vec![
        "%/Inbox%".to_string(),
        "%/INBOX%".to_string(),
        "%/Sent%".to_string(),
    ]
}

/// Raw shape of config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub mail_root: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub state_file: Option<String>,
    #[serde(default)]
    pub mailbox_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub max_threads: Option<u32>,
    #[serde(default)]
    pub lookback_days: Option<u32>,
    #[serde(default)]
    pub index_timeout_secs: Option<u64>,
    #[serde(default)]
    pub lock_retry_delay_ms: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mail_root: PathBuf,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    pub mailbox_patterns: Vec<String>,
    pub max_threads: u32,
    pub lookback_days: u32,
    pub index_timeout: Duration,
    pub lock_retry_delay: Duration,
}

impl Settings {
    /// Defaults rooted at the given directories, used by tests and embedders.
    pub fn with_paths(mail_root: PathBuf, output_dir: PathBuf, state_file: PathBuf) -> Self {
        Settings {
            mail_root,
            output_dir,
            state_file,
            mailbox_patterns: default_mailbox_patterns(),
            max_threads: DEFAULT_MAX_THREADS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            index_timeout: Duration::from_secs(DEFAULT_INDEX_TIMEOUT_SECS),
            lock_retry_delay: Duration::from_millis(DEFAULT_LOCK_RETRY_DELAY_MS),
        }
    }

    /// Apply config-file values, then environment overrides.
    pub fn from_file(file: ConfigFile) -> Self {
        let pick = |env: &str, value: Option<String>, default: fn() -> PathBuf| {
            resolve::env_path(env)
                .or_else(|| value.map(|v| resolve::expand_tilde(&v)))
                .unwrap_or_else(default)
        };
        let mut settings = Settings::with_paths(
            pick(resolve::ENV_MAIL_ROOT, file.mail_root, resolve::default_mail_root),
            pick(resolve::ENV_OUTPUT, file.output_dir, resolve::default_output_dir),
            pick(resolve::ENV_STATE, file.state_file, resolve::default_state_file),
        );
        if let Some(patterns) = file.mailbox_patterns.filter(|p| !p.is_empty()) {
            settings.mailbox_patterns = patterns;
        }
        if let Some(n) = file.max_threads {
            settings.max_threads = n;
        }
        if let Some(days) = file.lookback_days {
            settings.lookback_days = days;
        }
        if let Some(secs) = file.index_timeout_secs {
            settings.index_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.lock_retry_delay_ms {
            settings.lock_retry_delay = Duration::from_millis(ms);
        }
        settings
    }
}

/// Return the OS-native mailmirror config directory.
pub fn app_config_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "mailmirror") {
        proj_dirs.config_dir().to_path_buf()
    } else {
        resolve::home_dir().join(".config").join("mailmirror")
    }
}

/// Return the path to config.toml.
pub fn app_config_path() -> PathBuf {
    app_config_dir().join("config.toml")
}

/// Parse config.toml text.
pub fn parse(content: &str, path: &Path) -> Result<ConfigFile, SyncError> {
    toml::from_str(content).map_err(|e| SyncError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load settings from the given config path (or the default location).
///
/// A missing file is not an error; an unparseable one is.
pub fn load(path: Option<&Path>) -> Result<Settings, SyncError> {
    let path = path.map(PathBuf::from).unwrap_or_else(app_config_path);
    if !path.exists() {
        return Ok(Settings::from_file(ConfigFile::default()));
    }
    let content = std::fs::read_to_string(&path).map_err(|e| SyncError::Config {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(Settings::from_file(parse(&content, &path)?))
}
