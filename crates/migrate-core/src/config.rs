use std::{env, path::PathBuf, time::Duration};

use chrono::NaiveDate;
use directories::{BaseDirs, ProjectDirs};

pub const QUALIFIER: &str = "com";
pub const ORGANIZATION: &str = "onenote2notion";
pub const APPLICATION: &str = "migrate";

const LEGACY_APP_DIR: &str = ".onenote2notion";
const STATE_FILE: &str = "state.json";

pub const STATE_PATH_ENV: &str = "ON2N_STATE";
pub const DATABASE_ID_ENV: &str = "NOTION_DATABASE_ID";
pub const APPEND_DELAY_ENV: &str = "ON2N_APPEND_DELAY_MS";

pub fn config_root() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).map(|p| p.config_dir().to_path_buf())
}

pub fn legacy_config_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = BaseDirs::new().map(|b| b.home_dir().to_path_buf()) {
        roots.push(home.join(LEGACY_APP_DIR));
    }
    roots
}

/// Where the idempotency state lives when nothing overrides it.
///
/// An existing legacy state file wins over the platform config dir so runs
/// started with older tooling keep their history.
pub fn default_state_path() -> PathBuf {
    if let Some(path) = env::var_os(STATE_PATH_ENV) {
        return PathBuf::from(path);
    }
    for legacy in legacy_config_roots() {
        let candidate = legacy.join(STATE_FILE);
        if candidate.exists() {
            return candidate;
        }
    }
    config_root()
        .map(|root| root.join(STATE_FILE))
        .unwrap_or_else(|| PathBuf::from(STATE_FILE))
}

/// Structural limits of the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_span_chars: usize,
    pub max_block_chars: usize,
    pub max_spans_per_block: usize,
    pub max_blocks_per_document: usize,
    pub max_create_children: usize,
    pub append_batch: usize,
    pub max_list_depth: usize,
    pub max_link_scan_depth: usize,
    pub max_section_group_depth: usize,
    pub max_upload_bytes: usize,
    pub max_title_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_span_chars: 2000,
            max_block_chars: 2000,
            max_spans_per_block: 100,
            max_blocks_per_document: 150,
            max_create_children: 100,
            append_batch: 50,
            max_list_depth: 3,
            max_link_scan_depth: 4,
            max_section_group_depth: 5,
            max_upload_bytes: 20 * 1024 * 1024,
            max_title_chars: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookSelector {
    Id(String),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub site_url: String,
    pub database_id: String,
    pub notebook: Option<NotebookSelector>,
    pub section: Option<String>,
    /// Only pages modified on or after this date are listed.
    pub since: Option<NaiveDate>,
    pub dry_run: bool,
    pub skip_unchanged: bool,
    pub append_delay: Duration,
    pub state_path: PathBuf,
    pub limits: Limits,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            database_id: String::new(),
            notebook: None,
            section: None,
            since: None,
            dry_run: false,
            skip_unchanged: true,
            append_delay: Duration::from_millis(120),
            state_path: default_state_path(),
            limits: Limits::default(),
        }
    }
}

impl MigrationConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(db) = env::var(DATABASE_ID_ENV) {
            config.database_id = db;
        }
        if let Some(delay) = env::var(APPEND_DELAY_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.append_delay = Duration::from_millis(delay);
        }
        config
    }
}
