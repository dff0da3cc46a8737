use std::path::PathBuf;

use crate::errors::HiveError;

const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/arkadiyt/bounty-targets-data/main/data/wildcards.txt";

/// Runtime configuration, sourced from the environment with sane defaults.
///
/// Every component receives the pieces it needs explicitly; nothing reads
/// the environment after startup.
#[derive(Debug, Clone)]
pub struct HiveConfig {
    /// Path to the SQLite store.
    pub db_path: String,
    /// Maximum concurrently executing pipelines per supervisor.
    pub concurrency: usize,
    /// Supervisor idle poll interval, seconds.
    pub poll_secs: u64,
    /// Wildcard feed merge interval, seconds.
    pub merge_interval_secs: u64,
    /// Due-target enqueue interval, seconds.
    pub enqueue_interval_secs: u64,
    /// Per-target re-scan cooldown, seconds.
    pub cooldown_secs: i64,
    /// Max tasks enqueued per scheduler pass.
    pub max_batch: usize,
    /// External wildcard feed URL.
    pub feed_url: String,
    /// Local override wildcard file.
    pub user_wildcards_path: PathBuf,
    /// Built-in active-scan template directory.
    pub templates_dir: PathBuf,
    /// User-supplied active-scan template directory.
    pub custom_templates_dir: PathBuf,
    /// Per-task log directory.
    pub log_dir: PathBuf,
    /// Ports probed during the probing stage.
    pub probe_ports: String,
    /// Per-collaborator invocation timeout, seconds.
    pub tool_timeout_secs: u64,
    /// Heartbeat age after which a running task is considered abandoned.
    pub stale_heartbeat_secs: i64,
    /// Optional archival command invoked as `<cmd> <task_id> <log_path>`.
    pub archive_cmd: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, HiveError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| HiveError::Config(format!("Invalid value for {}: {}", key, v))),
        Err(_) => Ok(default),
    }
}

impl HiveConfig {
    pub fn from_env() -> Result<Self, HiveError> {
        Ok(Self {
            db_path: env_or("DB_PATH", "/data/reconhive.db"),
            concurrency: env_parse("WORKER_CONCURRENCY", 3)?,
            poll_secs: env_parse("WORKER_POLL_SEC", 2)?,
            merge_interval_secs: env_parse("MERGE_WILDCARDS_INTERVAL_SEC", 1800)?,
            enqueue_interval_secs: env_parse("ENQUEUE_INTERVAL_SEC", 120)?,
            cooldown_secs: env_parse("SCAN_COOLDOWN_SEC", 86_400)?,
            max_batch: env_parse("MAX_PARALLEL_QUEUED", 3)?,
            feed_url: env_or("WILDCARDS_FEED_URL", DEFAULT_FEED_URL),
            user_wildcards_path: env_or("USER_WILDCARDS_PATH", "/data/user-wildcards.txt").into(),
            templates_dir: env_or("SCAN_TEMPLATES_DIR", "/data/scan-templates").into(),
            custom_templates_dir: env_or("CUSTOM_TEMPLATES_DIR", "/data/custom-templates").into(),
            log_dir: env_or("TASK_LOG_DIR", "/var/log/reconhive").into(),
            probe_ports: env_or("PROBE_PORTS", "80,443,8080,8443"),
            tool_timeout_secs: env_parse("TOOL_TIMEOUT_SEC", 1800)?,
            stale_heartbeat_secs: env_parse("STALE_HEARTBEAT_SEC", 7200)?,
            archive_cmd: std::env::var("LOG_ARCHIVE_CMD").ok().filter(|s| !s.is_empty()),
        })
    }
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            db_path: ":memory:".into(),
            concurrency: 3,
            poll_secs: 2,
            merge_interval_secs: 1800,
            enqueue_interval_secs: 120,
            cooldown_secs: 86_400,
            max_batch: 3,
            feed_url: DEFAULT_FEED_URL.into(),
            user_wildcards_path: "/data/user-wildcards.txt".into(),
            templates_dir: "/data/scan-templates".into(),
            custom_templates_dir: "/data/custom-templates".into(),
            log_dir: std::env::temp_dir().join("reconhive-logs"),
            probe_ports: "80,443,8080,8443".into(),
            tool_timeout_secs: 1800,
            stale_heartbeat_secs: 7200,
            archive_cmd: None,
        }
    }
}
