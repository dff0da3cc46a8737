//! Target scheduler: merges the external wildcard feed and the local
//! override list into the target/scope tables on a long interval, and
//! enqueues tasks for due targets on a short interval. It never touches
//! `last_scanned` — only the worker does, after a task terminates.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::HiveConfig;
use crate::db::Database;
use crate::dispatch::{DispatchHint, DispatchQueue};
use crate::errors::HiveError;

/// Normalize one feed line into `(pattern, seed)`. Comments and blanks
/// yield None. `*.x` strips to `x`; `*-name.x` strips everything up to and
/// including the first dot; anything else trims leading `*`/`.` characters.
pub fn normalize_wildcard(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let seed = if let Some(rest) = line.strip_prefix("*.") {
        rest.to_string()
    } else if line.starts_with("*-") && line.contains('.') {
        line.splitn(2, '.').nth(1).unwrap_or(line).to_string()
    } else {
        line.trim_start_matches(['*', '.']).to_string()
    };
    if seed.is_empty() {
        return None;
    }
    Some((line.to_string(), seed))
}

/// Deterministic task id: derived from the target's row identity and the
/// enqueue time so distinct enqueues never collide by accident.
pub fn task_id_for(target_row: i64, now: i64) -> String {
    let mut h = Sha256::new();
    h.update(format!("{}-{}", target_row, now).as_bytes());
    format!("{:x}", h.finalize())[..12].to_string()
}

pub struct Scheduler {
    db: Database,
    config: HiveConfig,
    http: reqwest::Client,
    dispatch: Option<DispatchQueue>,
}

impl Scheduler {
    pub fn new(db: Database, config: HiveConfig) -> Self {
        Self {
            db,
            config,
            http: reqwest::Client::new(),
            dispatch: None,
        }
    }

    /// Attach a dispatch queue; every enqueued task also publishes a hint.
    pub fn with_dispatch(mut self, queue: DispatchQueue) -> Self {
        self.dispatch = Some(queue);
        self
    }

    async fn fetch_feed(&self) -> Vec<String> {
        let fetch = async {
            let resp = self
                .http
                .get(&self.config.feed_url)
                .timeout(Duration::from_secs(20))
                .send()
                .await
                .map_err(|e| HiveError::Feed(e.to_string()))?;
            let resp = resp
                .error_for_status()
                .map_err(|e| HiveError::Feed(e.to_string()))?;
            resp.text().await.map_err(|e| HiveError::Feed(e.to_string()))
        };
        match fetch.await {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(e) => {
                warn!(url = %self.config.feed_url, error = %e, "Wildcard feed fetch failed");
                Vec::new()
            }
        }
    }

    async fn read_local_overrides(&self) -> Vec<String> {
        match tokio::fs::read_to_string(&self.config.user_wildcards_path).await {
            Ok(text) => text.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Merge feed plus local override lines into targets and scope. The
    /// unique constraints absorb re-merged duplicates.
    pub async fn merge_targets(&self) -> Result<usize, HiveError> {
        let mut lines = self.fetch_feed().await;
        lines.extend(self.read_local_overrides().await);

        let mut processed = 0;
        for line in &lines {
            if let Some((pattern, seed)) = normalize_wildcard(line) {
                self.db.upsert_target(&pattern, &seed)?;
                self.db.add_scope(&pattern)?;
                processed += 1;
            }
        }
        info!(lines = lines.len(), processed, "Wildcard merge complete");
        Ok(processed)
    }

    /// Enqueue one task per due target, never-scanned targets first, bounded
    /// to the configured batch size.
    pub fn enqueue_due(&self) -> Result<usize, HiveError> {
        let now = crate::db::now_epoch();
        let due = self.db.due_targets(self.config.cooldown_secs, self.config.max_batch)?;
        let mut enqueued = 0;
        for target in due {
            let task_id = task_id_for(target.id, now);
            let note = format!("auto: {}", target.pattern);
            self.db.insert_task(&task_id, &target.seed, &note)?;
            enqueued += 1;
            if let Some(queue) = &self.dispatch {
                let hint = DispatchHint {
                    task_id: task_id.clone(),
                    target: target.seed.clone(),
                };
                if let Err(e) = queue.publish(&hint) {
                    warn!(task_id, error = %e, "Dispatch publish failed");
                }
            }
        }
        if enqueued > 0 {
            info!(enqueued, "Tasks enqueued");
        }
        Ok(enqueued)
    }

    /// Two timers in one loop: merge on the long interval, enqueue on the
    /// short one. Iteration errors are logged, never fatal.
    pub async fn run(self) {
        info!(
            merge_interval = self.config.merge_interval_secs,
            enqueue_interval = self.config.enqueue_interval_secs,
            cooldown = self.config.cooldown_secs,
            "Scheduler starting"
        );
        let mut last_merge: Option<tokio::time::Instant> = None;
        loop {
            let merge_due = last_merge
                .map(|t| t.elapsed().as_secs() >= self.config.merge_interval_secs)
                .unwrap_or(true);
            if merge_due {
                if let Err(e) = self.merge_targets().await {
                    warn!(error = %e, "Target merge failed");
                }
                last_merge = Some(tokio::time::Instant::now());
            }
            if let Err(e) = self.enqueue_due() {
                warn!(error = %e, "Enqueue pass failed");
            }
            tokio::time::sleep(Duration::from_secs(self.config.enqueue_interval_secs)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[test]
    fn test_normalize_wildcard_forms() {
        assert_eq!(
            normalize_wildcard("*.example.com"),
            Some(("*.example.com".into(), "example.com".into()))
        );
        assert_eq!(
            normalize_wildcard("*-shop.example.com"),
            Some(("*-shop.example.com".into(), "example.com".into()))
        );
        assert_eq!(
            normalize_wildcard("example.com"),
            Some(("example.com".into(), "example.com".into()))
        );
        assert_eq!(normalize_wildcard("# comment"), None);
        assert_eq!(normalize_wildcard("   "), None);
    }

    #[test]
    fn test_task_id_is_short_and_deterministic() {
        let a = task_id_for(7, 1_700_000_000);
        let b = task_id_for(7, 1_700_000_000);
        let c = task_id_for(7, 1_700_000_001);
        assert_eq!(a.len(), 12);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_enqueue_due_prefers_never_scanned() {
        let db = Database::in_memory().unwrap();
        db.upsert_target("*.never.com", "never.com").unwrap();
        db.upsert_target("*.recent.com", "recent.com").unwrap();
        db.mark_seed_scanned("recent.com", crate::db::now_epoch() - 3600).unwrap();

        let config = HiveConfig::default();
        let sched = Scheduler::new(db.clone(), config);
        let enqueued = sched.enqueue_due().unwrap();
        assert_eq!(enqueued, 1);

        let tasks = db.list_tasks(10).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].target, "never.com");
        assert_eq!(tasks[0].status, TaskStatus::Queued);
        assert!(tasks[0].note.starts_with("auto: *.never.com"));
    }

    #[tokio::test]
    async fn test_enqueue_publishes_dispatch_hints() {
        let db = Database::in_memory().unwrap();
        db.upsert_target("*.a.com", "a.com").unwrap();
        let queue = DispatchQueue::new(3);
        let sched = Scheduler::new(db.clone(), HiveConfig::default()).with_dispatch(queue.clone());

        sched.enqueue_due().unwrap();
        let delivery = queue.try_recv().unwrap();
        let hint = delivery.hint().unwrap();
        assert_eq!(hint.target, "a.com");
        assert_eq!(db.get_task(&hint.task_id).unwrap().unwrap().target, "a.com");
    }

    #[tokio::test]
    async fn test_merge_reads_local_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-wildcards.txt");
        std::fs::write(&path, "*.manual.com\n# skip me\n*.manual.com\n").unwrap();

        let db = Database::in_memory().unwrap();
        let config = HiveConfig {
            // Unroutable feed URL: merge must fall back to the local file.
            feed_url: "http://127.0.0.1:1/wildcards.txt".into(),
            user_wildcards_path: path,
            ..HiveConfig::default()
        };
        let sched = Scheduler::new(db.clone(), config);
        let processed = sched.merge_targets().await.unwrap();
        assert_eq!(processed, 2);

        let targets = db.list_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].seed, "manual.com");
        assert_eq!(db.scope_patterns().unwrap(), vec!["*.manual.com"]);
    }
}
