use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::errors::HiveError;

/// Append-only per-task text log: stage transitions and raw collaborator
/// stderr. Advisory detail only — the task's status/note row is the
/// authoritative health indicator. Handed to the archival collaborator after
/// the task reaches a terminal state.
pub struct TaskLog {
    path: PathBuf,
}

impl TaskLog {
    pub async fn create(log_dir: &Path, task_id: &str) -> Result<Self, HiveError> {
        tokio::fs::create_dir_all(log_dir).await?;
        let path = log_dir.join(format!("task-{}.log", task_id));
        let header = format!("# task {}\n# started {}\n\n", task_id, Utc::now().to_rfc3339());
        tokio::fs::write(&path, &header).await?;
        Ok(Self { path })
    }

    pub async fn append(&self, message: &str) -> Result<(), HiveError> {
        let line = format!("[{}] {}\n", Utc::now().format("%H:%M:%S"), message);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = TaskLog::create(dir.path(), "abc123").await.unwrap();
        log.append("stage: enumeration").await.unwrap();
        log.append("stage: probing").await.unwrap();

        let content = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert!(content.starts_with("# task abc123"));
        let enum_pos = content.find("stage: enumeration").unwrap();
        let probe_pos = content.find("stage: probing").unwrap();
        assert!(enum_pos < probe_pos);
    }
}
