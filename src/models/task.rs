use serde::{Deserialize, Serialize};

/// Task lifecycle state. Transitions are forward-only:
/// queued → running → {done, error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(TaskStatus::Queued),
            "running" => Some(TaskStatus::Running),
            "done" => Some(TaskStatus::Done),
            "error" => Some(TaskStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of scheduled scan work against a target. Rows are retained as
/// audit history and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub target: String,
    pub created_at: i64,
    pub status: TaskStatus,
    pub note: String,
    /// Last liveness timestamp, refreshed on every status update.
    pub heartbeat: Option<i64>,
}

/// A scannable wildcard scope with a re-scan cooldown. Disabled rather than
/// deleted when retired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub pattern: String,
    pub seed: String,
    pub last_scanned: Option<i64>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Host,
    Url,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Host => "host",
            AssetKind::Url => "url",
        }
    }
}

/// A discovered host or URL belonging to a task. Pure dedup record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub task_id: String,
    pub kind: AssetKind,
    pub value: String,
}
