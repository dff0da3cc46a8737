use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Severity reported by the active scanner, ordered from most to least
/// severe. Anything unrecognized parses as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Unknown,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "info" => Severity::Info,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
            Severity::Unknown => "unknown",
        }
    }

    /// Base triage score contributed by severity alone.
    pub fn base_score(&self) -> i32 {
        match self {
            Severity::Critical => 90,
            Severity::High => 70,
            Severity::Medium => 45,
            Severity::Low => 20,
            Severity::Info => 5,
            Severity::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse UI triage bucket derived from severity. Not security ground truth.
pub fn label_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "likely-bug",
        Severity::Medium => "sus",
        _ => "info",
    }
}

/// A deduplicated, scored active-scan result against an in-scope URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub task_id: String,
    pub tool: String,
    pub fingerprint: String,
    pub title: String,
    /// Matched location (URL the check fired on).
    pub detail: String,
    pub severity: Severity,
    pub label: String,
    /// Verbatim scanner output object, retained for audit/display.
    pub raw: serde_json::Value,
    pub score: i64,
    /// Ordered explanation trail from the scoring engine.
    pub reasons: Vec<String>,
}

/// Stable uniqueness key for a finding: hash over the check identity and the
/// matched location, so re-running a task never duplicates findings.
pub fn fingerprint(check_id: &str, matched: &str) -> String {
    let mut h = Sha256::new();
    h.update(check_id.as_bytes());
    h.update(matched.as_bytes());
    format!("{:x}", h.finalize())
}
