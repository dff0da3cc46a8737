use super::Database;
use crate::errors::{retrying_write, HiveError};
use crate::models::{Finding, Severity};

impl Database {
    /// Insert-if-absent on (task, tool, fingerprint). Returns true when the
    /// finding is new; re-delivery or a re-run of the same task never creates
    /// a duplicate row.
    pub fn insert_finding(&self, f: &Finding) -> Result<bool, HiveError> {
        let raw = serde_json::to_string(&f.raw)?;
        let reasons = serde_json::to_string(&f.reasons)?;
        retrying_write("insert_finding", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            let n = conn.execute(
                "INSERT OR IGNORE INTO findings
                   (task_id, tool, fingerprint, title, detail, severity, label, raw, score, reasons)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    f.task_id,
                    f.tool,
                    f.fingerprint,
                    f.title,
                    f.detail,
                    f.severity.as_str(),
                    f.label,
                    raw,
                    f.score,
                    reasons,
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn list_findings(&self, task_id: &str) -> Result<Vec<Finding>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT task_id, tool, fingerprint, title, detail, severity, label, raw, score, reasons
             FROM findings WHERE task_id=?1 ORDER BY score DESC, title",
        )?;
        let rows = stmt.query_map([task_id], |row| {
            let severity: String = row.get(5)?;
            let raw: String = row.get(7)?;
            let reasons: String = row.get(9)?;
            Ok(Finding {
                task_id: row.get(0)?,
                tool: row.get(1)?,
                fingerprint: row.get(2)?,
                title: row.get(3)?,
                detail: row.get(4)?,
                severity: Severity::parse(&severity),
                label: row.get(6)?,
                raw: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
                score: row.get(8)?,
                reasons: serde_json::from_str(&reasons).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn count_findings(&self, task_id: &str) -> Result<i64, HiveError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM findings WHERE task_id=?1",
            [task_id],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fingerprint, label_for};
    use serde_json::json;

    fn sample(task: &str, check: &str, matched: &str) -> Finding {
        Finding {
            task_id: task.to_string(),
            tool: "nuclei".to_string(),
            fingerprint: fingerprint(check, matched),
            title: "Exposed git directory".to_string(),
            detail: matched.to_string(),
            severity: Severity::Medium,
            label: label_for(Severity::Medium).to_string(),
            raw: json!({"template-id": check, "matched-at": matched}),
            score: 72,
            reasons: vec!["severity:medium(+45)".into(), "path:.git(+15)".into()],
        }
    }

    #[test]
    fn test_insert_finding_dedups_on_fingerprint() {
        let db = Database::in_memory().unwrap();
        let f = sample("t1", "exposed-git", "https://a.example.com/.git/");
        assert!(db.insert_finding(&f).unwrap());
        assert!(!db.insert_finding(&f).unwrap());
        assert_eq!(db.count_findings("t1").unwrap(), 1);
    }

    #[test]
    fn test_findings_round_trip_reasons_and_raw() {
        let db = Database::in_memory().unwrap();
        let f = sample("t1", "exposed-git", "https://a.example.com/.git/");
        db.insert_finding(&f).unwrap();

        let got = db.list_findings("t1").unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].severity, Severity::Medium);
        assert_eq!(got[0].label, "sus");
        assert_eq!(got[0].score, 72);
        assert_eq!(got[0].reasons, f.reasons);
        assert_eq!(got[0].raw["template-id"], "exposed-git");
    }

    #[test]
    fn test_same_check_different_location_is_distinct() {
        let db = Database::in_memory().unwrap();
        db.insert_finding(&sample("t1", "exposed-git", "https://a.example.com/.git/")).unwrap();
        db.insert_finding(&sample("t1", "exposed-git", "https://b.example.com/.git/")).unwrap();
        assert_eq!(db.count_findings("t1").unwrap(), 2);
    }
}
