use rusqlite::Row;

use super::{now_epoch, Database};
use crate::errors::{retrying_write, HiveError};
use crate::models::Target;

fn target_from_row(row: &Row) -> rusqlite::Result<Target> {
    Ok(Target {
        id: row.get(0)?,
        pattern: row.get(1)?,
        seed: row.get(2)?,
        last_scanned: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
    })
}

impl Database {
    /// Add a target pattern. The unique constraint absorbs duplicates, so
    /// repeated feed merges are harmless.
    pub fn upsert_target(&self, pattern: &str, seed: &str) -> Result<(), HiveError> {
        retrying_write("upsert_target", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO targets(pattern, seed) VALUES(?1, ?2)",
                rusqlite::params![pattern, seed],
            )?;
            Ok(())
        })
    }

    /// Append a scope pattern. The scope set is append-only.
    pub fn add_scope(&self, pattern: &str) -> Result<(), HiveError> {
        retrying_write("add_scope", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO scope(pattern) VALUES(?1)",
                rusqlite::params![pattern],
            )?;
            Ok(())
        })
    }

    pub fn scope_patterns(&self) -> Result<Vec<String>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT pattern FROM scope")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Read-only due-selection for the scheduler: enabled targets that were
    /// never scanned or whose cooldown has elapsed, never-scanned first, then
    /// oldest-scanned. Deliberately does not touch `last_scanned` — only the
    /// worker updates that, after the target's task has terminated.
    pub fn due_targets(&self, cooldown_secs: i64, limit: usize) -> Result<Vec<Target>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, pattern, seed, last_scanned, enabled FROM targets
             WHERE enabled=1 AND (last_scanned IS NULL OR ?1 - last_scanned > ?2)
             ORDER BY (last_scanned IS NOT NULL), last_scanned ASC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![now_epoch(), cooldown_secs, limit as i64],
            target_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Stamp every target with this seed as freshly scanned.
    pub fn mark_seed_scanned(&self, seed: &str, scanned_at: i64) -> Result<(), HiveError> {
        retrying_write("mark_seed_scanned", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE targets SET last_scanned=?2 WHERE seed=?1",
                rusqlite::params![seed, scanned_at],
            )?;
            Ok(())
        })
    }

    /// Targets are retired by disabling, never deleted.
    pub fn set_target_enabled(&self, pattern: &str, enabled: bool) -> Result<(), HiveError> {
        retrying_write("set_target_enabled", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE targets SET enabled=?2 WHERE pattern=?1",
                rusqlite::params![pattern, enabled as i64],
            )?;
            Ok(())
        })
    }

    pub fn list_targets(&self) -> Result<Vec<Target>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, pattern, seed, last_scanned, enabled FROM targets
             ORDER BY enabled DESC, seed",
        )?;
        let rows = stmt.query_map([], target_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_target_absorbs_duplicates() {
        let db = Database::in_memory().unwrap();
        db.upsert_target("*.example.com", "example.com").unwrap();
        db.upsert_target("*.example.com", "example.com").unwrap();
        assert_eq!(db.list_targets().unwrap().len(), 1);
    }

    #[test]
    fn test_scope_is_append_only_set() {
        let db = Database::in_memory().unwrap();
        db.add_scope("*.example.com").unwrap();
        db.add_scope("*.example.com").unwrap();
        db.add_scope("*.other.net").unwrap();
        let mut pats = db.scope_patterns().unwrap();
        pats.sort();
        assert_eq!(pats, vec!["*.example.com", "*.other.net"]);
    }

    #[test]
    fn test_due_selection_prioritizes_never_scanned() {
        let db = Database::in_memory().unwrap();
        db.upsert_target("*.fresh.com", "fresh.com").unwrap();
        db.upsert_target("*.recent.com", "recent.com").unwrap();
        // Scanned one hour ago: inside a 86400s cooldown, not due.
        db.mark_seed_scanned("recent.com", now_epoch() - 3600).unwrap();

        let due = db.due_targets(86_400, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].seed, "fresh.com");
    }

    #[test]
    fn test_due_selection_orders_oldest_scanned_after_never() {
        let db = Database::in_memory().unwrap();
        db.upsert_target("*.never.com", "never.com").unwrap();
        db.upsert_target("*.old.com", "old.com").unwrap();
        db.upsert_target("*.older.com", "older.com").unwrap();
        db.mark_seed_scanned("old.com", now_epoch() - 200_000).unwrap();
        db.mark_seed_scanned("older.com", now_epoch() - 300_000).unwrap();

        let due: Vec<String> = db
            .due_targets(86_400, 10)
            .unwrap()
            .into_iter()
            .map(|t| t.seed)
            .collect();
        assert_eq!(due, vec!["never.com", "older.com", "old.com"]);
    }

    #[test]
    fn test_disabled_targets_not_due() {
        let db = Database::in_memory().unwrap();
        db.upsert_target("*.off.com", "off.com").unwrap();
        db.set_target_enabled("*.off.com", false).unwrap();
        assert!(db.due_targets(86_400, 10).unwrap().is_empty());
        // Still present, just disabled.
        assert_eq!(db.list_targets().unwrap().len(), 1);
    }
}
