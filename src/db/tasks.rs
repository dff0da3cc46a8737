use rusqlite::Row;

use super::{now_epoch, Database};
use crate::errors::{retrying_write, HiveError};
use crate::models::{Task, TaskStatus};
use crate::scope::implicit_patterns;

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        target: row.get(1)?,
        created_at: row.get(2)?,
        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Error),
        note: row.get(4)?,
        heartbeat: row.get(5)?,
    })
}

const TASK_COLUMNS: &str = "id, target, created_at, status, note, heartbeat";

impl Database {
    /// Create a queued task. Idempotent: inserting an id that already exists
    /// is a silent no-op, so retried submissions are safe.
    pub fn insert_task(&self, id: &str, target: &str, note: &str) -> Result<(), HiveError> {
        retrying_write("insert_task", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO tasks(id, target, created_at, status, note)
                 VALUES(?1, ?2, ?3, 'queued', ?4)",
                rusqlite::params![id, target, now_epoch(), note],
            )?;
            Ok(())
        })
    }

    /// Manual submission path: queue the task and widen the scope set with
    /// the target's implicit pattern. Feed-derived scope entries would
    /// otherwise reject every discovery for an out-of-feed target, leaving
    /// the task to complete empty.
    pub fn submit_task(&self, id: &str, target: &str, note: &str) -> Result<(), HiveError> {
        self.insert_task(id, target, note)?;
        for pattern in implicit_patterns(target) {
            self.add_scope(&pattern)?;
        }
        Ok(())
    }

    /// Atomically claim up to `max_n` queued tasks, oldest first, moving each
    /// to running. The transition is a conditional update that only succeeds
    /// while the row is still queued, so concurrent claimants racing on the
    /// same row can never both win it; the loser simply gets a smaller set.
    /// The whole batch runs in one transaction: a failure mid-batch rolls
    /// every transition back, so the caller never observes partial success
    /// and no claimed row can go unreturned.
    pub fn claim_tasks(&self, max_n: usize) -> Result<Vec<(String, String)>, HiveError> {
        retrying_write("claim_tasks", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            let tx = conn.unchecked_transaction()?;
            let candidates: Vec<(String, String)> = {
                let mut stmt = tx.prepare(
                    "SELECT id, target FROM tasks WHERE status='queued'
                     ORDER BY created_at ASC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([max_n as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<_>>()?;
                rows
            };

            let mut claimed = Vec::new();
            for (id, target) in candidates {
                let updated = tx.execute(
                    "UPDATE tasks SET status='running', note='starting', heartbeat=?2
                     WHERE id=?1 AND status='queued'",
                    rusqlite::params![id, now_epoch()],
                )?;
                if updated == 1 {
                    claimed.push((id, target));
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
    }

    /// Claim one specific task. Same conditional transition as
    /// [`claim_tasks`](Self::claim_tasks); returns false when another
    /// claimant already won the row or the id is unknown.
    pub fn claim_task(&self, id: &str) -> Result<bool, HiveError> {
        retrying_write("claim_task", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            let updated = conn.execute(
                "UPDATE tasks SET status='running', note='starting', heartbeat=?2
                 WHERE id=?1 AND status='queued'",
                rusqlite::params![id, now_epoch()],
            )?;
            Ok(updated == 1)
        })
    }

    /// Unconditional status/note update; refreshes the heartbeat so a live
    /// execution is distinguishable from an abandoned one.
    pub fn set_status(&self, id: &str, status: TaskStatus, note: &str) -> Result<(), HiveError> {
        retrying_write("set_status", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE tasks SET status=?2, note=?3, heartbeat=?4 WHERE id=?1",
                rusqlite::params![id, status.as_str(), note, now_epoch()],
            )?;
            Ok(())
        })
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks WHERE id=?1",
            TASK_COLUMNS
        ))?;
        match stmt.query_row([id], task_from_row) {
            Ok(t) => Ok(Some(t)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Tasks ordered for operator display: running, then queued, then
    /// terminal states, newest first within each bucket.
    pub fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tasks
             ORDER BY CASE status
               WHEN 'running' THEN 0
               WHEN 'queued'  THEN 1
               WHEN 'done'    THEN 2
               WHEN 'error'   THEN 3
               ELSE 4 END, created_at DESC
             LIMIT ?1",
            TASK_COLUMNS
        ))?;
        let rows = stmt.query_map([limit as i64], task_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Operator reclaim rule: return running tasks whose heartbeat is older
    /// than the stale threshold to the queue. Returns how many were requeued.
    pub fn requeue_stale(&self, stale_secs: i64) -> Result<usize, HiveError> {
        retrying_write("requeue_stale", &self.retry, || {
            let cutoff = now_epoch() - stale_secs;
            let conn = self.conn.lock().unwrap();
            let n = conn.execute(
                "UPDATE tasks SET status='queued', note='reclaimed: stale heartbeat'
                 WHERE status='running' AND (heartbeat IS NULL OR heartbeat < ?1)",
                rusqlite::params![cutoff],
            )?;
            Ok(n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_task_idempotent() {
        let db = Database::in_memory().unwrap();
        db.insert_task("t1", "example.com", "manual").unwrap();
        db.insert_task("t1", "other.com", "retry").unwrap();

        let task = db.get_task("t1").unwrap().unwrap();
        assert_eq!(task.target, "example.com");
        assert_eq!(task.status, TaskStatus::Queued);

        let all = db.list_tasks(10).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_claim_moves_oldest_first_and_marks_running() {
        let db = Database::in_memory().unwrap();
        db.insert_task("a", "a.com", "").unwrap();
        db.insert_task("b", "b.com", "").unwrap();
        {
            // Force distinct created_at ordering.
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE tasks SET created_at=1 WHERE id='a'", []).unwrap();
            conn.execute("UPDATE tasks SET created_at=2 WHERE id='b'", []).unwrap();
        }

        let claimed = db.claim_tasks(1).unwrap();
        assert_eq!(claimed, vec![("a".to_string(), "a.com".to_string())]);
        assert_eq!(db.get_task("a").unwrap().unwrap().status, TaskStatus::Running);
        assert!(db.get_task("a").unwrap().unwrap().heartbeat.is_some());
        assert_eq!(db.get_task("b").unwrap().unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn test_failed_claim_batch_rolls_back_every_transition() {
        let db = Database::in_memory().unwrap();
        db.insert_task("a", "a.com", "").unwrap();
        db.insert_task("b", "b.com", "").unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE tasks SET created_at=1 WHERE id='a'", []).unwrap();
            conn.execute("UPDATE tasks SET created_at=2 WHERE id='b'", []).unwrap();
            // Fault injection: the second row's transition aborts after the
            // first has already been moved to running inside the batch.
            conn.execute_batch(
                "CREATE TRIGGER fail_b BEFORE UPDATE ON tasks FOR EACH ROW
                 WHEN NEW.id='b' AND NEW.status='running'
                 BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
            )
            .unwrap();
        }

        assert!(db.claim_tasks(5).is_err());
        // Not-happened semantics: no row may be left running with no worker.
        assert_eq!(db.get_task("a").unwrap().unwrap().status, TaskStatus::Queued);
        assert_eq!(db.get_task("b").unwrap().unwrap().status, TaskStatus::Queued);

        {
            let conn = db.conn.lock().unwrap();
            conn.execute_batch("DROP TRIGGER fail_b;").unwrap();
        }
        let claimed = db.claim_tasks(5).unwrap();
        assert_eq!(claimed.len(), 2);
    }

    #[test]
    fn test_submit_task_widens_scope_with_implicit_pattern() {
        let db = Database::in_memory().unwrap();
        db.add_scope("*.othercorp.net").unwrap();
        db.submit_task("t1", "example.com", "manual").unwrap();

        assert_eq!(db.get_task("t1").unwrap().unwrap().status, TaskStatus::Queued);
        let mut pats = db.scope_patterns().unwrap();
        pats.sort();
        assert_eq!(pats, vec!["*.example.com", "*.othercorp.net"]);
    }

    #[test]
    fn test_claim_never_double_claims() {
        let db = Database::in_memory().unwrap();
        db.insert_task("only", "x.com", "").unwrap();

        let first = db.claim_tasks(5).unwrap();
        let second = db.claim_tasks(5).unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_set_status_refreshes_heartbeat() {
        let db = Database::in_memory().unwrap();
        db.insert_task("t", "x.com", "").unwrap();
        db.set_status("t", TaskStatus::Running, "probing").unwrap();

        let task = db.get_task("t").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.note, "probing");
        assert!(task.heartbeat.is_some());
    }

    #[test]
    fn test_requeue_stale_only_touches_stale_running() {
        let db = Database::in_memory().unwrap();
        db.insert_task("fresh", "a.com", "").unwrap();
        db.insert_task("stale", "b.com", "").unwrap();
        db.insert_task("finished", "c.com", "").unwrap();
        db.claim_tasks(3).unwrap();
        db.set_status("finished", TaskStatus::Done, "complete").unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE tasks SET heartbeat=1 WHERE id='stale'", []).unwrap();
        }

        let n = db.requeue_stale(3600).unwrap();
        assert_eq!(n, 1);
        assert_eq!(db.get_task("stale").unwrap().unwrap().status, TaskStatus::Queued);
        assert_eq!(db.get_task("fresh").unwrap().unwrap().status, TaskStatus::Running);
        assert_eq!(db.get_task("finished").unwrap().unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn test_list_tasks_ordering() {
        let db = Database::in_memory().unwrap();
        db.insert_task("q", "q.com", "").unwrap();
        db.insert_task("r", "r.com", "").unwrap();
        db.insert_task("d", "d.com", "").unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE tasks SET status='running' WHERE id='r'", []).unwrap();
            conn.execute("UPDATE tasks SET status='done' WHERE id='d'", []).unwrap();
        }

        let order: Vec<String> = db.list_tasks(10).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(order, vec!["r", "q", "d"]);
    }
}
