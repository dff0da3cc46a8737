use super::Database;
use crate::errors::{retrying_write, HiveError};
use crate::models::{Asset, AssetKind};

impl Database {
    /// Record a discovered asset. Returns true when the row is new; the
    /// unique constraint over (task, kind, value) makes re-discovery a no-op.
    pub fn insert_asset(&self, task_id: &str, kind: AssetKind, value: &str) -> Result<bool, HiveError> {
        retrying_write("insert_asset", &self.retry, || {
            let conn = self.conn.lock().unwrap();
            let n = conn.execute(
                "INSERT OR IGNORE INTO assets(task_id, kind, value) VALUES(?1, ?2, ?3)",
                rusqlite::params![task_id, kind.as_str(), value],
            )?;
            Ok(n == 1)
        })
    }

    pub fn list_assets(&self, task_id: &str) -> Result<Vec<Asset>, HiveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT task_id, kind, value FROM assets WHERE task_id=?1 ORDER BY kind, value",
        )?;
        let rows = stmt.query_map([task_id], |row| {
            let kind: String = row.get(1)?;
            Ok(Asset {
                task_id: row.get(0)?,
                kind: if kind == "host" { AssetKind::Host } else { AssetKind::Url },
                value: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn count_assets(&self, task_id: &str, kind: AssetKind) -> Result<i64, HiveError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM assets WHERE task_id=?1 AND kind=?2",
            rusqlite::params![task_id, kind.as_str()],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}
