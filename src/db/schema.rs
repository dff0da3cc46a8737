use rusqlite::Connection;

/// Ordered schema migrations, applied once each and tracked through
/// `PRAGMA user_version`. Re-running startup against an up-to-date store is
/// a no-op; a store created by an older build is upgraded in place.
const MIGRATIONS: &[&str] = &[
    // v1: core tables
    "
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        target TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'queued',
        note TEXT NOT NULL DEFAULT ''
    );
    CREATE TABLE IF NOT EXISTS targets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pattern TEXT NOT NULL UNIQUE,
        seed TEXT NOT NULL,
        last_scanned INTEGER,
        enabled INTEGER NOT NULL DEFAULT 1
    );
    CREATE TABLE IF NOT EXISTS scope (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pattern TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        value TEXT NOT NULL,
        UNIQUE(task_id, kind, value)
    );
    CREATE TABLE IF NOT EXISTS findings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL,
        tool TEXT NOT NULL,
        fingerprint TEXT NOT NULL,
        title TEXT NOT NULL,
        detail TEXT NOT NULL,
        severity TEXT NOT NULL,
        label TEXT NOT NULL,
        raw TEXT NOT NULL,
        UNIQUE(task_id, tool, fingerprint)
    );
    ",
    // v2: task liveness and finding triage columns
    "
    ALTER TABLE tasks ADD COLUMN heartbeat INTEGER;
    ALTER TABLE findings ADD COLUMN score INTEGER NOT NULL DEFAULT 0;
    ALTER TABLE findings ADD COLUMN reasons TEXT NOT NULL DEFAULT '[]';
    CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status, created_at);
    CREATE INDEX IF NOT EXISTS idx_assets_task ON assets(task_id);
    CREATE INDEX IF NOT EXISTS idx_findings_task ON findings(task_id);
    ",
];

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    for (i, sql) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i64;
        if current < version {
            conn.execute_batch(sql)?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        let v: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap();
        assert_eq!(v, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_all_tables_exist_after_migrate() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        for table in ["tasks", "targets", "scope", "assets", "findings"] {
            let n: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(n, 1, "missing table {}", table);
        }
    }
}
