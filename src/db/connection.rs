use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::{HiveError, RetryPolicy};

/// Handle to the authoritative store for tasks, targets, scope, assets and
/// findings. Cloning shares the underlying connection; independent handles
/// to the same file (e.g. one per process) coordinate through SQLite itself.
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) retry: RetryPolicy,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, HiveError> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| HiveError::Database(format!("Failed to open database: {}", e)))?;

        // WAL for concurrent readers, bounded busy wait before the retry
        // layer sees a contention error at all.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|e| HiveError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryPolicy::default(),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, HiveError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HiveError::Database(format!("Failed to open in-memory db: {}", e)))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryPolicy::default(),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), HiveError> {
        let conn = self.conn.lock().unwrap();
        super::schema::migrate(&conn)
            .map_err(|e| HiveError::Database(format!("Migration failed: {}", e)))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            retry: self.retry.clone(),
        }
    }
}
