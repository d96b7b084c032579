use rusqlite::{Connection, Result};
use std::sync::Mutex;
use crate::db::migration_runner::{MigrationRunner, IN_MEMORY_PATH};

/// Local SQLite database backing the fallback cache
pub struct Database {
    pub conn: Mutex<Connection>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // WAL is not available for in-memory databases
        if db_path != IN_MEMORY_PATH {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let runner = MigrationRunner::new();

        log::info!("=== Starting cache migration check ===");

        let applied = runner.run_pending_migrations(&conn, db_path)?;

        if applied > 0 {
            log::info!("✅ Applied {} migrations successfully", applied);
        } else {
            log::info!("✅ Cache schema is up to date");
        }

        // Verify migration integrity (checksums)
        runner.verify_migrations(&conn)?;

        if let Some(version) = runner.get_current_version(&conn)? {
            log::info!("Final schema version: {}", version);
        }

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// Throwaway database, used when no cache path is configured and in tests
    pub fn in_memory() -> Result<Self> {
        Self::new(IN_MEMORY_PATH)
    }
}
