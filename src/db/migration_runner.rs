//! Versioned schema for the cache database.
//!
//! Each migration is recorded with the SHA-256 of its SQL; a recorded checksum
//! that no longer matches the compiled-in SQL fails the open. File databases are
//! backed up before pending migrations run.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path SQLite uses for a private in-memory database
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Pre-migration backups kept next to the cache database
const BACKUPS_TO_KEEP: usize = 5;

const BACKUP_PREFIX: &str = "pre_migration_";

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub const fn new(version: u32, name: &'static str, sql: &'static str) -> Self {
        Self { version, name, sql }
    }

    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.sql.as_bytes()))
    }
}

/// Version 0 creates the bookkeeping table itself
const MIGRATIONS: &[Migration] = &[
    Migration::new(0, "bootstrap", include_str!("migrations/000_bootstrap.sql")),
    Migration::new(1, "local_cache", include_str!("migrations/001_local_cache.sql")),
];

pub struct MigrationRunner {
    migrations: &'static [Migration],
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: MIGRATIONS,
        }
    }

    /// Apply every migration newer than the recorded version. Returns how many ran.
    pub fn run_pending_migrations(&self, conn: &Connection, db_path: &str) -> Result<usize> {
        let current = self.get_current_version(conn)?;
        let pending: Vec<&Migration> = self
            .migrations
            .iter()
            .filter(|m| current.is_none_or(|v| m.version > v))
            .collect();

        let Some(target) = pending.last().map(|m| m.version) else {
            log::debug!("Cache schema at version {:?}, nothing to apply", current);
            return Ok(0);
        };

        log::info!(
            "Cache schema at version {:?}, applying {} migration(s) up to {}",
            current,
            pending.len(),
            target
        );

        // Fresh files have nothing worth keeping; neither do in-memory databases
        let backup = match current {
            Some(_) if db_path != IN_MEMORY_PATH => Some(self.create_backup(conn, db_path, target)?),
            _ => None,
        };

        for migration in &pending {
            if let Err(e) = self.apply_migration(conn, migration) {
                log::error!("❌ Migration {} ({}) failed: {}", migration.version, migration.name, e);
                if let Some(path) = &backup {
                    log::error!("Schema left at the previous version, backup at {}", path.display());
                }
                return Err(e);
            }
            log::info!("✅ Applied migration {}: {}", migration.version, migration.name);
        }

        Ok(pending.len())
    }

    /// Fail if an applied migration's SQL changed since it ran
    pub fn verify_migrations(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare("SELECT version, checksum FROM schema_migrations ORDER BY version")?;
        let recorded = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        for (version, checksum) in recorded {
            let Some(migration) = self.migrations.iter().find(|m| m.version == version) else {
                log::warn!("Cache schema has unknown migration {}", version);
                continue;
            };
            if migration.checksum() != checksum {
                log::error!(
                    "❌ Checksum mismatch for migration {} ({}): recorded {}, expected {}",
                    version,
                    migration.name,
                    checksum,
                    migration.checksum()
                );
                return Err(rusqlite::Error::InvalidQuery);
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        let has_table = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
                [],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !has_table {
            return Ok(None);
        }

        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
    }

    /// Run one migration and its bookkeeping row in a single transaction
    fn apply_migration(&self, conn: &Connection, migration: &Migration) -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, checksum, applied_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                migration.version,
                migration.name,
                migration.checksum(),
                Utc::now().timestamp()
            ],
        )?;
        tx.commit()
    }

    fn create_backup(&self, conn: &Connection, db_path: &str, target: u32) -> Result<PathBuf> {
        let dir = Path::new(db_path)
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups");
        fs::create_dir_all(&dir)
            .map_err(|e| io_failure(format!("Failed to create backup directory: {}", e)))?;

        let path = dir.join(format!(
            "{}v{}_{}.db",
            BACKUP_PREFIX,
            target,
            Utc::now().format("%Y%m%d%H%M%S")
        ));

        let mut dst = Connection::open(&path)?;
        rusqlite::backup::Backup::new(conn, &mut dst)?
            .run_to_completion(64, Duration::from_millis(50), None)?;

        let integrity: String = dst.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if integrity != "ok" {
            return Err(io_failure(format!("Backup integrity check failed: {}", integrity)));
        }

        log::info!("Cache backup written to {}", path.display());
        prune_backups(&dir);
        Ok(path)
    }
}

/// Keep the newest `BACKUPS_TO_KEEP` backups. Names sort by timestamp.
fn prune_backups(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Failed to list cache backups: {}", e);
            return;
        }
    };

    let mut backups: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".db"))
        })
        .collect();
    backups.sort();

    let excess = backups.len().saturating_sub(BACKUPS_TO_KEEP);
    for path in backups.into_iter().take(excess) {
        if let Err(e) = fs::remove_file(&path) {
            log::warn!("Failed to delete old backup {}: {}", path.display(), e);
        }
    }
}

fn io_failure(message: String) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i32>(0),
        )
        .unwrap()
            > 0
    }

    #[test]
    fn test_versions_are_sequential() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version as usize, i, "migration {} is out of order", m.name);
        }
    }

    #[test]
    fn test_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        assert_eq!(runner.get_current_version(&conn).unwrap(), None);
        let applied = runner.run_pending_migrations(&conn, IN_MEMORY_PATH).unwrap();

        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(runner.get_current_version(&conn).unwrap(), Some(1));
        assert!(table_exists(&conn, "local_cache"));
    }

    #[test]
    fn test_second_run_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        runner.run_pending_migrations(&conn, IN_MEMORY_PATH).unwrap();
        assert_eq!(runner.run_pending_migrations(&conn, IN_MEMORY_PATH).unwrap(), 0);
    }

    #[test]
    fn test_tampered_checksum_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner.run_pending_migrations(&conn, IN_MEMORY_PATH).unwrap();
        assert!(runner.verify_migrations(&conn).is_ok());

        conn.execute("UPDATE schema_migrations SET checksum = 'tampered' WHERE version = 1", [])
            .unwrap();
        assert!(runner.verify_migrations(&conn).is_err());
    }

    #[test]
    fn test_upgrade_of_file_database_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cache.db");
        let db_path = db_path.to_str().unwrap();
        let conn = Connection::open(db_path).unwrap();
        let runner = MigrationRunner::new();

        // Simulate a database created before the cache table existed
        runner.apply_migration(&conn, &MIGRATIONS[0]).unwrap();
        assert_eq!(runner.run_pending_migrations(&conn, db_path).unwrap(), 1);

        let backups: Vec<_> = fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            fs::write(dir.path().join(format!("{}v1_2026010100000{}.db", BACKUP_PREFIX, i)), "").unwrap();
        }
        fs::write(dir.path().join("unrelated.db"), "").unwrap();

        prune_backups(dir.path());

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left.len(), BACKUPS_TO_KEEP + 1);
        assert_eq!(left[0], format!("{}v1_20260101000003.db", BACKUP_PREFIX));
        assert!(left.contains(&"unrelated.db".to_string()));
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner.run_pending_migrations(&conn, IN_MEMORY_PATH).unwrap();

        let bad = Migration::new(2, "bad", "CREATE TABLE broken (; INVALID");
        assert!(runner.apply_migration(&conn, &bad).is_err());

        assert_eq!(runner.get_current_version(&conn).unwrap(), Some(1));
        assert!(!table_exists(&conn, "broken"));
    }
}
