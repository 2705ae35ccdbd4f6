//! Phoneprov Database - SQLite persistence layer.
//!
//! This crate owns all durable state: devices, templates, variables,
//! config versions and their assignments, the activation history ledger,
//! bulk operations, provisioning attempts, download tokens, and the
//! audit trail. The transactional lifecycle operations (activate, bulk
//! execute/rollback, token redemption) live here too, next to the rows
//! they must keep consistent.

pub mod assignments;
pub mod attempts;
pub mod audit;
pub mod bulk;
pub mod devices;
pub mod error;
pub mod migrations;
pub mod resolve;
pub mod schema;
pub mod templates;
pub mod tokens;
pub mod variables;
pub mod versions;

pub use error::{DbError, DbResult};

use std::path::PathBuf;

use directories::ProjectDirs;
use rusqlite::Connection;
use tracing::{debug, info};

/// Database handle for Phoneprov.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at the default location.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open() -> DbResult<Self> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open or create the database at a specific path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open_at(path: PathBuf) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(?path, "Opening database");
        let conn = Connection::open(&path)?;

        // WAL for concurrent readers; busy_timeout bounds store waits
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let mut db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn open_in_memory() -> DbResult<Self> {
        debug!("Opening in-memory database");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let mut db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the default database path.
    fn default_path() -> DbResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "phoneprov", "Phoneprov").ok_or(DbError::NoDataDir)?;
        Ok(dirs.data_dir().join("phoneprov.db"))
    }

    /// Run database migrations.
    fn run_migrations(&mut self) -> DbResult<()> {
        migrations::run(&mut self.conn)
    }

    /// The schema version the store was migrated to at open time.
    ///
    /// # Errors
    /// Returns an error if the version table cannot be read.
    pub fn schema_version(&self) -> DbResult<i32> {
        migrations::get_version(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
