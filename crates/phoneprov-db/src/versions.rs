//! Config version store.
//!
//! Versions are immutable: rows are inserted, read, and eventually removed
//! by retention cleanup, never updated. Numbering is monotonic within a
//! (PABX, device type) scope; the next number is computed inside the
//! inserting statement so two writers can never allocate the same one.

use phoneprov_core::version::{ConfigVersion, VersionScope};
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use tracing::info;

use crate::{Database, DbError, DbResult, audit};

/// Outcome of one retention cleanup run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CleanupReport {
    /// Versions removed by the run
    pub deleted: usize,
    /// Cutoff age in days the run used
    pub cutoff_days: u32,
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ConfigVersion> {
    Ok(ConfigVersion {
        id: row.get(0)?,
        pabx_id: row.get(1)?,
        device_type_id: row.get(2)?,
        version_number: row.get(3)?,
        content: row.get(4)?,
        changelog: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert a version with the next number in its scope.
///
/// The `MAX + 1` subquery runs inside the INSERT, so the allocation is
/// atomic with the write on any connection or open transaction.
pub(crate) fn insert_version_tx(
    conn: &Connection,
    scope: VersionScope,
    content: &str,
    changelog: Option<&str>,
    created_by: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        r"INSERT INTO config_versions
            (pabx_id, device_type_id, version_number, content, changelog, created_by)
          VALUES (?1, ?2,
            (SELECT COALESCE(MAX(version_number), 0) + 1
             FROM config_versions WHERE pabx_id = ?1 AND device_type_id = ?2),
            ?3, ?4, ?5)",
        params![scope.pabx_id, scope.device_type_id, content, changelog, created_by],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Create a config version in the given scope.
    pub fn create_version(
        &self,
        actor: &str,
        scope: VersionScope,
        content: &str,
        changelog: Option<&str>,
    ) -> DbResult<ConfigVersion> {
        if self.get_pabx(scope.pabx_id)?.is_none() {
            return Err(DbError::NotFound(format!("pabx {}", scope.pabx_id)));
        }
        let type_known: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM device_types WHERE id = ?)",
            params![scope.device_type_id],
            |row| row.get(0),
        )?;
        if !type_known {
            return Err(DbError::NotFound(format!("device type {}", scope.device_type_id)));
        }

        let id = insert_version_tx(&self.conn, scope, content, changelog, actor)?;
        self.get_version(id)?.ok_or_else(|| DbError::NotFound(format!("config version {id}")))
    }

    /// Load a version by id.
    pub fn get_version(&self, id: i64) -> DbResult<Option<ConfigVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pabx_id, device_type_id, version_number, content, changelog,
                    created_by, created_at
             FROM config_versions WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id], version_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// List a scope's versions, newest number first.
    pub fn list_versions(&self, scope: VersionScope) -> DbResult<Vec<ConfigVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pabx_id, device_type_id, version_number, content, changelog,
                    created_by, created_at
             FROM config_versions WHERE pabx_id = ? AND device_type_id = ?
             ORDER BY version_number DESC",
        )?;
        let versions = stmt
            .query_map(params![scope.pabx_id, scope.device_type_id], version_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    /// Clone a version into its own scope under a fresh number.
    pub fn copy_version(
        &self,
        actor: &str,
        version_id: i64,
        changelog: Option<&str>,
    ) -> DbResult<ConfigVersion> {
        let source = self
            .get_version(version_id)?
            .ok_or_else(|| DbError::NotFound(format!("config version {version_id}")))?;

        let note = changelog
            .map(str::to_string)
            .unwrap_or_else(|| format!("copy of version {}", source.version_number));
        let id = insert_version_tx(&self.conn, source.scope(), &source.content, Some(&note), actor)?;
        self.get_version(id)?.ok_or_else(|| DbError::NotFound(format!("config version {id}")))
    }

    /// Delete versions older than the cutoff that are active for no device.
    ///
    /// Writes one audit row per run, also when nothing qualified, so "ran
    /// and found nothing" stays distinguishable from "never ran".
    pub fn cleanup_versions(&mut self, actor: &str, cutoff_days: u32) -> DbResult<CleanupReport> {
        let modifier = format!("-{cutoff_days} days");
        let tx = self.conn.transaction()?;

        let deleted = tx.execute(
            r"DELETE FROM config_versions
              WHERE created_at < datetime('now', ?)
                AND id NOT IN (
                    SELECT config_version_id FROM device_config_assignments
                    WHERE is_active = TRUE)",
            params![modifier],
        )?;

        let detail = format!(r#"{{"deleted":{deleted},"cutoff_days":{cutoff_days}}}"#);
        audit::append_tx(&tx, actor, "cleanup", "config_version", None, Some(&detail))?;
        tx.commit()?;

        info!(deleted, cutoff_days, "Retention cleanup finished");
        Ok(CleanupReport { deleted, cutoff_days })
    }
}
