//! Bulk find/replace over active configs.
//!
//! Preview and execute are decoupled: execute re-scans the active
//! assignments instead of trusting preview data, since assignments may
//! have drifted between the phases. Each mutated device gets its new
//! version, activation flip, and reversal detail inside one transaction;
//! a failure mid-run leaves committed devices mutated and every other
//! device untouched.

use phoneprov_core::bulk::{
    BulkOperation, BulkOperationDetail, ExecuteReport, MutatedDevice, PreviewHit, PreviewReport,
    count_occurrences,
};
use phoneprov_core::version::VersionScope;
use rusqlite::{Row, params};
use tracing::{error, info};

use crate::{Database, DbError, DbResult, assignments, versions};

/// One active (device, version) pair picked up by a scan.
struct ActiveConfig {
    device_id: i64,
    device_name: String,
    version_id: i64,
    scope: VersionScope,
    content: String,
    match_count: usize,
}

fn operation_from_row(row: &Row<'_>) -> rusqlite::Result<BulkOperation> {
    Ok(BulkOperation {
        id: row.get(0)?,
        search_term: row.get(1)?,
        replace_term: row.get(2)?,
        executed_by: row.get(3)?,
        executed_at: row.get(4)?,
        affected_count: row.get(5)?,
        rolled_back_at: row.get(6)?,
        rolled_back_by: row.get(7)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<BulkOperationDetail> {
    Ok(BulkOperationDetail {
        id: row.get(0)?,
        operation_id: row.get(1)?,
        device_id: row.get(2)?,
        old_version_id: row.get(3)?,
        new_version_id: row.get(4)?,
        match_count: row.get(5)?,
    })
}

impl Database {
    /// Read-only scan: which active configs contain the search term.
    pub fn bulk_preview(
        &self,
        search: &str,
        display_limit: Option<usize>,
    ) -> DbResult<PreviewReport> {
        let matches = self.scan_matches(search)?;
        let hits = matches
            .into_iter()
            .map(|m| PreviewHit {
                device_id: m.device_id,
                device_name: m.device_name,
                config_version_id: m.version_id,
                match_count: m.match_count,
            })
            .collect();
        Ok(PreviewReport::from_hits(hits, display_limit))
    }

    /// Replace the search term across active configs.
    ///
    /// Re-scans at call time; `device_limit` caps how many devices are
    /// mutated, with the rest reported as remaining.
    pub fn bulk_execute(
        &mut self,
        actor: &str,
        search: &str,
        replace: &str,
        device_limit: Option<usize>,
    ) -> DbResult<ExecuteReport> {
        let matches = self.scan_matches(search)?;
        let take = device_limit.unwrap_or(matches.len()).min(matches.len());
        let remaining = matches.len() - take;

        self.conn.execute(
            "INSERT INTO bulk_operations (search_term, replace_term, executed_by) VALUES (?, ?, ?)",
            params![search, replace, actor],
        )?;
        let operation_id = self.conn.last_insert_rowid();

        let mut mutated = Vec::with_capacity(take);
        for target in matches.into_iter().take(take) {
            match self.mutate_one(operation_id, &target, search, replace, actor) {
                Ok(entry) => mutated.push(entry),
                Err(err) => {
                    error!(
                        operation_id,
                        device_id = target.device_id,
                        %err,
                        "Bulk execute halted; committed devices stay mutated"
                    );
                    self.conn.execute(
                        "UPDATE bulk_operations SET affected_count = ? WHERE id = ?",
                        params![mutated.len() as i64, operation_id],
                    )?;
                    return Err(err);
                }
            }
        }

        self.conn.execute(
            "UPDATE bulk_operations SET affected_count = ? WHERE id = ?",
            params![mutated.len() as i64, operation_id],
        )?;
        info!(operation_id, mutated = mutated.len(), remaining, "Bulk execute finished");

        Ok(ExecuteReport { operation_id, mutated, remaining })
    }

    /// Reverse one executed operation as a unit.
    ///
    /// Every affected device is flipped back to its recorded old version
    /// in a single transaction; the newer versions stay in the store and
    /// the history ledger keeps both activations.
    pub fn bulk_rollback(&mut self, actor: &str, operation_id: i64) -> DbResult<usize> {
        let operation = self
            .get_bulk_operation(operation_id)?
            .ok_or_else(|| DbError::NotFound(format!("bulk operation {operation_id}")))?;
        if operation.is_rolled_back() {
            return Err(DbError::Conflict(format!(
                "bulk operation {operation_id} already rolled back"
            )));
        }

        let details = self.operation_details(operation_id)?;

        let tx = self.conn.transaction()?;
        for detail in &details {
            assignments::activate_tx(&tx, detail.device_id, detail.old_version_id, actor)?;
        }
        tx.execute(
            r"UPDATE bulk_operations SET
                rolled_back_at = datetime('now'),
                rolled_back_by = ?
              WHERE id = ?",
            params![actor, operation_id],
        )?;
        tx.commit()?;

        info!(operation_id, restored = details.len(), "Bulk operation rolled back");
        Ok(details.len())
    }

    /// Load one operation.
    pub fn get_bulk_operation(&self, id: i64) -> DbResult<Option<BulkOperation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, search_term, replace_term, executed_by, executed_at,
                    affected_count, rolled_back_at, rolled_back_by
             FROM bulk_operations WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id], operation_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// List operations, newest first.
    pub fn list_bulk_operations(&self) -> DbResult<Vec<BulkOperation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, search_term, replace_term, executed_by, executed_at,
                    affected_count, rolled_back_at, rolled_back_by
             FROM bulk_operations ORDER BY id DESC",
        )?;
        let operations = stmt.query_map([], operation_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(operations)
    }

    /// Per-device reversal details of one operation.
    pub fn operation_details(&self, operation_id: i64) -> DbResult<Vec<BulkOperationDetail>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, operation_id, device_id, old_version_id, new_version_id, match_count
             FROM bulk_operation_details WHERE operation_id = ? ORDER BY id",
        )?;
        let details = stmt
            .query_map(params![operation_id], detail_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(details)
    }

    /// Active configs of active devices whose content matches the term.
    fn scan_matches(&self, search: &str) -> DbResult<Vec<ActiveConfig>> {
        if search.is_empty() {
            return Err(phoneprov_core::Error::validation("search", "term must not be empty").into());
        }

        let mut stmt = self.conn.prepare(
            r"SELECT d.id, d.name, cv.id, cv.pabx_id, cv.device_type_id, cv.content
              FROM devices d
              JOIN device_config_assignments a
                ON a.device_id = d.id AND a.is_active = TRUE
              JOIN config_versions cv ON cv.id = a.config_version_id
              WHERE d.is_active = TRUE
              ORDER BY d.id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ActiveConfig {
                    device_id: row.get(0)?,
                    device_name: row.get(1)?,
                    version_id: row.get(2)?,
                    scope: VersionScope { pabx_id: row.get(3)?, device_type_id: row.get(4)? },
                    content: row.get(5)?,
                    match_count: 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let matches = rows
            .into_iter()
            .filter_map(|mut config| {
                config.match_count = count_occurrences(&config.content, search);
                (config.match_count > 0).then_some(config)
            })
            .collect();
        Ok(matches)
    }

    /// New version + activation flip + detail row for one device.
    fn mutate_one(
        &mut self,
        operation_id: i64,
        target: &ActiveConfig,
        search: &str,
        replace: &str,
        actor: &str,
    ) -> DbResult<MutatedDevice> {
        let new_content = target.content.replace(search, replace);
        let changelog = format!("bulk replace: '{search}' -> '{replace}'");

        let tx = self.conn.transaction()?;
        let new_version_id =
            versions::insert_version_tx(&tx, target.scope, &new_content, Some(&changelog), actor)?;
        assignments::activate_tx(&tx, target.device_id, new_version_id, actor)?;
        tx.execute(
            r"INSERT INTO bulk_operation_details
                (operation_id, device_id, old_version_id, new_version_id, match_count)
              VALUES (?, ?, ?, ?, ?)",
            params![
                operation_id,
                target.device_id,
                target.version_id,
                new_version_id,
                target.match_count as i64,
            ],
        )?;
        tx.commit()?;

        Ok(MutatedDevice {
            device_id: target.device_id,
            old_version_id: target.version_id,
            new_version_id,
            match_count: target.match_count,
        })
    }
}
