//! Device assignment lifecycle and the activation history ledger.
//!
//! A device moves Unassigned -> Assigned/Inactive -> Assigned/Active. At
//! most one assignment per device is active at any point observable
//! outside a transaction; the flip happens in one transaction and the
//! partial unique index `ux_assignments_active` backs the invariant up at
//! the schema level.

use phoneprov_core::version::{DeviceAssignment, HistoryEntry};
use rusqlite::{Connection, Row, params};

use crate::{Database, DbError, DbResult};

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceAssignment> {
    Ok(DeviceAssignment {
        id: row.get(0)?,
        device_id: row.get(1)?,
        config_version_id: row.get(2)?,
        is_active: row.get(3)?,
        assigned_at: row.get(4)?,
        assigned_by: row.get(5)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        device_id: row.get(1)?,
        config_version_id: row.get(2)?,
        activated_at: row.get(3)?,
        activated_by: row.get(4)?,
        deactivated_at: row.get(5)?,
        duration_secs: row.get(6)?,
    })
}

/// Flip a device's active assignment inside an open transaction.
///
/// Upserts the link row, closes the open history row with its computed
/// duration, deactivates every assignment of the device, activates the
/// target, and appends the new history row.
pub(crate) fn activate_tx(
    conn: &Connection,
    device_id: i64,
    version_id: i64,
    actor: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        r"INSERT INTO device_config_assignments (device_id, config_version_id, assigned_by)
          VALUES (?, ?, ?)
          ON CONFLICT(device_id, config_version_id) DO NOTHING",
        params![device_id, version_id, actor],
    )?;

    conn.execute(
        r"UPDATE config_version_history SET
            deactivated_at = datetime('now'),
            duration_secs = CAST((julianday('now') - julianday(activated_at)) * 86400 AS INTEGER)
          WHERE device_id = ? AND deactivated_at IS NULL",
        params![device_id],
    )?;

    conn.execute(
        "UPDATE device_config_assignments SET is_active = FALSE WHERE device_id = ?",
        params![device_id],
    )?;
    conn.execute(
        r"UPDATE device_config_assignments SET is_active = TRUE
          WHERE device_id = ? AND config_version_id = ?",
        params![device_id, version_id],
    )?;

    conn.execute(
        r"INSERT INTO config_version_history (device_id, config_version_id, activated_by)
          VALUES (?, ?, ?)",
        params![device_id, version_id, actor],
    )?;
    Ok(())
}

impl Database {
    /// Link a version to a device without touching activation state.
    pub fn assign(&self, actor: &str, device_id: i64, version_id: i64) -> DbResult<DeviceAssignment> {
        self.require_device(device_id)?;
        self.require_version(version_id)?;

        self.conn.execute(
            r"INSERT INTO device_config_assignments (device_id, config_version_id, assigned_by)
              VALUES (?, ?, ?)
              ON CONFLICT(device_id, config_version_id) DO UPDATE SET
                assigned_at = datetime('now'),
                assigned_by = excluded.assigned_by",
            params![device_id, version_id, actor],
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT id, device_id, config_version_id, is_active, assigned_at, assigned_by
             FROM device_config_assignments
             WHERE device_id = ? AND config_version_id = ?",
        )?;
        let mut rows = stmt.query_map(params![device_id, version_id], assignment_from_row)?;
        rows.next()
            .transpose()?
            .ok_or_else(|| DbError::NotFound(format!("assignment for device {device_id}")))
    }

    /// Make a version the device's single live one.
    pub fn activate(&mut self, actor: &str, device_id: i64, version_id: i64) -> DbResult<()> {
        self.require_device(device_id)?;
        self.require_version(version_id)?;

        let tx = self.conn.transaction()?;
        activate_tx(&tx, device_id, version_id, actor)?;
        tx.commit()?;
        Ok(())
    }

    /// Remove every assignment link of a device. History rows stay.
    pub fn unassign(&self, device_id: i64) -> DbResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM device_config_assignments WHERE device_id = ?",
            params![device_id],
        )?;
        Ok(deleted > 0)
    }

    /// The device's active assignment, if any.
    pub fn active_assignment(&self, device_id: i64) -> DbResult<Option<DeviceAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, device_id, config_version_id, is_active, assigned_at, assigned_by
             FROM device_config_assignments
             WHERE device_id = ? AND is_active = TRUE",
        )?;
        let mut rows = stmt.query_map(params![device_id], assignment_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// All assignment links of a device, active first.
    pub fn assignments_for_device(&self, device_id: i64) -> DbResult<Vec<DeviceAssignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, device_id, config_version_id, is_active, assigned_at, assigned_by
             FROM device_config_assignments
             WHERE device_id = ? ORDER BY is_active DESC, assigned_at DESC",
        )?;
        let assignments =
            stmt.query_map(params![device_id], assignment_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    /// The device's activation history, newest first.
    pub fn history_for_device(&self, device_id: i64) -> DbResult<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, device_id, config_version_id, activated_at, activated_by,
                    deactivated_at, duration_secs
             FROM config_version_history
             WHERE device_id = ? ORDER BY id DESC",
        )?;
        let history =
            stmt.query_map(params![device_id], history_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }

    fn require_device(&self, device_id: i64) -> DbResult<()> {
        let known: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM devices WHERE id = ?)",
            params![device_id],
            |row| row.get(0),
        )?;
        if known { Ok(()) } else { Err(DbError::NotFound(format!("device {device_id}"))) }
    }

    fn require_version(&self, version_id: i64) -> DbResult<()> {
        let known: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM config_versions WHERE id = ?)",
            params![version_id],
            |row| row.get(0),
        )?;
        if known { Ok(()) } else { Err(DbError::NotFound(format!("config version {version_id}"))) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use phoneprov_core::mac::MacAddr;
    use phoneprov_core::version::VersionScope;

    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    /// One device plus `versions` config versions in a fresh scope.
    fn fixture(db: &Database, versions: usize) -> (i64, Vec<i64>) {
        let pabx = db.create_pabx("hq", "10.0.0.5", 5060).unwrap();
        let dtype = db.create_device_type("Yealink T46", "Yealink SIP-T46G").unwrap();
        let scope = VersionScope { pabx_id: pabx.id, device_type_id: dtype.id };

        let device = db
            .create_device("lobby", &MacAddr::parse("001565aabb01").unwrap(), Some(dtype.id), Some(pabx.id))
            .unwrap();

        let ids = (0..versions)
            .map(|i| db.create_version("admin", scope, &format!("rev={i}\n"), None).unwrap().id)
            .collect();
        (device.id, ids)
    }

    fn active_count(db: &Database, device_id: i64) -> i64 {
        db.conn()
            .query_row(
                "SELECT COUNT(*) FROM device_config_assignments
                 WHERE device_id = ? AND is_active = TRUE",
                params![device_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_assign_does_not_activate() {
        let db = test_db();
        let (device, versions) = fixture(&db, 2);

        db.assign("admin", device, versions[0]).unwrap();
        db.assign("admin", device, versions[1]).unwrap();

        assert_eq!(active_count(&db, device), 0);
        assert!(db.active_assignment(device).unwrap().is_none());
        assert_eq!(db.assignments_for_device(device).unwrap().len(), 2);
    }

    #[test]
    fn test_activate_flips_single_active() {
        let mut db = test_db();
        let (device, versions) = fixture(&db, 2);

        db.activate("admin", device, versions[0]).unwrap();
        assert_eq!(
            db.active_assignment(device).unwrap().unwrap().config_version_id,
            versions[0]
        );

        db.activate("admin", device, versions[1]).unwrap();
        let active = db.active_assignment(device).unwrap().unwrap();
        assert_eq!(active.config_version_id, versions[1]);
        assert_eq!(active_count(&db, device), 1);
    }

    #[test]
    fn test_activate_unknown_version() {
        let mut db = test_db();
        let (device, _) = fixture(&db, 1);
        assert_matches!(db.activate("admin", device, 999), Err(DbError::NotFound(_)));
    }

    #[test]
    fn test_history_closed_out_with_duration() {
        let mut db = test_db();
        let (device, versions) = fixture(&db, 2);

        db.activate("admin", device, versions[0]).unwrap();
        // Age the open entry so the computed duration is visible.
        db.conn()
            .execute(
                "UPDATE config_version_history
                 SET activated_at = datetime('now', '-1 hour')
                 WHERE device_id = ? AND deactivated_at IS NULL",
                params![device],
            )
            .unwrap();

        db.activate("operator", device, versions[1]).unwrap();

        let history = db.history_for_device(device).unwrap();
        assert_eq!(history.len(), 2);

        let open = &history[0];
        assert_eq!(open.config_version_id, versions[1]);
        assert_eq!(open.activated_by, "operator");
        assert!(open.is_open());

        let closed = &history[1];
        assert_eq!(closed.config_version_id, versions[0]);
        assert!(closed.deactivated_at.is_some());
        let duration = closed.duration_secs.unwrap();
        assert!((3590..=3610).contains(&duration), "duration was {duration}");
    }

    #[test]
    fn test_reactivating_same_version_keeps_one_active() {
        let mut db = test_db();
        let (device, versions) = fixture(&db, 1);

        db.activate("admin", device, versions[0]).unwrap();
        db.activate("admin", device, versions[0]).unwrap();

        assert_eq!(active_count(&db, device), 1);
        // Both activations appear in the ledger.
        assert_eq!(db.history_for_device(device).unwrap().len(), 2);
    }

    #[test]
    fn test_unassign_clears_links_keeps_history() {
        let mut db = test_db();
        let (device, versions) = fixture(&db, 1);
        db.activate("admin", device, versions[0]).unwrap();

        assert!(db.unassign(device).unwrap());
        assert!(db.active_assignment(device).unwrap().is_none());
        assert!(db.assignments_for_device(device).unwrap().is_empty());
        assert_eq!(db.history_for_device(device).unwrap().len(), 1);
    }

    #[test]
    fn test_schema_rejects_second_active_row() {
        let db = test_db();
        let (device, versions) = fixture(&db, 2);

        db.conn()
            .execute(
                "INSERT INTO device_config_assignments
                 (device_id, config_version_id, is_active, assigned_by)
                 VALUES (?, ?, TRUE, 'test')",
                params![device, versions[0]],
            )
            .unwrap();

        let second = db.conn().execute(
            "INSERT INTO device_config_assignments
             (device_id, config_version_id, is_active, assigned_by)
             VALUES (?, ?, TRUE, 'test')",
            params![device, versions[1]],
        );
        assert!(second.is_err());
    }

    #[test]
    fn test_concurrent_activates_leave_one_active() {
        let db = test_db();
        let (device, versions) = fixture(&db, 2);
        let db = Arc::new(Mutex::new(db));

        let handles: Vec<_> = versions
            .into_iter()
            .map(|version| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        db.lock().unwrap().activate("admin", device, version).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let db = db.lock().unwrap();
        assert_eq!(active_count(&db, device), 1);
    }
}
