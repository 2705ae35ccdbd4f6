//! Provisioning attempt log.

use phoneprov_core::provision::{ProvisionAttempt, ProvisionStatus};
use rusqlite::{Row, params};
use tracing::warn;

use crate::{Database, DbError, DbResult};

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<ProvisionAttempt> {
    let status_raw: String = row.get(6)?;
    let last_status = ProvisionStatus::parse(&status_raw).unwrap_or_else(|| {
        warn!(status = %status_raw, "Unknown stored attempt status, treating as server_error");
        ProvisionStatus::ServerError
    });
    Ok(ProvisionAttempt {
        id: row.get(0)?,
        mac: row.get(1)?,
        filename: row.get(2)?,
        attempt_count: row.get(3)?,
        first_seen_at: row.get(4)?,
        last_seen_at: row.get(5)?,
        last_status,
        last_model: row.get(7)?,
    })
}

impl Database {
    /// Record one provisioning request.
    ///
    /// The first request for a (MAC, filename) pair inserts a row; repeats
    /// bump its counter and refresh the outcome. A model hint is kept once
    /// seen, so a later request without a user agent does not erase it.
    pub fn record_attempt(
        &self,
        mac: &str,
        filename: &str,
        status: ProvisionStatus,
        model: Option<&str>,
    ) -> DbResult<()> {
        self.conn.execute(
            r"INSERT INTO provision_attempts (mac, filename, last_status, last_model)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(mac, filename) DO UPDATE SET
                  attempt_count = attempt_count + 1,
                  last_seen_at = datetime('now'),
                  last_status = excluded.last_status,
                  last_model = COALESCE(excluded.last_model, last_model)",
            params![mac, filename, status.as_str(), model],
        )?;
        Ok(())
    }

    /// Load one attempt row.
    pub fn get_attempt(&self, mac: &str, filename: &str) -> DbResult<Option<ProvisionAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mac, filename, attempt_count, first_seen_at, last_seen_at,
                    last_status, last_model
             FROM provision_attempts WHERE mac = ? AND filename = ?",
        )?;
        let mut rows = stmt.query_map(params![mac, filename], attempt_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// Recent attempts, most recently seen first.
    pub fn list_attempts(&self, limit: usize) -> DbResult<Vec<ProvisionAttempt>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mac, filename, attempt_count, first_seen_at, last_seen_at,
                    last_status, last_model
             FROM provision_attempts
             ORDER BY last_seen_at DESC, id DESC
             LIMIT ?",
        )?;
        let attempts = stmt
            .query_map(params![limit as i64], attempt_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attempts)
    }

    /// Model strings seen by provisioning that map to no device type.
    ///
    /// Feeds the operator workflow that turns an unknown model into a
    /// device type for automatic classification.
    pub fn unmapped_models(&self) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT last_model FROM provision_attempts
             WHERE last_model IS NOT NULL
               AND last_model NOT IN (SELECT model FROM device_types)
             ORDER BY last_model",
        )?;
        let models = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_repeat_attempts_bump_counter() {
        let db = test_db();
        db.record_attempt("001565AABB01", "001565aabb01.cfg", ProvisionStatus::DeviceNotFound, None)
            .unwrap();
        db.record_attempt("001565AABB01", "001565aabb01.cfg", ProvisionStatus::Success, None)
            .unwrap();

        let attempt = db.get_attempt("001565AABB01", "001565aabb01.cfg").unwrap().unwrap();
        assert_eq!(attempt.attempt_count, 2);
        assert_eq!(attempt.last_status, ProvisionStatus::Success);
        assert_eq!(db.list_attempts(10).unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_filenames_get_distinct_rows() {
        let db = test_db();
        db.record_attempt("001565AABB01", "001565aabb01.cfg", ProvisionStatus::Success, None)
            .unwrap();
        db.record_attempt("001565AABB01", "bootstrap.cfg", ProvisionStatus::Success, None)
            .unwrap();

        let attempts = db.list_attempts(10).unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.attempt_count == 1));
    }

    #[test]
    fn test_model_hint_survives_agentless_repeat() {
        let db = test_db();
        db.record_attempt(
            "001565AABB01",
            "001565aabb01.cfg",
            ProvisionStatus::Success,
            Some("Yealink SIP-T46G"),
        )
        .unwrap();
        db.record_attempt("001565AABB01", "001565aabb01.cfg", ProvisionStatus::Success, None)
            .unwrap();

        let attempt = db.get_attempt("001565AABB01", "001565aabb01.cfg").unwrap().unwrap();
        assert_eq!(attempt.last_model.as_deref(), Some("Yealink SIP-T46G"));
    }

    #[test]
    fn test_unmapped_models_excludes_known_types() {
        let db = test_db();
        db.create_device_type("Yealink T46", "Yealink SIP-T46G")
            .expect("Failed to create device type");
        db.record_attempt(
            "001565AABB01",
            "001565aabb01.cfg",
            ProvisionStatus::Success,
            Some("Yealink SIP-T46G"),
        )
        .unwrap();
        db.record_attempt(
            "0004F2AABB02",
            "0004f2aabb02.cfg",
            ProvisionStatus::DeviceNotFound,
            Some("Polycom VVX450"),
        )
        .unwrap();

        assert_eq!(db.unmapped_models().unwrap(), vec!["Polycom VVX450".to_string()]);
    }

    #[test]
    fn test_list_limit_caps_rows() {
        let db = test_db();
        for i in 0..5 {
            db.record_attempt(
                &format!("001565AABB0{i}"),
                &format!("001565aabb0{i}.cfg"),
                ProvisionStatus::DeviceNotFound,
                None,
            )
            .unwrap();
        }
        assert_eq!(db.list_attempts(3).unwrap().len(), 3);
    }
}
