//! Audit trail queries.
//!
//! Every mutating operator action appends one row: actor, action, the
//! entity touched, and an optional JSON detail blob with before/after
//! snapshots. Rows are never updated or deleted.

use rusqlite::{Connection, Row, params};
use serde::Serialize;

use crate::{Database, DbResult};

/// One audit trail row.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Row id
    pub id: i64,
    /// Principal that performed the action
    pub actor: String,
    /// Action name, e.g. `activate` or `bulk_execute`
    pub action: String,
    /// Kind of entity touched
    pub entity_type: String,
    /// Id of the touched entity, when there is a single one
    pub entity_id: Option<i64>,
    /// JSON blob with before/after snapshots
    pub detail: Option<String>,
    /// Append timestamp (UTC)
    pub created_at: String,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        actor: row.get(1)?,
        action: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        detail: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Append an audit row on an open connection or transaction.
pub(crate) fn append_tx(
    conn: &Connection,
    actor: &str,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    detail: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO audit_log (actor, action, entity_type, entity_id, detail)
         VALUES (?, ?, ?, ?, ?)",
        params![actor, action, entity_type, entity_id, detail],
    )?;
    Ok(())
}

impl Database {
    /// Append an audit row.
    pub fn append_audit(
        &self,
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: Option<i64>,
        detail: Option<&str>,
    ) -> DbResult<()> {
        append_tx(&self.conn, actor, action, entity_type, entity_id, detail)?;
        Ok(())
    }

    /// List the most recent audit rows.
    pub fn list_audit(&self, limit: usize) -> DbResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, actor, action, entity_type, entity_id, detail, created_at
             FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map(params![limit as i64], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
