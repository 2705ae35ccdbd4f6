//! Global variable queries.

use phoneprov_core::vars::{GlobalVariable, VarMap, is_valid_key};
use rusqlite::params;

use crate::{Database, DbError, DbResult};

impl Database {
    /// Create or update a global variable.
    pub fn set_variable(&self, key: &str, value: &str, description: Option<&str>) -> DbResult<()> {
        if !is_valid_key(key) {
            return Err(phoneprov_core::Error::InvalidVariableKey(key.to_string()).into());
        }

        self.conn.execute(
            r"INSERT INTO variables (key, value, description)
              VALUES (?, ?, ?)
              ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                description = COALESCE(excluded.description, description),
                updated_at = datetime('now')",
            params![key, value, description],
        )?;
        Ok(())
    }

    /// Load one global variable.
    pub fn get_variable(&self, key: &str) -> DbResult<Option<GlobalVariable>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, key, value, description, updated_at FROM variables WHERE key = ?",
        )?;
        let mut rows = stmt.query_map(params![key], |row| {
            Ok(GlobalVariable {
                id: row.get(0)?,
                key: row.get(1)?,
                value: row.get(2)?,
                description: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// List all global variables.
    pub fn list_variables(&self) -> DbResult<Vec<GlobalVariable>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, key, value, description, updated_at FROM variables ORDER BY key",
        )?;
        let variables = stmt
            .query_map([], |row| {
                Ok(GlobalVariable {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    description: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(variables)
    }

    /// Delete a global variable.
    pub fn delete_variable(&self, key: &str) -> DbResult<bool> {
        let deleted = self.conn.execute("DELETE FROM variables WHERE key = ?", params![key])?;
        Ok(deleted > 0)
    }

    /// The global tier for variable resolution.
    pub fn global_tier(&self) -> DbResult<VarMap> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM variables")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<VarMap, _>>()?;
        Ok(pairs)
    }
}
