//! Device, PABX, and device type queries.

use phoneprov_core::device::{Device, DeviceType, Pabx};
use phoneprov_core::mac::MacAddr;
use rusqlite::{Row, params};

use crate::{Database, DbError, DbResult};

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    let raw_mac: String = row.get(2)?;
    let mac = MacAddr::parse(&raw_mac).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(Device {
        id: row.get(0)?,
        name: row.get(1)?,
        mac,
        device_type_id: row.get(3)?,
        model: row.get(4)?,
        pabx_id: row.get(5)?,
        is_active: row.get(6)?,
    })
}

impl Database {
    /// Create a PABX.
    pub fn create_pabx(&self, name: &str, host: &str, port: u16) -> DbResult<Pabx> {
        self.conn.execute(
            "INSERT INTO pabxes (name, host, port) VALUES (?, ?, ?)",
            params![name, host, port],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Pabx { id, name: name.to_string(), host: host.to_string(), port })
    }

    /// Load a PABX by id.
    pub fn get_pabx(&self, id: i64) -> DbResult<Option<Pabx>> {
        let mut stmt = self.conn.prepare("SELECT id, name, host, port FROM pabxes WHERE id = ?")?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(Pabx { id: row.get(0)?, name: row.get(1)?, host: row.get(2)?, port: row.get(3)? })
        })?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// List all PABXes.
    pub fn list_pabxes(&self) -> DbResult<Vec<Pabx>> {
        let mut stmt =
            self.conn.prepare("SELECT id, name, host, port FROM pabxes ORDER BY name")?;
        let pabxes = stmt
            .query_map([], |row| {
                Ok(Pabx { id: row.get(0)?, name: row.get(1)?, host: row.get(2)?, port: row.get(3)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pabxes)
    }

    /// Create a device type.
    pub fn create_device_type(&self, name: &str, model: &str) -> DbResult<DeviceType> {
        self.conn.execute(
            "INSERT INTO device_types (name, model) VALUES (?, ?)",
            params![name, model],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(DeviceType { id, name: name.to_string(), model: model.to_string() })
    }

    /// List all device types.
    pub fn list_device_types(&self) -> DbResult<Vec<DeviceType>> {
        let mut stmt =
            self.conn.prepare("SELECT id, name, model FROM device_types ORDER BY name")?;
        let types = stmt
            .query_map([], |row| {
                Ok(DeviceType { id: row.get(0)?, name: row.get(1)?, model: row.get(2)? })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(types)
    }

    /// Find the device type whose model string matches exactly.
    pub fn device_type_for_model(&self, model: &str) -> DbResult<Option<DeviceType>> {
        let mut stmt =
            self.conn.prepare("SELECT id, name, model FROM device_types WHERE model = ?")?;
        let mut rows = stmt.query_map(params![model], |row| {
            Ok(DeviceType { id: row.get(0)?, name: row.get(1)?, model: row.get(2)? })
        })?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// Register a device.
    pub fn create_device(
        &self,
        name: &str,
        mac: &MacAddr,
        device_type_id: Option<i64>,
        pabx_id: Option<i64>,
    ) -> DbResult<Device> {
        let result = self.conn.execute(
            "INSERT INTO devices (name, mac, device_type_id, pabx_id) VALUES (?, ?, ?, ?)",
            params![name, mac.as_plain(), device_type_id, pabx_id],
        );
        match result {
            Ok(_) => {}
            Err(err) if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) => {
                return Err(DbError::Conflict(format!("device MAC {mac} already registered")));
            }
            Err(err) => return Err(err.into()),
        }

        let id = self.conn.last_insert_rowid();
        Ok(Device {
            id,
            name: name.to_string(),
            mac: mac.clone(),
            device_type_id,
            model: None,
            pabx_id,
            is_active: true,
        })
    }

    /// Load a device by id.
    pub fn get_device(&self, id: i64) -> DbResult<Option<Device>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, mac, device_type_id, model, pabx_id, is_active
             FROM devices WHERE id = ?",
        )?;
        let mut rows = stmt.query_map(params![id], device_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// Load a device by canonical MAC, regardless of its active flag.
    pub fn get_device_by_mac(&self, mac: &MacAddr) -> DbResult<Option<Device>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, mac, device_type_id, model, pabx_id, is_active
             FROM devices WHERE mac = ?",
        )?;
        let mut rows = stmt.query_map(params![mac.as_plain()], device_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// Look up an active device by canonical MAC, as provisioning does.
    pub fn find_active_device(&self, mac: &MacAddr) -> DbResult<Option<Device>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, mac, device_type_id, model, pabx_id, is_active
             FROM devices WHERE mac = ? AND is_active = TRUE",
        )?;
        let mut rows = stmt.query_map(params![mac.as_plain()], device_from_row)?;
        rows.next().transpose().map_err(DbError::from)
    }

    /// List all devices.
    pub fn list_devices(&self) -> DbResult<Vec<Device>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, mac, device_type_id, model, pabx_id, is_active
             FROM devices ORDER BY name",
        )?;
        let devices = stmt.query_map([], device_from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(devices)
    }

    /// Update a device's editable fields.
    pub fn update_device(
        &self,
        id: i64,
        name: &str,
        device_type_id: Option<i64>,
        pabx_id: Option<i64>,
        is_active: bool,
    ) -> DbResult<Device> {
        let updated = self.conn.execute(
            "UPDATE devices SET name = ?, device_type_id = ?, pabx_id = ?, is_active = ?
             WHERE id = ?",
            params![name, device_type_id, pabx_id, is_active, id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("device {id}")));
        }
        self.get_device(id)?.ok_or_else(|| DbError::NotFound(format!("device {id}")))
    }

    /// Record the model a device reported and classify it if possible.
    ///
    /// An existing device type binding is never overwritten; only devices
    /// without one pick up the type matching the reported model.
    pub fn observe_device_model(&self, id: i64, model: &str) -> DbResult<()> {
        self.conn.execute(
            "UPDATE devices SET
                model = ?,
                device_type_id = COALESCE(
                    device_type_id,
                    (SELECT id FROM device_types WHERE model = ?))
             WHERE id = ?",
            params![model, model, id],
        )?;
        Ok(())
    }

    /// Delete a device.
    pub fn delete_device(&self, id: i64) -> DbResult<bool> {
        let deleted = self.conn.execute("DELETE FROM devices WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}
