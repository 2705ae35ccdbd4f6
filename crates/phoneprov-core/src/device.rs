//! Device, PABX, and device type records.

use serde::{Deserialize, Serialize};

use crate::mac::MacAddr;

/// A provisioned desk phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Row id
    pub id: i64,
    /// Display name (extension label, owner, ...)
    pub name: String,
    /// Hardware address in canonical form
    pub mac: MacAddr,
    /// Device type this phone belongs to, if classified
    pub device_type_id: Option<i64>,
    /// Model string as reported by the firmware
    pub model: Option<String>,
    /// PABX the phone registers against
    pub pabx_id: Option<i64>,
    /// Inactive devices are skipped by bulk mutations
    pub is_active: bool,
}

/// A PABX a group of devices registers against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pabx {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// SIP registrar host
    pub host: String,
    /// SIP registrar port
    pub port: u16,
}

/// A class of phone hardware sharing one template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceType {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Model prefix matched against firmware user agents
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_serializes_canonical_mac() {
        let device = Device {
            id: 1,
            name: "Front desk".to_string(),
            mac: MacAddr::parse("00:15:65:aa:bb:cc").unwrap(),
            device_type_id: Some(2),
            model: Some("SIP-T46G".to_string()),
            pabx_id: None,
            is_active: true,
        };
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"001565AABBCC\""));
    }
}
