//! Config versions, device assignments, and the activation history ledger.

use serde::{Deserialize, Serialize};

/// The (PABX, device type) pair that scopes version numbering.
///
/// Version numbers are monotonic within one scope; two scopes each start
/// at 1 and never interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionScope {
    /// PABX the config targets
    pub pabx_id: i64,
    /// Device type the config targets
    pub device_type_id: i64,
}

/// An immutable configuration snapshot.
///
/// Content is stored as written and may still contain unresolved
/// placeholders; those are filled in at serve time by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigVersion {
    /// Row id
    pub id: i64,
    /// PABX scope
    pub pabx_id: i64,
    /// Device type scope
    pub device_type_id: i64,
    /// Monotonic within the scope, starting at 1
    pub version_number: i64,
    /// Template or rendered text blob
    pub content: String,
    /// Operator-supplied change summary
    pub changelog: Option<String>,
    /// Principal that created the version
    pub created_by: String,
    /// Creation timestamp (UTC)
    pub created_at: String,
}

impl ConfigVersion {
    /// The scope this version was numbered in.
    #[must_use]
    pub fn scope(&self) -> VersionScope {
        VersionScope {
            pabx_id: self.pabx_id,
            device_type_id: self.device_type_id,
        }
    }
}

/// Links one device to one config version.
///
/// At most one assignment per device has `is_active = true` at any point
/// observable outside a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAssignment {
    /// Row id
    pub id: i64,
    /// Device the version is assigned to
    pub device_id: i64,
    /// Assigned config version
    pub config_version_id: i64,
    /// Whether this is the device's live version
    pub is_active: bool,
    /// Assignment timestamp (UTC)
    pub assigned_at: String,
    /// Principal that made the assignment
    pub assigned_by: String,
}

/// One activation event in the append-only history ledger.
///
/// `deactivated_at` and `duration_secs` stay empty until the activation
/// is superseded; they are the only fields ever updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Row id
    pub id: i64,
    /// Device the activation applied to
    pub device_id: i64,
    /// Version that became active
    pub config_version_id: i64,
    /// Activation timestamp (UTC)
    pub activated_at: String,
    /// Principal that activated the version
    pub activated_by: String,
    /// Set when a later activation supersedes this one
    pub deactivated_at: Option<String>,
    /// Seconds the version stayed active, set together with `deactivated_at`
    pub duration_secs: Option<i64>,
}

impl HistoryEntry {
    /// True while this entry describes the device's current activation.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.deactivated_at.is_none()
    }
}
