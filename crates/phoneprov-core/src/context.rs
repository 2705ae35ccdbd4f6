//! Request-scoped operator context.
//!
//! Every mutating operation receives the authenticated principal, its
//! resolved permission set, and locale as an explicit argument. Nothing
//! in the engine reads ambient session state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A capability an operator may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create and delete config versions
    ManageVersions,
    /// Assign, activate, and unassign versions on devices
    ActivateConfigs,
    /// Run bulk find/replace preview, execute, and rollback
    BulkMutate,
    /// Mint and revoke download tokens
    MintTokens,
    /// Edit global variables and template variable declarations
    ManageVariables,
    /// Edit devices, PABXes, and device types
    ManageDevices,
    /// Read the provisioning attempt log
    ViewAttempts,
    /// Trigger retention cleanup
    RunCleanup,
}

impl Permission {
    /// Stable name used in log fields and capability lookups.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageVersions => "manage_versions",
            Self::ActivateConfigs => "activate_configs",
            Self::BulkMutate => "bulk_mutate",
            Self::MintTokens => "mint_tokens",
            Self::ManageVariables => "manage_variables",
            Self::ManageDevices => "manage_devices",
            Self::ViewAttempts => "view_attempts",
            Self::RunCleanup => "run_cleanup",
        }
    }
}

/// The authenticated principal behind one request.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    /// Login name recorded on every mutation
    pub principal: String,
    /// Capabilities resolved by the access-control collaborator
    pub permissions: HashSet<Permission>,
    /// Operator's display locale
    pub locale: String,
}

impl OperatorContext {
    /// Context for `principal` holding the given permissions.
    #[must_use]
    pub fn new(principal: &str, permissions: HashSet<Permission>) -> Self {
        Self {
            principal: principal.to_string(),
            permissions,
            locale: "en".to_string(),
        }
    }

    /// True when the principal holds `permission`.
    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
