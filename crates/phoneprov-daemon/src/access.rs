//! Config-backed operator access control.

use std::collections::{HashMap, HashSet};

use phoneprov_core::{OperatorContext, Permission};
use phoneprov_http::AccessControl;
use tracing::warn;

use crate::config::OperatorEntry;

struct Account {
    secret: String,
    permissions: HashSet<Permission>,
}

/// Operator table loaded once from the daemon configuration.
pub struct StaticAccessControl {
    accounts: HashMap<String, Account>,
}

impl StaticAccessControl {
    /// Build the table from config entries. Entries without a secret are
    /// skipped so an account can never be reachable with empty credentials.
    #[must_use]
    pub fn from_entries(entries: &[OperatorEntry]) -> Self {
        let mut accounts = HashMap::new();
        for entry in entries {
            if entry.secret.is_empty() {
                warn!(name = %entry.name, "Skipping operator with empty secret");
                continue;
            }
            accounts.insert(
                entry.name.clone(),
                Account {
                    secret: entry.secret.clone(),
                    permissions: entry.permissions.iter().copied().collect(),
                },
            );
        }
        Self { accounts }
    }

    /// Number of usable accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl AccessControl for StaticAccessControl {
    fn authorize(&self, principal: &str, secret: &str) -> Option<OperatorContext> {
        let account = self.accounts.get(principal)?;
        if account.secret != secret {
            return None;
        }
        Some(OperatorContext::new(principal, account.permissions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, secret: &str, permissions: Vec<Permission>) -> OperatorEntry {
        OperatorEntry { name: name.to_string(), secret: secret.to_string(), permissions }
    }

    #[test]
    fn test_authorize_checks_secret_and_grants_permissions() {
        let access = StaticAccessControl::from_entries(&[entry(
            "admin",
            "s3cret",
            vec![Permission::ManageVersions],
        )]);

        let ctx = access.authorize("admin", "s3cret").expect("Authorization failed");
        assert!(ctx.allows(Permission::ManageVersions));
        assert!(!ctx.allows(Permission::BulkMutate));

        assert!(access.authorize("admin", "wrong").is_none());
        assert!(access.authorize("nobody", "s3cret").is_none());
    }

    #[test]
    fn test_empty_secret_entries_are_unusable() {
        let access =
            StaticAccessControl::from_entries(&[entry("ghost", "", vec![Permission::RunCleanup])]);

        assert!(access.is_empty());
        assert!(access.authorize("ghost", "").is_none());
    }
}
