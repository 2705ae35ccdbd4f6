//! Shared request state.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use phoneprov_db::Database;

use crate::auth::AccessControl;

/// Provisioning behavior knobs, mapped from the daemon configuration.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Shared HTTP Basic username for the staging endpoint
    pub staging_user: String,
    /// Shared HTTP Basic password for the staging endpoint
    pub staging_pass: String,
    /// Filenames the staging endpoint is allowed to serve
    pub staging_files: Vec<String>,
    /// Directory holding the staging artifacts
    pub artifact_dir: PathBuf,
    /// Secret for the `allow_test` user-agent bypass; disabled when unset
    pub test_token: Option<String>,
    /// Vendor substrings recognized as device user agents
    pub allowed_agents: Vec<String>,
    /// Default lifetime of minted download tokens
    pub token_ttl_secs: u32,
    /// Default page size for attempt and audit listings
    pub list_limit: usize,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            staging_user: "provision".to_string(),
            staging_pass: String::new(),
            staging_files: vec![
                "bootstrap.cfg".to_string(),
                "ca.pem".to_string(),
                "server.pem".to_string(),
            ],
            artifact_dir: PathBuf::from("/var/lib/phoneprov/artifacts"),
            test_token: None,
            allowed_agents: vec![
                "Yealink".to_string(),
                "snom".to_string(),
                "Polycom".to_string(),
                "Cisco".to_string(),
                "Grandstream".to_string(),
            ],
            token_ttl_secs: 3600,
            list_limit: 200,
        }
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Store handle; the mutex serializes writers
    pub db: Arc<Mutex<Database>>,
    /// Provisioning settings
    pub settings: Arc<ProvisionSettings>,
    /// Operator access-control collaborator
    pub access: Arc<dyn AccessControl>,
}

impl AppState {
    /// Bundle a store, settings, and access control into shared state.
    #[must_use]
    pub fn new(db: Database, settings: ProvisionSettings, access: Arc<dyn AccessControl>) -> Self {
        Self { db: Arc::new(Mutex::new(db)), settings: Arc::new(settings), access }
    }
}
