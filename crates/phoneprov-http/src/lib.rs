//! Phoneprov HTTP - axum surface for devices and operators.
//!
//! Three device-facing endpoints (config provisioning, staging bootstrap,
//! tokened download) plus the JSON operator API under `/api`. Handlers
//! are thin: authenticate, lock the store, call one store operation, map
//! the result onto HTTP.

pub mod api;
pub mod auth;
pub mod download;
pub mod error;
pub mod provision;
pub mod routes;
pub mod state;

pub use auth::AccessControl;
pub use routes::build_router;
pub use state::{AppState, ProvisionSettings};
