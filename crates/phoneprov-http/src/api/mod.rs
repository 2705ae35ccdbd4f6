//! Operator API route handlers.
//!
//! JSON over `/api/...`, consumed by the admin frontend. Every handler
//! resolves an operator context through the access-control collaborator
//! and checks one permission; mutations append an audit entry.

pub mod attempts;
pub mod bulk;
pub mod devices;
pub mod tokens;
pub mod variables;
pub mod versions;

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::state::AppState;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Config versions and retention
        .route("/versions", post(versions::create).get(versions::list))
        .route("/versions/{id}", get(versions::get))
        .route("/versions/{id}/copy", post(versions::copy))
        .route("/cleanup", post(versions::cleanup))
        // Devices and assignment lifecycle
        .route("/devices", get(devices::list).post(devices::create))
        .route("/devices/{id}", get(devices::get))
        .route("/devices/{id}/assign", post(devices::assign))
        .route("/devices/{id}/activate", post(devices::activate))
        .route("/devices/{id}/unassign", post(devices::unassign))
        .route("/devices/{id}/assignments", get(devices::assignments))
        .route("/devices/{id}/history", get(devices::history))
        // PABXes and device types
        .route("/pabxes", get(devices::list_pabxes).post(devices::create_pabx))
        .route("/device-types", get(devices::list_types).post(devices::create_type))
        .route("/models/unmapped", get(devices::unmapped_models))
        // Bulk find/replace
        .route("/bulk", get(bulk::list))
        .route("/bulk/preview", post(bulk::preview))
        .route("/bulk/execute", post(bulk::execute))
        .route("/bulk/{id}", get(bulk::get))
        .route("/bulk/{id}/rollback", post(bulk::rollback))
        // Download tokens
        .route("/tokens", get(tokens::list).post(tokens::mint))
        .route("/tokens/{id}", delete(tokens::revoke))
        // Variables, templates, and preview
        .route("/variables", get(variables::list))
        .route("/variables/{key}", put(variables::set).delete(variables::remove))
        .route("/templates", get(variables::list_templates).post(variables::create_template))
        .route("/templates/{id}", get(variables::get_template).put(variables::update_template))
        .route(
            "/templates/{id}/variables",
            get(variables::list_declarations).put(variables::save_declaration),
        )
        .route("/preview", post(variables::preview))
        // Operational visibility
        .route("/attempts", get(attempts::list))
        .route("/audit", get(attempts::audit))
}
