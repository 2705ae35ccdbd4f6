//! Provisioning attempt and audit listings.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use phoneprov_core::Permission;
use phoneprov_core::provision::ProvisionAttempt;
use phoneprov_db::audit::AuditEntry;
use serde::Deserialize;

use crate::auth;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Most recent provisioning attempts, one row per (MAC, filename).
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ProvisionAttempt>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ViewAttempts)?;

    let limit = query.limit.unwrap_or(state.settings.list_limit);
    let db = state.db.lock();
    Ok(Json(db.list_attempts(limit)?))
}

pub async fn audit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ViewAttempts)?;

    let limit = query.limit.unwrap_or(state.settings.list_limit);
    let db = state.db.lock();
    Ok(Json(db.list_audit(limit)?))
}
