//! Config version endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use phoneprov_core::version::{ConfigVersion, VersionScope};
use phoneprov_core::Permission;
use serde::Deserialize;

use crate::auth;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub pabx_id: i64,
    pub device_type_id: i64,
    pub content: String,
    pub changelog: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub pabx_id: i64,
    pub device_type_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CopyRequest {
    pub changelog: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    pub cutoff_days: u32,
}

/// Create a version; its number is allocated within the scope.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateVersionRequest>,
) -> ApiResult<Json<ConfigVersion>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let scope = VersionScope { pabx_id: req.pabx_id, device_type_id: req.device_type_id };
    let version = db.create_version(&ctx.principal, scope, &req.content, req.changelog.as_deref())?;
    db.append_audit(&ctx.principal, "version.create", "config_version", Some(version.id), None)?;
    Ok(Json(version))
}

/// List the versions of one scope, newest first.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Json<Vec<ConfigVersion>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let versions =
        db.list_versions(VersionScope { pabx_id: scope.pabx_id, device_type_id: scope.device_type_id })?;
    Ok(Json(versions))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<ConfigVersion>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let version = db
        .get_version(id)?
        .ok_or_else(|| crate::error::ApiError::NotFound(format!("config version {id}")))?;
    Ok(Json(version))
}

/// Clone a version into its scope under a fresh number.
pub async fn copy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<CopyRequest>,
) -> ApiResult<Json<ConfigVersion>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageVersions)?;

    let db = state.db.lock();
    let version = db.copy_version(&ctx.principal, id, req.changelog.as_deref())?;
    db.append_audit(&ctx.principal, "version.copy", "config_version", Some(version.id), None)?;
    Ok(Json(version))
}

/// Delete old versions that are active for no device.
pub async fn cleanup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CleanupRequest>,
) -> ApiResult<Json<phoneprov_db::versions::CleanupReport>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::RunCleanup)?;

    let mut db = state.db.lock();
    let report = db.cleanup_versions(&ctx.principal, req.cutoff_days)?;
    Ok(Json(report))
}
