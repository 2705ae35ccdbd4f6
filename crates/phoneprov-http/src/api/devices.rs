//! Device, PABX, and device-type endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use phoneprov_core::device::{Device, DeviceType, Pabx};
use phoneprov_core::mac::MacAddr;
use phoneprov_core::version::{DeviceAssignment, HistoryEntry};
use phoneprov_core::Permission;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub mac: String,
    pub device_type_id: Option<i64>,
    pub pabx_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct VersionRef {
    pub version_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePabxRequest {
    pub name: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct CreateTypeRequest {
    pub name: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct UnassignResponse {
    pub removed: bool,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Device>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let db = state.db.lock();
    Ok(Json(db.list_devices()?))
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateDeviceRequest>,
) -> ApiResult<Json<Device>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let mac = MacAddr::parse(&req.mac)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let db = state.db.lock();
    let device = db.create_device(&req.name, &mac, req.device_type_id, req.pabx_id)?;
    db.append_audit(&ctx.principal, "device.create", "device", Some(device.id), None)?;
    Ok(Json(device))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Device>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let db = state.db.lock();
    let device = db
        .get_device(id)?
        .ok_or_else(|| ApiError::NotFound(format!("device {id}")))?;
    Ok(Json(device))
}

/// Link a version to a device without activating it.
pub async fn assign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<VersionRef>,
) -> ApiResult<Json<DeviceAssignment>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ActivateConfigs)?;

    let db = state.db.lock();
    let assignment = db.assign(&ctx.principal, id, req.version_id)?;
    let detail = serde_json::json!({ "version_id": req.version_id }).to_string();
    db.append_audit(&ctx.principal, "assignment.assign", "device", Some(id), Some(&detail))?;
    Ok(Json(assignment))
}

/// Make a version the device's single active config.
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<VersionRef>,
) -> ApiResult<Json<DeviceAssignment>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ActivateConfigs)?;

    let mut db = state.db.lock();
    db.activate(&ctx.principal, id, req.version_id)?;
    let detail = serde_json::json!({ "version_id": req.version_id }).to_string();
    db.append_audit(&ctx.principal, "assignment.activate", "device", Some(id), Some(&detail))?;
    let assignment = db
        .active_assignment(id)?
        .ok_or_else(|| ApiError::NotFound(format!("device {id} active assignment")))?;
    Ok(Json(assignment))
}

/// Remove every assignment link of the device; history stays.
pub async fn unassign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<UnassignResponse>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ActivateConfigs)?;

    let db = state.db.lock();
    let removed = db.unassign(id)?;
    db.append_audit(&ctx.principal, "assignment.unassign", "device", Some(id), None)?;
    Ok(Json(UnassignResponse { removed }))
}

pub async fn assignments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<DeviceAssignment>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ActivateConfigs)?;

    let db = state.db.lock();
    Ok(Json(db.assignments_for_device(id)?))
}

pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ActivateConfigs)?;

    let db = state.db.lock();
    Ok(Json(db.history_for_device(id)?))
}

pub async fn list_pabxes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Pabx>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let db = state.db.lock();
    Ok(Json(db.list_pabxes()?))
}

pub async fn create_pabx(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreatePabxRequest>,
) -> ApiResult<Json<Pabx>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let db = state.db.lock();
    let pabx = db.create_pabx(&req.name, &req.host, req.port)?;
    db.append_audit(&ctx.principal, "pabx.create", "pabx", Some(pabx.id), None)?;
    Ok(Json(pabx))
}

pub async fn list_types(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<DeviceType>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let db = state.db.lock();
    Ok(Json(db.list_device_types()?))
}

/// Map a model string to a new device type.
///
/// Devices reporting this model from now on classify themselves on their
/// next provisioning request.
pub async fn create_type(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateTypeRequest>,
) -> ApiResult<Json<DeviceType>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ManageDevices)?;

    let db = state.db.lock();
    let dtype = db.create_device_type(&req.name, &req.model)?;
    db.append_audit(&ctx.principal, "device_type.create", "device_type", Some(dtype.id), None)?;
    Ok(Json(dtype))
}

/// Model strings seen by provisioning that map to no device type.
pub async fn unmapped_models(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<String>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::ViewAttempts)?;

    let db = state.db.lock();
    Ok(Json(db.unmapped_models()?))
}
