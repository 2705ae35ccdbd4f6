//! Bulk search-and-replace endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use phoneprov_core::Permission;
use phoneprov_core::bulk::{BulkOperation, BulkOperationDetail, ExecuteReport, PreviewReport};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub search: String,
    /// Caps how many per-device hits the report lists, not the totals.
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub search: String,
    pub replace: String,
    /// Caps how many devices are mutated; the rest report as remaining.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RollbackResponse {
    pub restored: usize,
}

#[derive(Debug, Serialize)]
pub struct OperationView {
    pub operation: BulkOperation,
    pub details: Vec<BulkOperationDetail>,
}

pub async fn preview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewReport>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::BulkMutate)?;

    let db = state.db.lock();
    Ok(Json(db.bulk_preview(&req.search, req.limit)?))
}

pub async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecuteReport>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::BulkMutate)?;

    let mut db = state.db.lock();
    let report = db.bulk_execute(&ctx.principal, &req.search, &req.replace, req.limit)?;
    let detail = serde_json::json!({
        "search": req.search,
        "replace": req.replace,
        "mutated": report.mutated.len(),
        "remaining": report.remaining,
    })
    .to_string();
    db.append_audit(
        &ctx.principal,
        "bulk.execute",
        "bulk_operation",
        Some(report.operation_id),
        Some(&detail),
    )?;
    Ok(Json(report))
}

pub async fn rollback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<RollbackResponse>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::BulkMutate)?;

    let mut db = state.db.lock();
    let restored = db.bulk_rollback(&ctx.principal, id)?;
    db.append_audit(&ctx.principal, "bulk.rollback", "bulk_operation", Some(id), None)?;
    Ok(Json(RollbackResponse { restored }))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<BulkOperation>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::BulkMutate)?;

    let db = state.db.lock();
    Ok(Json(db.list_bulk_operations()?))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<OperationView>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::BulkMutate)?;

    let db = state.db.lock();
    let operation = db
        .get_bulk_operation(id)?
        .ok_or_else(|| ApiError::NotFound(format!("bulk operation {id}")))?;
    let details = db.operation_details(id)?;
    Ok(Json(OperationView { operation, details }))
}
