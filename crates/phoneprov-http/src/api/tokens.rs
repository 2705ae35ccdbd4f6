//! Download token endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use phoneprov_core::Permission;
use phoneprov_core::mac::MacAddr;
use phoneprov_core::token::DownloadToken;
use serde::Deserialize;

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MintRequest {
    pub version_id: i64,
    /// When set, redemption must present this MAC.
    pub mac: Option<String>,
    /// Model hint merged into the device tier at redemption.
    pub device_model: Option<String>,
    pub ttl_secs: Option<u32>,
}

/// Mint a single-use download token. The response is the only place the
/// secret is ever returned.
pub async fn mint(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MintRequest>,
) -> ApiResult<Json<DownloadToken>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::MintTokens)?;

    let mac = match &req.mac {
        Some(raw) => Some(
            MacAddr::parse(raw).map_err(|err| ApiError::BadRequest(err.to_string()))?,
        ),
        None => None,
    };
    let ttl = req.ttl_secs.unwrap_or(state.settings.token_ttl_secs);

    let db = state.db.lock();
    let token = db.mint_token(
        &ctx.principal,
        req.version_id,
        mac.as_ref(),
        req.device_model.as_deref(),
        ttl,
    )?;
    db.append_audit(&ctx.principal, "token.mint", "download_token", Some(token.id), None)?;
    Ok(Json(token))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<DownloadToken>>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::MintTokens)?;

    let db = state.db.lock();
    Ok(Json(db.list_tokens()?))
}

/// Delete an unredeemed token. Redeemed tokens stay as usage evidence.
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = auth::operator(&state, &headers)?;
    auth::require(&ctx, Permission::MintTokens)?;

    let db = state.db.lock();
    db.revoke_token(id)?;
    db.append_audit(&ctx.principal, "token.revoke", "download_token", Some(id), None)?;
    Ok(Json(serde_json::json!({ "revoked": true })))
}
