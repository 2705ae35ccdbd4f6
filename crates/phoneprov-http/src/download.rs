//! Token-gated config download.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use phoneprov_core::mac::MacAddr;
use phoneprov_db::DbError;
use serde::Deserialize;
use tracing::{error, info};

use crate::provision::{attachment, plain};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
    pub mac: Option<String>,
}

/// `GET /download?token=...&mac=...`
///
/// The token is consumed on the first accepted request; whether the body
/// is read afterwards does not matter.
pub async fn download(State(state): State<AppState>, Query(query): Query<DownloadQuery>) -> Response {
    let Some(secret) = query.token.as_deref() else {
        return plain(StatusCode::BAD_REQUEST, "missing token");
    };
    let mac = match query.mac.as_deref().map(MacAddr::parse).transpose() {
        Ok(mac) => mac,
        Err(_) => return plain(StatusCode::BAD_REQUEST, "invalid mac"),
    };

    let result = {
        let db = state.db.lock();
        db.redeem_and_render(secret, mac.as_ref())
    };

    match result {
        Ok((token, content)) => {
            info!(token_id = token.id, "Served token download");
            let filename = mac
                .as_ref()
                .map_or_else(|| "config.cfg".to_string(), MacAddr::config_filename);
            attachment(&filename, content)
        }
        Err(DbError::TokenDenied(reason)) => {
            info!(reason = reason.as_str(), "Refused token download");
            plain(StatusCode::FORBIDDEN, "forbidden")
        }
        Err(DbError::NotFound(what)) => {
            info!(what = %what, "Token download target missing");
            plain(StatusCode::NOT_FOUND, "not found")
        }
        Err(err) => {
            error!(%err, "Token download failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "server error")
        }
    }
}
