//! Device-facing provisioning endpoints.
//!
//! Every request that presents a MAC leaves exactly one attempt row
//! behind, whatever the outcome. Responses are plain text with short
//! bodies; rendered configs are streamed as attachments named after the
//! device MAC.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use phoneprov_core::mac::MacAddr;
use phoneprov_core::normalize::normalize;
use phoneprov_core::provision::{self, ProvisionStatus};
use phoneprov_core::template::render;
use phoneprov_db::Database;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::auth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProvisionQuery {
    pub mac: Option<String>,
    pub allow_test: Option<String>,
}

/// Build a plain-text response.
pub(crate) fn plain(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// Stream rendered content as a named attachment.
pub(crate) fn attachment(filename: &str, content: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        content,
    )
        .into_response()
}

fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::USER_AGENT)?.to_str().ok()
}

fn record(db: &Database, mac: &str, filename: &str, status: ProvisionStatus, model: Option<&str>) {
    if let Err(err) = db.record_attempt(mac, filename, status, model) {
        warn!(%err, mac, filename, "Failed to record provisioning attempt");
    }
}

/// `GET /provision/{mac}.cfg`
pub async fn by_filename(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ProvisionQuery>,
    headers: HeaderMap,
) -> Response {
    match MacAddr::from_config_filename(&filename) {
        Some(mac) => serve_config(&state, &mac, &filename, &headers, query.allow_test.as_deref()),
        None => {
            let db = state.db.lock();
            record(
                &db,
                &provision::attempt_mac_key(&filename),
                &filename,
                ProvisionStatus::InvalidMac,
                user_agent(&headers).and_then(provision::model_from_user_agent).as_deref(),
            );
            plain(StatusCode::BAD_REQUEST, "invalid mac")
        }
    }
}

/// `GET /provision/config?mac=...`
pub async fn by_query(
    State(state): State<AppState>,
    Query(query): Query<ProvisionQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(raw) = query.mac.as_deref() else {
        return plain(StatusCode::BAD_REQUEST, "missing mac");
    };
    match MacAddr::parse(raw) {
        Ok(mac) => serve_config(&state, &mac, "config", &headers, query.allow_test.as_deref()),
        Err(_) => {
            let db = state.db.lock();
            record(
                &db,
                &provision::attempt_mac_key(raw),
                "config",
                ProvisionStatus::InvalidMac,
                user_agent(&headers).and_then(provision::model_from_user_agent).as_deref(),
            );
            plain(StatusCode::BAD_REQUEST, "invalid mac")
        }
    }
}

fn serve_config(
    state: &AppState,
    mac: &MacAddr,
    filename: &str,
    headers: &HeaderMap,
    allow_test: Option<&str>,
) -> Response {
    let settings = &state.settings;
    let agent = user_agent(headers);
    let model = agent.and_then(provision::model_from_user_agent);
    let bypass = matches!(
        (allow_test, &settings.test_token),
        (Some(given), Some(expected)) if given == expected
    );

    let db = state.db.lock();

    if !bypass && !provision::is_device_user_agent(agent.unwrap_or(""), &settings.allowed_agents)
    {
        info!(mac = mac.as_plain(), agent, "Blocked non-device user agent");
        record(&db, mac.as_plain(), filename, ProvisionStatus::BlockedUserAgent, model.as_deref());
        return plain(StatusCode::FORBIDDEN, "forbidden");
    }

    let device = match db.find_active_device(mac) {
        Ok(Some(device)) => device,
        Ok(None) => {
            record(&db, mac.as_plain(), filename, ProvisionStatus::DeviceNotFound, model.as_deref());
            return plain(StatusCode::NOT_FOUND, "unknown device");
        }
        Err(err) => {
            error!(%err, mac = mac.as_plain(), "Device lookup failed");
            record(&db, mac.as_plain(), filename, ProvisionStatus::ServerError, model.as_deref());
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "server error");
        }
    };

    if let Some(model) = &model
        && let Err(err) = db.observe_device_model(device.id, model)
    {
        warn!(%err, device_id = device.id, "Failed to note device model");
    }

    match db.render_device_config(&device) {
        Ok(Some(content)) => {
            record(&db, mac.as_plain(), filename, ProvisionStatus::Success, model.as_deref());
            attachment(&mac.config_filename(), content)
        }
        Ok(None) => {
            record(&db, mac.as_plain(), filename, ProvisionStatus::NoActiveConfig, model.as_deref());
            plain(StatusCode::NOT_FOUND, "no active config")
        }
        Err(err) => {
            error!(%err, device_id = device.id, "Config render failed");
            record(&db, mac.as_plain(), filename, ProvisionStatus::ServerError, model.as_deref());
            plain(StatusCode::INTERNAL_SERVER_ERROR, "server error")
        }
    }
}

/// `GET /staging/{filename}`
///
/// Pre-identity bootstrap: shared Basic credentials, a filename allowlist,
/// and shared certificate blobs from the artifact directory. Bootstrap
/// configs are rendered with the global variable tier; certificates are
/// passed through untouched.
pub async fn staging(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ProvisionQuery>,
    headers: HeaderMap,
) -> Response {
    let settings = &state.settings;

    let authorized = auth::basic_credentials(&headers).is_some_and(|(user, pass)| {
        user == settings.staging_user && pass == settings.staging_pass
    });
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"provisioning\"")],
            "unauthorized",
        )
            .into_response();
    }

    let bypass = matches!(
        (query.allow_test.as_deref(), &settings.test_token),
        (Some(given), Some(expected)) if given == expected
    );
    let agent = user_agent(&headers);
    if !bypass && !provision::is_device_user_agent(agent.unwrap_or(""), &settings.allowed_agents)
    {
        info!(filename, agent, "Blocked non-device user agent on staging");
        return plain(StatusCode::FORBIDDEN, "forbidden");
    }

    if !settings.staging_files.iter().any(|name| name == &filename) {
        return plain(StatusCode::NOT_FOUND, "not found");
    }

    let path = settings.artifact_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, ?path, "Staging artifact missing");
            return plain(StatusCode::NOT_FOUND, "not found");
        }
    };

    if filename.ends_with(".cfg") {
        let Ok(text) = String::from_utf8(bytes) else {
            error!(?path, "Staging config is not valid UTF-8");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "server error");
        };
        let rendered = {
            let db = state.db.lock();
            match db.global_tier() {
                Ok(vars) => normalize(&render(&text, &vars)),
                Err(err) => {
                    error!(%err, "Variable lookup failed");
                    return plain(StatusCode::INTERNAL_SERVER_ERROR, "server error");
                }
            }
        };
        attachment(&filename, rendered)
    } else {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/x-pem-file".to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
            ],
            bytes,
        )
            .into_response()
    }
}
