//! Router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{api, download, provision};

/// Build the complete application router.
///
/// Device-facing surfaces live at the root; the operator API is nested
/// under `/api`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/provision/config", get(provision::by_query))
        .route("/provision/{filename}", get(provision::by_filename))
        .route("/staging/{filename}", get(provision::staging))
        .route("/download", get(download::download))
        .nest("/api", api::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use phoneprov_core::mac::MacAddr;
    use phoneprov_core::provision::ProvisionStatus;
    use phoneprov_core::version::VersionScope;
    use phoneprov_core::{OperatorContext, Permission};
    use phoneprov_db::Database;
    use tower::util::ServiceExt;

    use super::*;
    use crate::auth::{MockAccessControl, PRINCIPAL_HEADER, SECRET_HEADER};
    use crate::state::ProvisionSettings;

    const PHONE_UA: &str = "Yealink SIP-T46G 28.35.0.75";

    fn all_permissions() -> HashSet<Permission> {
        HashSet::from([
            Permission::ManageVersions,
            Permission::ActivateConfigs,
            Permission::BulkMutate,
            Permission::MintTokens,
            Permission::ManageVariables,
            Permission::ManageDevices,
            Permission::ViewAttempts,
            Permission::RunCleanup,
        ])
    }

    fn granting(permissions: HashSet<Permission>) -> Arc<MockAccessControl> {
        let mut access = MockAccessControl::new();
        access.expect_authorize().returning(move |principal, _| {
            Some(OperatorContext::new(principal, permissions.clone()))
        });
        Arc::new(access)
    }

    fn denying() -> Arc<MockAccessControl> {
        let mut access = MockAccessControl::new();
        access.expect_authorize().returning(|_, _| None);
        Arc::new(access)
    }

    fn test_state(settings: ProvisionSettings, access: Arc<MockAccessControl>) -> AppState {
        let db = Database::open_in_memory().expect("Failed to open store");
        AppState::new(db, settings, access)
    }

    /// Seed a pabx, device type, device, and one activated version.
    fn seed_active_device(state: &AppState, mac_raw: &str, content: &str) -> (i64, i64) {
        let mac = MacAddr::parse(mac_raw).expect("Failed to parse MAC");
        let mut db = state.db.lock();
        let pabx = db.create_pabx("main", "pbx.example", 5060).expect("Failed to create pabx");
        let dtype = db
            .create_device_type("Yealink T46", "Yealink SIP-T46G")
            .expect("Failed to create device type");
        let device = db
            .create_device("desk-1", &mac, Some(dtype.id), Some(pabx.id))
            .expect("Failed to create device");
        let version = db
            .create_version(
                "ops",
                VersionScope { pabx_id: pabx.id, device_type_id: dtype.id },
                content,
                None,
            )
            .expect("Failed to create version");
        db.activate("ops", device.id, version.id).expect("Failed to activate version");
        (device.id, version.id)
    }

    fn get_request(uri: &str, agent: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(agent) = agent {
            builder = builder.header("user-agent", agent);
        }
        builder.body(Body::empty()).expect("Failed to build request")
    }

    fn api_request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(PRINCIPAL_HEADER, "ops")
            .header(SECRET_HEADER, "request-secret");
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request")
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    }

    #[tokio::test]
    async fn test_provision_serves_rendered_config() {
        let state = test_state(ProvisionSettings::default(), denying());
        seed_active_device(&state, "001565AABB01", "server = {{PABX_HOST}}\r\nmac = {{PHONE_MAC}}\r\n");

        let response = build_router(state.clone())
            .oneshot(get_request("/provision/001565aabb01.cfg", Some(PHONE_UA)))
            .await
            .expect("Failed to run request");

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        assert_eq!(disposition.as_deref(), Some("attachment; filename=\"001565aabb01.cfg\""));
        assert_eq!(body_string(response).await, "server=pbx.example\nmac=00:15:65:AA:BB:01\n");

        let db = state.db.lock();
        let attempt = db
            .get_attempt("001565AABB01", "001565aabb01.cfg")
            .expect("Failed to load attempt")
            .expect("Attempt row missing");
        assert_eq!(attempt.last_status, ProvisionStatus::Success);
        assert_eq!(attempt.last_model.as_deref(), Some("Yealink SIP-T46G"));
    }

    #[tokio::test]
    async fn test_provision_by_query_records_under_config() {
        let state = test_state(ProvisionSettings::default(), denying());
        seed_active_device(&state, "001565AABB01", "name = {{PHONE_NAME}}\n");

        let response = build_router(state.clone())
            .oneshot(get_request("/provision/config?mac=00:15:65:aa:bb:01", Some(PHONE_UA)))
            .await
            .expect("Failed to run request");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "name=desk-1\n");

        let db = state.db.lock();
        let attempt = db
            .get_attempt("001565AABB01", "config")
            .expect("Failed to load attempt")
            .expect("Attempt row missing");
        assert_eq!(attempt.last_status, ProvisionStatus::Success);
    }

    #[tokio::test]
    async fn test_provision_unknown_device_counts_attempts() {
        let state = test_state(ProvisionSettings::default(), denying());

        for _ in 0..2 {
            let response = build_router(state.clone())
                .oneshot(get_request("/provision/001565ffff99.cfg", Some(PHONE_UA)))
                .await
                .expect("Failed to run request");
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let db = state.db.lock();
        let attempt = db
            .get_attempt("001565FFFF99", "001565ffff99.cfg")
            .expect("Failed to load attempt")
            .expect("Attempt row missing");
        assert_eq!(attempt.last_status, ProvisionStatus::DeviceNotFound);
        assert_eq!(attempt.attempt_count, 2);
    }

    #[tokio::test]
    async fn test_provision_blocks_foreign_user_agent() {
        let settings = ProvisionSettings {
            test_token: Some("letmein".to_string()),
            ..ProvisionSettings::default()
        };
        let state = test_state(settings, denying());
        seed_active_device(&state, "001565AABB01", "mac = {{PHONE_MAC_PLAIN}}\n");

        let response = build_router(state.clone())
            .oneshot(get_request("/provision/001565aabb01.cfg", Some("curl/8.5.0")))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        {
            let db = state.db.lock();
            let attempt = db
                .get_attempt("001565AABB01", "001565aabb01.cfg")
                .expect("Failed to load attempt")
                .expect("Attempt row missing");
            assert_eq!(attempt.last_status, ProvisionStatus::BlockedUserAgent);
        }

        // The test token bypasses the allowlist.
        let response = build_router(state.clone())
            .oneshot(get_request(
                "/provision/001565aabb01.cfg?allow_test=letmein",
                Some("curl/8.5.0"),
            ))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "mac=001565AABB01\n");
    }

    #[tokio::test]
    async fn test_provision_invalid_filename_is_bad_request() {
        let state = test_state(ProvisionSettings::default(), denying());

        let response = build_router(state.clone())
            .oneshot(get_request("/provision/frontdesk.cfg", Some(PHONE_UA)))
            .await
            .expect("Failed to run request");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let db = state.db.lock();
        let attempt = db
            .get_attempt("FDECF", "frontdesk.cfg")
            .expect("Failed to load attempt")
            .expect("Attempt row missing");
        assert_eq!(attempt.last_status, ProvisionStatus::InvalidMac);
    }

    #[tokio::test]
    async fn test_download_token_is_single_use() {
        let state = test_state(ProvisionSettings::default(), denying());
        let (_, version_id) = seed_active_device(&state, "001565AABB01", "ntp = {{NTP_SERVER}}\n");
        let secret = {
            let db = state.db.lock();
            db.set_variable("NTP_SERVER", "pool.ntp.example", None)
                .expect("Failed to set variable");
            db.mint_token("ops", version_id, None, None, 3600)
                .expect("Failed to mint token")
                .token
        };

        let uri = format!("/download?token={secret}");
        let response = build_router(state.clone())
            .oneshot(get_request(&uri, None))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ntp=pool.ntp.example\n");

        let response = build_router(state.clone())
            .oneshot(get_request(&uri, None))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_download_without_token_is_bad_request() {
        let state = test_state(ProvisionSettings::default(), denying());

        let response = build_router(state)
            .oneshot(get_request("/download", None))
            .await
            .expect("Failed to run request");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_rejects_unknown_operator() {
        let state = test_state(ProvisionSettings::default(), denying());

        let response = build_router(state.clone())
            .oneshot(api_request("GET", "/api/devices", None))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["code"], "FORBIDDEN");

        // Missing headers fail the same way.
        let response = build_router(state)
            .oneshot(get_request("/api/devices", None))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_api_enforces_per_topic_permission() {
        let state = test_state(
            ProvisionSettings::default(),
            granting(HashSet::from([Permission::ViewAttempts])),
        );

        let response = build_router(state.clone())
            .oneshot(api_request(
                "POST",
                "/api/versions",
                Some(serde_json::json!({
                    "pabx_id": 1, "device_type_id": 1, "content": "a=1\n"
                })),
            ))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = build_router(state)
            .oneshot(api_request("GET", "/api/attempts", None))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_device_create_appends_audit() {
        let state = test_state(ProvisionSettings::default(), granting(all_permissions()));

        let response = build_router(state.clone())
            .oneshot(api_request(
                "POST",
                "/api/devices",
                Some(serde_json::json!({ "name": "desk-9", "mac": "00:15:65:AA:BB:09" })),
            ))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::OK);
        let device = body_json(response).await;
        assert_eq!(device["mac"], "001565AABB09");

        let response = build_router(state.clone())
            .oneshot(api_request("GET", "/api/devices", None))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let db = state.db.lock();
        let audit = db.list_audit(10).expect("Failed to list audit");
        assert!(audit.iter().any(|entry| entry.action == "device.create" && entry.actor == "ops"));
    }

    #[tokio::test]
    async fn test_api_bad_mac_is_rejected() {
        let state = test_state(ProvisionSettings::default(), granting(all_permissions()));

        let response = build_router(state)
            .oneshot(api_request(
                "POST",
                "/api/devices",
                Some(serde_json::json!({ "name": "desk-9", "mac": "zz:15:65:AA:BB:09" })),
            ))
            .await
            .expect("Failed to run request");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_staging_serves_rendered_bootstrap() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("bootstrap.cfg"), "ntp = {{NTP_SERVER}}\r\n\r\n")
            .expect("Failed to write artifact");
        let settings = ProvisionSettings {
            artifact_dir: dir.path().to_path_buf(),
            ..ProvisionSettings::default()
        };
        let state = test_state(settings, denying());
        state
            .db
            .lock()
            .set_variable("NTP_SERVER", "pool.ntp.example", None)
            .expect("Failed to set variable");

        let credentials = STANDARD.encode("provision:");
        let request = Request::builder()
            .uri("/staging/bootstrap.cfg")
            .header("user-agent", PHONE_UA)
            .header("authorization", format!("Basic {credentials}"))
            .body(Body::empty())
            .expect("Failed to build request");
        let response = build_router(state.clone())
            .oneshot(request)
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ntp=pool.ntp.example\n");

        // No credentials: challenge instead of content.
        let response = build_router(state.clone())
            .oneshot(get_request("/staging/bootstrap.cfg", Some(PHONE_UA)))
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));

        // Allowlisted names only, even with credentials.
        let request = Request::builder()
            .uri("/staging/secret.cfg")
            .header("user-agent", PHONE_UA)
            .header("authorization", format!("Basic {credentials}"))
            .body(Body::empty())
            .expect("Failed to build request");
        let response = build_router(state)
            .oneshot(request)
            .await
            .expect("Failed to run request");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
