use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use commsync_core::auth::{AuthWebhookRequest, AuthWebhookResponse, PermissionGrant};
use commsync_core::sync::{CLIENT_ID_HEADER, LEGACY_CLIENT_ID_HEADER};
use commsync_core::util::{normalize_text_option, unix_timestamp_now, user_fingerprint};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthBackend, BackendError};
use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    backend: Option<AuthBackend>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, BackendError> {
        let backend = AuthBackend::from_config(&config)?;
        Ok(Self::with_backend(config, backend))
    }

    pub const fn with_backend(config: Arc<AppConfig>, backend: Option<AuthBackend>) -> Self {
        Self { config, backend }
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/sync/auth", post(sync_auth))
        .route("/", post(sync_auth))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    HeaderName::from_static("x-client-info"),
                    HeaderName::from_static("apikey"),
                    header::CONTENT_TYPE,
                    HeaderName::from_static(CLIENT_ID_HEADER),
                    HeaderName::from_static(LEGACY_CLIENT_ID_HEADER),
                ]),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    supabase_configured: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: unix_timestamp_now(),
        supabase_configured: state.backend.is_some(),
    })
}

async fn sync_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AuthWebhookResponse>, AppError> {
    let Some(backend) = state.backend.as_ref() else {
        tracing::error!(endpoint = "sync_auth", "Supabase credentials are not configured");
        return Err(AppError::Config);
    };

    let request: AuthWebhookRequest = serde_json::from_slice(&body)
        .map_err(|error| AppError::internal(format!("invalid request body: {error}")))?;
    let token = normalize_text_option(request.token).ok_or(AppError::MissingToken)?;
    let client_id = request_client_id(request.client_id, &headers);

    let user = backend.identity.verify_token(&token).await.map_err(|error| {
        tracing::warn!(endpoint = "sync_auth", "Token verification failed: {}", error);
        AppError::InvalidToken
    })?;

    let user_hash = user_fingerprint(&user.user_id);
    let memberships = backend
        .memberships
        .memberships_for(&user.user_id)
        .await
        .map_err(|error| {
            tracing::error!(
                endpoint = "sync_auth",
                user = user_hash,
                "Membership lookup failed: {}",
                error
            );
            AppError::MembershipLookup
        })?;

    let grant =
        PermissionGrant::for_memberships(user.user_id, &memberships, unix_timestamp_now());
    tracing::info!(
        endpoint = "sync_auth",
        user = user_hash,
        client_id = client_id.as_deref().unwrap_or("none"),
        tenants = memberships.len(),
        expires_at = grant.expires_at,
        "Issued sync permission grant"
    );
    Ok(Json(AuthWebhookResponse::granted(grant)))
}

/// Client id from the body, then the current header, then the legacy one.
fn request_client_id(body_client_id: Option<String>, headers: &HeaderMap) -> Option<String> {
    normalize_text_option(body_client_id).or_else(|| {
        [CLIENT_ID_HEADER, LEGACY_CLIENT_ID_HEADER]
            .into_iter()
            .find_map(|name| {
                let value = headers.get(name)?.to_str().ok()?;
                normalize_text_option(Some(value.to_string()))
            })
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use commsync_core::auth::{MemberRole, TenantMembership, GRANT_TTL_SECONDS};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{IdentityVerifier, MembershipStore, VerifiedUser};

    struct FakeIdentity;

    #[async_trait]
    impl IdentityVerifier for FakeIdentity {
        async fn verify_token(&self, token: &str) -> Result<VerifiedUser, BackendError> {
            match token.strip_prefix("token-for-") {
                Some(user_id) => Ok(VerifiedUser {
                    user_id: user_id.to_string(),
                }),
                None => Err(BackendError::Status {
                    status: 401,
                    body: "invalid JWT".to_string(),
                }),
            }
        }
    }

    struct FakeMemberships(HashMap<&'static str, Vec<TenantMembership>>);

    #[async_trait]
    impl MembershipStore for FakeMemberships {
        async fn memberships_for(
            &self,
            user_id: &str,
        ) -> Result<Vec<TenantMembership>, BackendError> {
            self.0
                .get(user_id)
                .cloned()
                .ok_or_else(|| BackendError::Http("connection refused".to_string()))
        }
    }

    fn config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            supabase: None,
            http_timeout: Duration::from_secs(1),
        })
    }

    fn app() -> Router {
        let memberships = HashMap::from([
            ("board-user", vec![TenantMembership::new("T", MemberRole::Board)]),
            (
                "mixed-user",
                vec![
                    TenantMembership::new("A", MemberRole::Admin),
                    TenantMembership::new("B", MemberRole::Member),
                ],
            ),
            ("lonely-user", Vec::new()),
        ]);
        let backend = AuthBackend {
            identity: Arc::new(FakeIdentity),
            memberships: Arc::new(FakeMemberships(memberships)),
        };
        app_router(AppState::with_backend(config(), Some(backend)))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (status, body) = send(app(), post_json("/v1/sync/auth", r#"{"clientId":"c"}"#)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({"authenticated": false, "error": "No token provided"})
        );

        let (status, _) = send(
            app(),
            post_json("/v1/sync/auth", r#"{"token":"","clientId":"c"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn board_member_receives_scoped_grant() {
        let before = Utc::now().timestamp();
        let (status, body) = send(
            app(),
            post_json(
                "/v1/sync/auth",
                r#"{"token":"token-for-board-user","clientId":"c"}"#,
            ),
        )
        .await;
        let after = Utc::now().timestamp();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authenticated"], json!(true));
        assert_eq!(body["userId"], json!("board-user"));
        assert_eq!(body["permissions"]["read"], json!(["T:*"]));
        assert_eq!(
            body["permissions"]["write"],
            json!([
                "T:crm",
                "T:events",
                "T:financial",
                "T:governance",
                "T:projects",
                "T:rostering"
            ])
        );
        let expires_at = body["expiresAt"].as_i64().unwrap();
        assert!(expires_at >= before + GRANT_TTL_SECONDS);
        assert!(expires_at <= after + GRANT_TTL_SECONDS);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn admin_and_member_grants_on_root_path() {
        let (status, body) = send(
            app(),
            post_json("/", r#"{"token":"token-for-mixed-user","clientId":"c"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["permissions"]["read"], json!(["A:*", "B:*"]));
        assert_eq!(
            body["permissions"]["write"],
            json!(["A:*", "B:crm", "B:events", "B:rostering"])
        );
    }

    #[tokio::test]
    async fn user_without_memberships_gets_empty_grant() {
        let (status, body) = send(
            app(),
            post_json("/v1/sync/auth", r#"{"token":"token-for-lonely-user"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["permissions"], json!({"read": [], "write": []}));
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let (status, body) = send(
            app(),
            post_json("/v1/sync/auth", r#"{"token":"forged","clientId":"c"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], json!("Invalid or expired token"));
    }

    #[tokio::test]
    async fn membership_failure_is_server_error() {
        let (status, body) = send(
            app(),
            post_json("/v1/sync/auth", r#"{"token":"token-for-ghost","clientId":"c"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"authenticated": false, "error": "Failed to verify permissions"})
        );
    }

    #[tokio::test]
    async fn missing_credentials_is_configuration_error() {
        let app = app_router(AppState::with_backend(config(), None));
        let (status, body) = send(
            app,
            post_json("/v1/sync/auth", r#"{"token":"token-for-board-user"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Server configuration error"));
    }

    #[tokio::test]
    async fn malformed_body_is_internal_error() {
        let (status, body) = send(app(), post_json("/v1/sync/auth", "not json")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"authenticated": false, "error": "Internal server error"})
        );
    }

    #[tokio::test]
    async fn preflight_allows_sync_headers() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/v1/sync/auth")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .header(
                "access-control-request-headers",
                "content-type,x-sync-client-id",
            )
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(
            headers
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok()),
            Some("*")
        );
        let allowed = headers
            .get("access-control-allow-headers")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allowed.contains("x-sync-client-id"));
        assert!(allowed.contains("apikey"));
    }

    #[tokio::test]
    async fn preflight_allows_legacy_client_id_header() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/v1/sync/auth")
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .header(
                "access-control-request-headers",
                "content-type,x-ditto-client-id",
            )
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allowed.contains("x-ditto-client-id"));
        assert!(allowed.contains("x-sync-client-id"));
    }

    #[tokio::test]
    async fn legacy_client_id_header_is_accepted() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/sync/auth")
            .header("content-type", "application/json")
            .header("x-ditto-client-id", "device-7")
            .body(Body::from(r#"{"token":"token-for-board-user"}"#))
            .unwrap();

        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authenticated"], json!(true));
        assert_eq!(body["userId"], json!("board-user"));
    }

    #[test]
    fn client_id_prefers_body_then_current_then_legacy_header() {
        let mut headers = HeaderMap::new();
        headers.insert(LEGACY_CLIENT_ID_HEADER, "legacy".parse().unwrap());
        assert_eq!(
            request_client_id(None, &headers).as_deref(),
            Some("legacy")
        );

        headers.insert(CLIENT_ID_HEADER, "current".parse().unwrap());
        assert_eq!(
            request_client_id(Some("  ".to_string()), &headers).as_deref(),
            Some("current")
        );
        assert_eq!(
            request_client_id(Some("body".to_string()), &headers).as_deref(),
            Some("body")
        );
        assert_eq!(request_client_id(None, &HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn error_responses_carry_cors_origin() {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/sync/auth")
            .header("origin", "https://app.example.com")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn healthz_reports_backend_state() {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["supabase_configured"], json!(true));
    }
}
