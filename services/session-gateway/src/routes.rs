//! HTTP surface over the session coordinator
//!
//! - `GET /login?redirect=<path>`: 302 to the identity provider
//! - `POST /callback` `{"fragment": "#access_token=..."}`: process the return
//! - `POST /logout`
//! - `GET /session`: session flags and profile, never tokens
//! - `GET /health`, `GET /metrics`

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use session::{SessionCoordinator, SessionError};
use tracing::{error, info};

use crate::navigator::{HttpNavigator, Target};

/// Shown to the user for any failed sign-in; details go to the log.
const SIGN_IN_FAILED: &str = "could not sign in";

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SessionCoordinator,
    pub navigator: Arc<HttpNavigator>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/login", get(login_handler))
        .route("/callback", post(callback_handler))
        .route("/logout", post(logout_handler))
        .route("/session", get(session_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackRequest {
    fragment: String,
}

fn route_of(target: Option<Target>) -> Option<String> {
    match target {
        Some(Target::Route(route)) => Some(route),
        _ => None,
    }
}

async fn login_handler(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Response {
    state.navigator.begin_request();
    if let Err(e) = state.coordinator.login(params.redirect.as_deref()).await {
        return error_response(&e, None);
    }

    match state.navigator.take_target() {
        Some(Target::External(url)) => {
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        other => {
            error!(navigation = ?other, "login did not produce a provider redirect");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "error": {"code": "no_redirect", "message": SIGN_IN_FAILED},
                })),
            )
                .into_response()
        }
    }
}

async fn callback_handler(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> Response {
    state.navigator.begin_request();
    let result = state.coordinator.handle_login_callback(&request.fragment).await;
    let redirect = route_of(state.navigator.take_target());

    match result {
        Ok(()) => {
            info!(redirect = ?redirect, "callback accepted");
            (
                StatusCode::OK,
                Json(json!({"status": "signed_in", "redirect": redirect})),
            )
                .into_response()
        }
        Err(e) => error_response(&e, redirect),
    }
}

/// Map a coordinator error to the flat response shape of the surface.
fn error_response(err: &SessionError, redirect: Option<String>) -> Response {
    match err {
        SessionError::CallbackInProgress => (
            StatusCode::CONFLICT,
            Json(json!({
                "status": "error",
                "error": {"code": "callback_in_progress", "message": err.to_string()},
            })),
        )
            .into_response(),
        SessionError::Provider(e) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "status": "error",
                "error": {"code": e.code, "message": SIGN_IN_FAILED},
                "redirect": redirect,
            })),
        )
            .into_response(),
    }
}

async fn logout_handler(State(state): State<AppState>) -> Response {
    state.navigator.begin_request();
    state.coordinator.logout().await;
    let redirect = route_of(state.navigator.take_target());
    (
        StatusCode::OK,
        Json(json!({"status": "signed_out", "redirect": redirect})),
    )
        .into_response()
}

async fn session_handler(State(state): State<AppState>) -> Response {
    let session = state.coordinator.session();
    let token_valid = state.coordinator.token_valid().await;
    (
        StatusCode::OK,
        Json(json!({
            "phase": session.phase.label(),
            "logged_in": session.logged_in(),
            "loading": session.loading(),
            "logged_in_downstream": session.logged_in_downstream(),
            "token_valid": token_valid,
            "renewal_scheduled": state.coordinator.renewal_scheduled(),
            "profile": session.profile,
        })),
    )
        .into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.coordinator.session();
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "session": session.phase.label(),
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        })),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use common::Secret;
    use downstream::{FirebaseAuth, HttpTokenExchange};
    use identity::{Auth0Client, CredentialStore, ProviderConfig, ProviderError};
    use session::{Collaborators, Navigator, SessionOptions, SystemClock};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    /// Backend stand-in: provider `/userinfo` (accepts `tok1`), minting
    /// `/auth/firebase`, and the identity toolkit under `/v1`.
    async fn start_backend() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new()
            .route(
                "/userinfo",
                get(|headers: HeaderMap| async move {
                    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                        Some("Bearer tok1") => (
                            StatusCode::OK,
                            r#"{"sub":"auth0|1","name":"Alice"}"#,
                        ),
                        _ => (StatusCode::UNAUTHORIZED, "Unauthorized"),
                    }
                }),
            )
            .route(
                "/auth/firebase",
                get(|| async { Json(json!({"firebaseToken": "ft1"})) }),
            )
            .route(
                "/v1/accounts:signInWithCustomToken",
                post(|| async { Json(json!({"idToken": "id1", "expiresIn": "3600"})) }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            client_id: "c1ient-id".into(),
            domain: "tenant.auth0.example".into(),
            redirect_uri: "http://localhost:4200/callback".into(),
            audience: "https://api.example.com/".into(),
            scope: "openid profile email".into(),
        }
    }

    struct TestApp {
        router: Router,
        store: Arc<CredentialStore>,
        navigator: Arc<HttpNavigator>,
    }

    async fn test_app() -> TestApp {
        let base = start_backend().await;
        let client = reqwest::Client::new();
        let store = Arc::new(CredentialStore::in_memory());
        let navigator = Arc::new(HttpNavigator::new("/"));

        let coordinator = SessionCoordinator::new(
            Collaborators {
                provider: Arc::new(
                    Auth0Client::new(provider_config(), client.clone())
                        .with_userinfo_endpoint(format!("{base}/userinfo")),
                ),
                exchange: Arc::new(HttpTokenExchange::new(
                    client.clone(),
                    &format!("{base}/"),
                    Duration::from_secs(5),
                )),
                downstream: Arc::new(FirebaseAuth::with_endpoint(
                    client,
                    &format!("{base}/v1"),
                    Secret::new("k1".to_string()),
                )),
                store: store.clone(),
                navigator: navigator.clone(),
                clock: Arc::new(SystemClock),
            },
            SessionOptions::default(),
        );

        let state = AppState {
            coordinator,
            navigator: navigator.clone(),
            prometheus: crate::metrics::test_handle(),
            started_at: Instant::now(),
        };
        TestApp {
            router: build_router(state, 16),
            store,
            navigator,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&body).to_string())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn session_json(router: &Router) -> serde_json::Value {
        let (_, _, body) = send(router, get_req("/session")).await;
        serde_json::from_str(&body).unwrap()
    }

    #[tokio::test]
    async fn login_redirects_to_provider_and_stores_target() {
        let app = test_app().await;
        let (status, headers, _) = send(&app.router, get_req("/login?redirect=/dashboard")).await;

        assert_eq!(status, StatusCode::FOUND);
        let location = headers[header::LOCATION].to_str().unwrap();
        assert!(
            location.starts_with("https://tenant.auth0.example/authorize?"),
            "got: {location}"
        );
        assert!(location.contains("response_type=token"));
        assert!(location.contains("client_id=c1ient-id"));
        assert_eq!(app.store.redirect().await.as_deref(), Some("/dashboard"));
    }

    #[tokio::test]
    async fn callback_signs_in_and_reaches_downstream() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app.router,
            post_json(
                "/callback",
                json!({"fragment": "#access_token=tok1&expires_in=7200&token_type=Bearer"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "body: {body}");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "signed_in");
        assert_eq!(json["redirect"], "/");

        let mut view = session_json(&app.router).await;
        for _ in 0..100 {
            if view["logged_in_downstream"] == true {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            view = session_json(&app.router).await;
        }
        assert_eq!(view["logged_in"], true);
        assert_eq!(view["logged_in_downstream"], true);
        assert_eq!(view["token_valid"], true);
        assert_eq!(view["renewal_scheduled"], true);
        assert_eq!(view["profile"]["name"], "Alice");
        assert!(!view.to_string().contains("tok1"), "tokens must not be exposed");
    }

    #[tokio::test]
    async fn provider_error_is_unauthorized() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app.router,
            post_json(
                "/callback",
                json!({"fragment": "#error=access_denied&error_description=User%20cancelled"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["code"], "access_denied");
        assert_eq!(json["error"]["message"], SIGN_IN_FAILED);
        assert_eq!(json["redirect"], "/");

        let view = session_json(&app.router).await;
        assert_eq!(view["logged_in"], false);
        assert_eq!(view["loading"], false);
    }

    #[tokio::test]
    async fn forged_state_is_rejected_after_login() {
        let app = test_app().await;
        send(&app.router, get_req("/login")).await;

        let (status, _, body) = send(
            &app.router,
            post_json(
                "/callback",
                json!({"fragment": "#access_token=tok1&state=forged"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["code"], ProviderError::INVALID_STATE);
    }

    #[tokio::test]
    async fn profile_failure_leaves_session_loading() {
        let app = test_app().await;
        let (status, _, body) = send(
            &app.router,
            post_json("/callback", json!({"fragment": "#access_token=revoked"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["code"], ProviderError::UNAUTHORIZED);
        assert!(json["redirect"].is_null());

        let view = session_json(&app.router).await;
        assert_eq!(view["loading"], true);
        assert_eq!(view["logged_in"], false);
    }

    #[tokio::test]
    async fn callback_ignores_navigation_left_by_earlier_work() {
        let app = test_app().await;
        app.navigator.navigate_by_url("/stale");

        let (status, _, body) = send(
            &app.router,
            post_json("/callback", json!({"fragment": "#access_token=revoked"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json["redirect"].is_null(), "got: {json}");
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = test_app().await;
        send(
            &app.router,
            post_json("/callback", json!({"fragment": "#access_token=tok1"})),
        )
        .await;

        let (status, _, body) = send(&app.router, post_json("/logout", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "signed_out");
        assert_eq!(json["redirect"], "/");

        let view = session_json(&app.router).await;
        assert_eq!(view["logged_in"], false);
        assert_eq!(view["token_valid"], false);
        assert!(view["profile"].is_null());
        assert!(app.store.credential().await.is_none());
    }

    #[test]
    fn callback_in_progress_is_conflict() {
        let response = error_response(&SessionError::CallbackInProgress, None);
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn health_and_metrics_endpoints() {
        let app = test_app().await;

        let (status, _, body) = send(&app.router, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["session"], "logged_out");

        let (status, headers, _) = send(&app.router, get_req("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
    }
}
