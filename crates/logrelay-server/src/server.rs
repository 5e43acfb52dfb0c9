//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use logrelay_auth::{AuthError, AuthGate};
use logrelay_settings::{AuthMode, RelaySettings};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse, StatusResponse};
use crate::ingest::{IngestPolicy, ingest_handler};
use crate::metrics;
use crate::origin::OriginPolicy;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::SubscriptionRegistry;
use crate::websocket::upgrade::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Deployment rooms and live connections.
    pub registry: Arc<SubscriptionRegistry>,
    /// Handshake authentication.
    pub gate: Arc<AuthGate>,
    /// Browser origin allow-list.
    pub origins: Arc<OriginPolicy>,
    /// Ingest caller policy.
    pub ingest: Arc<IngestPolicy>,
    /// Resolved limits.
    pub config: Arc<ServerConfig>,
    /// One permit per live connection.
    pub slots: Arc<Semaphore>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus renderer.
    pub metrics: PrometheusHandle,
}

/// The log relay server.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<SubscriptionRegistry>,
    gate: Arc<AuthGate>,
    origins: Arc<OriginPolicy>,
    ingest: Arc<IngestPolicy>,
    slots: Arc<Semaphore>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl RelayServer {
    /// Create a server from resolved parts.
    pub fn new(
        config: ServerConfig,
        gate: AuthGate,
        origins: OriginPolicy,
        ingest: IngestPolicy,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
            registry: Arc::new(SubscriptionRegistry::new()),
            gate: Arc::new(gate),
            origins: Arc::new(origins),
            ingest: Arc::new(ingest),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Create a server from loaded settings.
    ///
    /// Fails when the auth settings cannot produce a gate, e.g. strict mode
    /// without a verifier.
    pub fn from_settings(
        settings: &RelaySettings,
        metrics: PrometheusHandle,
    ) -> Result<Self, AuthError> {
        let gate = AuthGate::from_settings(&settings.auth)?;
        match gate.mode() {
            AuthMode::Disabled => {
                warn!("authentication is DISABLED; every handshake is accepted");
            }
            AuthMode::DevelopmentBypass => {
                warn!("development bypass enabled; the dev token is accepted");
            }
            AuthMode::Strict => {}
        }

        let ingest = IngestPolicy::from_settings(&settings.ingest);
        if matches!(ingest, IngestPolicy::TrustNetwork) {
            warn!("ingest endpoint trusts its network; set ingest.sharedSecret to require a key");
        }

        let origins = OriginPolicy::from_origins(&settings.origins.allowed);
        Ok(Self::new(
            ServerConfig::from_settings(settings),
            gate,
            origins,
            ingest,
            metrics,
        ))
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            gate: self.gate.clone(),
            origins: self.origins.clone(),
            ingest: self.ingest.clone(),
            config: self.config.clone(),
            slots: self.slots.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/internal/logs", post(ingest_handler))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(self.origins.cors_layer()),
            )
            .with_state(state)
    }

    /// Bind and serve in a background task until shutdown.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();
        info!(%addr, auth_mode = %self.gate.mode(), "log relay listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server terminated with error");
            }
        });
        Ok((addr, handle))
    }

    /// Deployment rooms and live connections.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Resolved configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handshake authentication gate.
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }
}

/// GET /
async fn root_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::online(state.config.service_name.as_str()))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.registry.connection_count().await;
    let rooms = state.registry.room_count().await;
    Json(health::health_check(state.start_time, connections, rooms))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::render(&state.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use logrelay_auth::JwtVerifier;
    use logrelay_core::DeploymentId;
    use serde_json::Value;
    use tower::ServiceExt;

    fn make_server_with(config: ServerConfig, gate: AuthGate, ingest: IngestPolicy) -> RelayServer {
        let origins = OriginPolicy::from_origins(["http://localhost:3000"]);
        RelayServer::new(config, gate, origins, ingest, metrics::detached_handle())
    }

    fn open_gate() -> AuthGate {
        AuthGate::new(AuthMode::Disabled, "mock-token", None, Duration::from_secs(1)).unwrap()
    }

    fn strict_gate() -> AuthGate {
        let verifier = JwtVerifier::hmac(b"test-secret", jsonwebtoken::Algorithm::HS256).unwrap();
        AuthGate::new(
            AuthMode::Strict,
            "mock-token",
            Some(Arc::new(verifier)),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    fn strict_server() -> RelayServer {
        make_server_with(ServerConfig::default(), strict_gate(), IngestPolicy::TrustNetwork)
    }

    fn make_server() -> RelayServer {
        make_server_with(ServerConfig::default(), open_gate(), IngestPolicy::TrustNetwork)
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn ingest_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/internal/logs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn ws_request(origin: Option<&str>, query: &str) -> Request<Body> {
        let mut builder = Request::builder().uri(format!("/ws{query}"));
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn default_config_and_idle_shutdown() {
        let server = make_server();
        assert_eq!(server.config().bind_addr(), "127.0.0.1:0");
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.gate().mode(), AuthMode::Disabled);
    }

    #[test]
    fn from_settings_rejects_strict_without_verifier() {
        let settings = RelaySettings::default();
        let result = RelayServer::from_settings(&settings, metrics::detached_handle());
        assert!(matches!(result, Err(AuthError::VerifierUnavailable)));
    }

    #[test]
    fn from_settings_accepts_development_bypass() {
        let mut settings = RelaySettings::default();
        settings.auth.mode = AuthMode::DevelopmentBypass;
        let server = RelayServer::from_settings(&settings, metrics::detached_handle()).unwrap();
        assert_eq!(server.gate().mode(), AuthMode::DevelopmentBypass);
        assert_eq!(server.config().service_name, "logrelay");
    }

    #[tokio::test]
    async fn root_reports_online() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["service"], "logrelay");
    }

    #[tokio::test]
    async fn health_endpoint_returns_counts() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["rooms"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_responds() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let resp = make_server()
            .router()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ingest_valid_body_returns_sent() {
        let resp = make_server()
            .router()
            .oneshot(ingest_request(r#"{"deploymentId":"42","log":"Building..."}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"status": "sent"}));
    }

    #[tokio::test]
    async fn ingest_missing_field_returns_400() {
        let resp = make_server()
            .router()
            .oneshot(ingest_request(r#"{"deploymentId":"42"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "Missing deploymentId or log");
    }

    #[tokio::test]
    async fn ingest_requires_key_under_shared_secret() {
        let server = make_server_with(
            ServerConfig::default(),
            open_gate(),
            IngestPolicy::SharedSecret("k".to_owned().into()),
        );
        let resp = server
            .router()
            .oneshot(ingest_request(r#"{"deploymentId":"42","log":"x"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ingest_reaches_subscriber() {
        let server = make_server();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let conn = Arc::new(crate::websocket::connection::ClientConnection::new(
            logrelay_core::Identity::anonymous(),
            tx,
        ));
        server.registry().subscribe(&conn, DeploymentId::from("42")).await;
        let _ = rx.try_recv().unwrap();

        let resp = server
            .router()
            .oneshot(ingest_request(r#"{"deploymentId":42,"log":"Building..."}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["data"], "Building...");
    }

    #[tokio::test]
    async fn ws_denied_origin_is_403() {
        let resp = make_server()
            .router()
            .oneshot(ws_request(Some("https://evil.example"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn ws_origin_checked_before_auth() {
        let resp = strict_server()
            .router()
            .oneshot(ws_request(Some("https://evil.example"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn ws_empty_origin_passes_to_auth() {
        let resp = strict_server()
            .router()
            .oneshot(ws_request(Some(""), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_missing_credential_is_401() {
        let resp = strict_server()
            .router()
            .oneshot(ws_request(Some("http://localhost:3000"), ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_bad_token_is_401() {
        let resp = strict_server()
            .router()
            .oneshot(ws_request(None, "?token=not-a-jwt"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_over_capacity_is_503() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        let server = make_server_with(config, open_gate(), IngestPolicy::TrustNetwork);
        let resp = server
            .router()
            .oneshot(ws_request(None, "?token=mock-token"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn ws_admitted_plain_request_fails_upgrade() {
        let resp = make_server()
            .router()
            .oneshot(ws_request(Some("http://localhost:3000"), "?token=mock-token"))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_ne!(resp.status(), StatusCode::FORBIDDEN);
    }
}
