mod api;
mod auth;
mod config;
mod cors;
mod error;
mod git_config;
mod rpc;
mod store;

use anyhow::Context;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::{sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    api::GatewayState,
    auth::session::SessionService,
    config::GatewayConfig,
    error::{
        attach_request_id_header, request_id_from_headers_or_generate, with_request_id_scope,
        ErrorCode, GatewayError,
    },
    git_config::{GitConfig, GIT_CONFIG_UTIL_NAME},
    rpc::GitBackend,
    store::{UtilStore, ACCESS_TOKEN_UTIL_NAME},
};

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env();
    init_tracing(&config);

    if config.is_dev_session_secret() {
        warn!("GITGATE_SESSION_SECRET is unset; using the development session secret");
    }
    if config.git_insecure_skip_verify {
        warn!("TLS certificate verification towards the git service is disabled");
    }

    let sessions = Arc::new(
        SessionService::new(&config.session_secret).context("invalid gateway session secret")?,
    );
    let store = build_store(&config).await?;
    let git_config = load_git_config(&config, &store).await;
    match git_config.missing_fields().as_slice() {
        [] => info!(endpoint = %git_config.service_endpoint, "git service configured"),
        missing => warn!(missing = ?missing, "git service configuration is incomplete"),
    }

    let state = GatewayState::new(&config.app_name, git_config, GitBackend::Grpc);
    let app = build_router(api::router(state, store, sessions));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind gateway listener on {}", config.listen_addr))?;

    info!(listen_addr = %config.listen_addr, app_name = %config.app_name, "starting gitgate");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited unexpectedly")
}

fn init_tracing(config: &GatewayConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn build_store(config: &GatewayConfig) -> anyhow::Result<UtilStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        let store = UtilStore::memory();
        match config.access_token.as_deref() {
            Some(token) => store.put(ACCESS_TOKEN_UTIL_NAME, token).await?,
            None => warn!("no AccessToken configured; token-authenticated calls will be refused"),
        }
        info!(backend = store.backend_name(), "util store ready");
        return Ok(store);
    };

    let store = UtilStore::connect_postgres(
        database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await?;
    info!(backend = store.backend_name(), "util store ready");
    Ok(store)
}

/// Environment override first, then the stored util record. A missing or
/// unreadable record leaves the config empty, which every relay operation
/// reports as a configuration failure.
async fn load_git_config(config: &GatewayConfig, store: &UtilStore) -> GitConfig {
    let raw = match config.git_config_override.as_deref() {
        Some(raw) => raw.to_owned(),
        None => match store.get(GIT_CONFIG_UTIL_NAME).await {
            Ok(value) => value.unwrap_or_default(),
            Err(lookup_error) => {
                error!(util = GIT_CONFIG_UTIL_NAME, error = %lookup_error, "failed to load git config");
                String::new()
            }
        },
    };

    GitConfig::from_util_value(&raw)
        .with_transport(config.git_insecure_skip_verify, config.git_rpc_timeout)
}

fn build_router(api_router: Router) -> Router {
    apply_middleware(
        Router::new().route("/healthz", get(healthz)).merge(api_router).fallback(not_found),
    )
}

fn apply_middleware(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
        .layer(cors::cors_layer())
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn not_found() -> GatewayError {
    GatewayError::from_code(ErrorCode::NotFound)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(signal_error) = tokio::signal::ctrl_c().await {
            error!(error = %signal_error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(signal_error) => {
                error!(error = %signal_error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            GatewayError::from_code(ErrorCode::InternalError).into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request_id_from_headers_or_generate(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;
    attach_request_id_header(&mut response, &request_id);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::{apply_middleware, build_router, load_git_config, MAX_REQUEST_BODY_BYTES};
    use crate::{
        api::{self, GatewayState},
        auth::session::SessionService,
        config::GatewayConfig,
        git_config::{GitConfig, GIT_CONFIG_UTIL_NAME},
        rpc::GitBackend,
        store::UtilStore,
    };

    const STORED_CONFIG: &str =
        r#"{"grpcUrl":"stored:50051","gitUrl":"https://git.example/r.git","gitToken":"t"}"#;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            listen_addr: "127.0.0.1:0".parse().expect("socket addr"),
            app_name: "billing".to_owned(),
            session_secret: "gitgate_test_secret_that_is_definitely_long_enough".to_owned(),
            database_url: None,
            db_max_connections: 1,
            db_acquire_timeout: std::time::Duration::from_secs(1),
            access_token: None,
            git_config_override: None,
            git_insecure_skip_verify: false,
            git_rpc_timeout: std::time::Duration::from_secs(5),
            log_filter: "info".to_owned(),
            log_json: false,
        }
    }

    fn test_router() -> Router {
        let sessions = Arc::new(
            SessionService::new("gitgate_test_secret_that_is_definitely_long_enough")
                .expect("test session service should initialize"),
        );
        let state = GatewayState::new("billing", GitConfig::default(), GitBackend::Grpc);
        build_router(api::router(state, UtilStore::memory(), sessions))
    }

    #[tokio::test]
    async fn health_check_is_ungated_and_has_request_id_header() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .expect("healthz request should build"),
            )
            .await
            .expect("healthz request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn gate_errors_carry_the_propagated_request_id() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/v1/git/Invoice/42/history")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .expect("history request should build"),
            )
            .await
            .expect("history request should return a response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get("x-request-id").expect("request id header"), "req-123");
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("readable body");
        let body: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(body["error"]["code"], "ACCESS_TOKEN_NOT_CONFIGURED");
        assert_eq!(body["error"]["request_id"], "req-123");
    }

    #[tokio::test]
    async fn unknown_route_renders_not_found_error() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/v1/unknown")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should return a response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("readable body");
        let body: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn panic_handler_returns_internal_server_error() {
        async fn panic_route() -> &'static str {
            panic!("test panic");
        }

        let app = apply_middleware(Router::new().route("/panic", get(panic_route)));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/panic")
                    .body(Body::empty())
                    .expect("panic request should build"),
            )
            .await
            .expect("panic request should return a response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn request_body_limit_is_enforced() {
        async fn echo(body: String) -> String {
            body
        }

        let oversized_body = "a".repeat(MAX_REQUEST_BODY_BYTES + 1);
        let app = apply_middleware(Router::new().route("/echo", post(echo)));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header("content-type", "text/plain")
                    .body(Body::from(oversized_body))
                    .expect("echo request should build"),
            )
            .await
            .expect("echo request should return a response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn git_config_comes_from_util_record_when_not_overridden() {
        let store = UtilStore::memory();
        store.put(GIT_CONFIG_UTIL_NAME, STORED_CONFIG).await.expect("seed git config");

        let loaded = load_git_config(&test_config(), &store).await;
        assert!(loaded.is_valid());
        assert_eq!(loaded.service_endpoint, "stored:50051");
        assert_eq!(loaded.rpc_timeout, std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn environment_override_wins_over_util_record() {
        let store = UtilStore::memory();
        store.put(GIT_CONFIG_UTIL_NAME, STORED_CONFIG).await.expect("seed git config");
        let config = GatewayConfig {
            git_config_override: Some(
                r#"{"grpcUrl":"env:50051","gitUrl":"https://git.example/e.git","gitUser":"u","gitPass":"p"}"#
                    .to_owned(),
            ),
            git_insecure_skip_verify: true,
            ..test_config()
        };

        let loaded = load_git_config(&config, &store).await;
        assert_eq!(loaded.service_endpoint, "env:50051");
        assert_eq!(loaded.username, "u");
        assert!(loaded.insecure_skip_verify);
    }

    #[tokio::test]
    async fn missing_git_config_leaves_gateway_unconfigured() {
        let loaded = load_git_config(&test_config(), &UtilStore::memory()).await;
        assert!(!loaded.is_valid());
    }
}
