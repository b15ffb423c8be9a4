mod git;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    auth::{
        session::{load_session, SessionService},
        token_gate::require_access_token,
    },
    git_config::GitConfig,
    rpc::GitBackend,
    store::UtilStore,
};

#[derive(Clone)]
pub struct GatewayState {
    pub app_name: Arc<str>,
    pub git_config: Arc<GitConfig>,
    pub backend: GitBackend,
}

impl GatewayState {
    pub fn new(app_name: &str, git_config: GitConfig, backend: GitBackend) -> Self {
        Self { app_name: Arc::from(app_name), git_config: Arc::new(git_config), backend }
    }
}

/// Relay routes, gated by the access-token check. Sessions are resolved
/// before the gate runs.
pub fn router(state: GatewayState, store: UtilStore, sessions: Arc<SessionService>) -> Router {
    Router::new()
        .route("/v1/git/{model_name}/{id}/commit", post(git::commit))
        .route("/v1/git/{model_name}/{id}/history", get(git::history))
        .route("/v1/git/{model_name}/{id}/commits/{commit_hash}", get(git::commit_content))
        .with_state(state)
        .route_layer(middleware::from_fn_with_state(store, require_access_token))
        .route_layer(middleware::from_fn_with_state(sessions, load_session))
}
