// Relay handlers: commit a record, list its history, read one revision.

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    Json,
};
use gitgate_common::{
    envelope::{Envelope, CANNOT_CONNECT_MESSAGE, MISSING_AUTHOR_MESSAGE},
    record::{canonical_json, RecordLocation},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::GatewayState;
use crate::{
    auth::session::Session,
    error::{ErrorCode, GatewayError},
    rpc::{
        proto::{GitRequest, GitResponse},
        GitMethod, GitRpcError,
    },
};

#[derive(Debug, Default, Deserialize)]
pub(super) struct CommitQuery {
    user_name: Option<String>,
    user_email: Option<String>,
}

pub(super) async fn commit(
    State(state): State<GatewayState>,
    Path((model_name, id)): Path<(String, String)>,
    Query(query): Query<CommitQuery>,
    Extension(session): Extension<Session>,
    body: Bytes,
) -> Result<Json<Envelope>, GatewayError> {
    if !state.git_config.is_valid() {
        return Ok(Json(Envelope::failed(state.git_config.invalid_message())));
    }

    let user_name = session.user_name().or_else(|| non_blank(query.user_name.as_deref()));
    let user_email = session.email().or_else(|| non_blank(query.user_email.as_deref()));
    let (Some(user_name), Some(user_email)) = (user_name, user_email) else {
        return Ok(Json(Envelope::failure(MISSING_AUTHOR_MESSAGE)));
    };

    let record = parse_record_body(&body)?;

    let location = match RecordLocation::new(&state.app_name, &model_name, &id) {
        Ok(location) => location,
        Err(error) => return Ok(Json(Envelope::failure(error.to_string()))),
    };

    let config = &state.git_config;
    let request = GitRequest {
        relative_path: location.relative_path().to_owned(),
        file_name: location.file_name().to_owned(),
        committer_name: user_name.to_owned(),
        committer_email: user_email.to_owned(),
        commit_message: location.commit_message(),
        content: canonical_json(&record),
        git_url: config.repository_url.clone(),
        git_username: config.username.clone(),
        git_password: config.password.clone(),
        git_token: config.token.clone(),
        ..GitRequest::default()
    };

    let reply = state.backend.call(config, GitMethod::SaveToGit, request).await;
    let envelope = relay_outcome(GitMethod::SaveToGit, &location, reply, Envelope::failure);
    if envelope.is_success() {
        info!(file_name = location.file_name(), commit = %envelope.message, "record committed");
    }

    Ok(Json(envelope))
}

pub(super) async fn history(
    State(state): State<GatewayState>,
    Path((model_name, id)): Path<(String, String)>,
) -> Json<Envelope> {
    Json(relay_read(&state, GitMethod::ReadFileHistory, &model_name, &id, String::new()).await)
}

pub(super) async fn commit_content(
    State(state): State<GatewayState>,
    Path((model_name, id, commit_hash)): Path<(String, String, String)>,
) -> Json<Envelope> {
    if state.git_config.is_valid() && commit_hash.trim().is_empty() {
        return Json(Envelope::failed("commit hash is required"));
    }

    let commit_hash = commit_hash.trim().to_owned();
    Json(relay_read(&state, GitMethod::ReadCommitContent, &model_name, &id, commit_hash).await)
}

async fn relay_read(
    state: &GatewayState,
    method: GitMethod,
    model_name: &str,
    id: &str,
    commit_hash: String,
) -> Envelope {
    if !state.git_config.is_valid() {
        return Envelope::failed(state.git_config.invalid_message());
    }

    let location = match RecordLocation::new(&state.app_name, model_name, id) {
        Ok(location) => location,
        Err(error) => return Envelope::failed(error.to_string()),
    };

    let request = GitRequest {
        relative_path: location.relative_path().to_owned(),
        file_name: location.file_name().to_owned(),
        commit_hash,
        ..GitRequest::default()
    };

    let reply = state.backend.call(&state.git_config, method, request).await;
    relay_outcome(method, &location, reply, Envelope::failed)
}

/// Map a call result onto an envelope. Transport problems collapse into one
/// generic message; a completed call with a non-success status passes the
/// service's message through unchanged.
fn relay_outcome(
    method: GitMethod,
    location: &RecordLocation,
    reply: Result<GitResponse, GitRpcError>,
    failure: fn(String) -> Envelope,
) -> Envelope {
    match reply {
        Ok(response) if response.is_success() => Envelope::success(response.message),
        Ok(response) => {
            info!(
                method = method.as_str(),
                file_name = location.file_name(),
                status = %response.status,
                "git service reported failure"
            );
            failure(response.message)
        }
        Err(error) => {
            warn!(
                method = method.as_str(),
                file_name = location.file_name(),
                error = %error,
                "git service call failed"
            );
            failure(CANNOT_CONNECT_MESSAGE.to_owned())
        }
    }
}

fn parse_record_body(body: &[u8]) -> Result<Value, GatewayError> {
    let invalid = |reason: &str| {
        GatewayError::new(ErrorCode::ValidationFailed, "request body must be a JSON object")
            .with_details(json!({ "field": "body", "reason": reason }))
    };

    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(invalid("not an object")),
        Err(error) => Err(invalid(&error.to_string())),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
