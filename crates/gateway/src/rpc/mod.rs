pub mod client;
pub mod proto;
pub mod scripted;
pub mod tls;

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::git_config::GitConfig;

use self::{
    proto::{GitRequest, GitResponse},
    scripted::ScriptedGitService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitMethod {
    SaveToGit,
    ReadFileHistory,
    ReadCommitContent,
}

impl GitMethod {
    pub const fn path(self) -> &'static str {
        match self {
            Self::SaveToGit => proto::SAVE_TO_GIT_PATH,
            Self::ReadFileHistory => proto::READ_FILE_HISTORY_PATH,
            Self::ReadCommitContent => proto::READ_COMMIT_CONTENT_PATH,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SaveToGit => "SaveToGit",
            Self::ReadFileHistory => "ReadFileHistory",
            Self::ReadCommitContent => "ReadCommitContent",
        }
    }
}

/// Failures to complete a call. A call that completes with a non-success
/// status is not an error at this layer.
#[derive(Debug, Error)]
pub enum GitRpcError {
    #[error("invalid git service endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to prepare TLS for git service: {0}")]
    Tls(String),

    #[error("failed to connect to git service: {0}")]
    Connect(String),

    #[error("git service call exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("git service call failed: {0}")]
    Status(#[from] tonic::Status),
}

/// Where relay calls go: the real gRPC service, or a scripted stand-in.
#[derive(Clone)]
pub enum GitBackend {
    Grpc,
    Scripted(Arc<ScriptedGitService>),
}

impl GitBackend {
    pub async fn call(
        &self,
        config: &GitConfig,
        method: GitMethod,
        request: GitRequest,
    ) -> Result<GitResponse, GitRpcError> {
        match self {
            Self::Grpc => client::call(config, method, request).await,
            Self::Scripted(service) => service.call(method, request),
        }
    }
}
