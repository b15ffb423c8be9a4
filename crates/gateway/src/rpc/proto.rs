// Messages of the `gitgrpc.GitService` contract.
//
// Field tags mirror `proto/gitgrpc.proto`; keep both files in step.

/// Fully-qualified gRPC method paths.
pub const SAVE_TO_GIT_PATH: &str = "/gitgrpc.GitService/SaveToGit";
pub const READ_FILE_HISTORY_PATH: &str = "/gitgrpc.GitService/ReadFileHistory";
pub const READ_COMMIT_CONTENT_PATH: &str = "/gitgrpc.GitService/ReadCommitContent";

/// Status string the service reports for a successful call.
pub const STATUS_SUCCESS: &str = "success";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GitRequest {
    #[prost(string, tag = "1")]
    pub relative_path: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub file_name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub committer_name: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub committer_email: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub commit_message: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub content: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub git_url: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub git_username: ::prost::alloc::string::String,
    #[prost(string, tag = "9")]
    pub git_password: ::prost::alloc::string::String,
    #[prost(string, tag = "10")]
    pub git_token: ::prost::alloc::string::String,
    #[prost(string, tag = "11")]
    pub commit_hash: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GitResponse {
    #[prost(string, tag = "1")]
    pub status: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

impl GitResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}
