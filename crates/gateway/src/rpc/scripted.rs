// In-process stand-in for the git service. Replies come from a closure and
// every call is recorded so callers can assert on what was (not) sent.

use std::sync::Mutex;

use super::{
    proto::{GitRequest, GitResponse},
    GitMethod, GitRpcError,
};

type Responder = dyn Fn(GitMethod, &GitRequest) -> Result<GitResponse, GitRpcError> + Send + Sync;

pub struct ScriptedGitService {
    responder: Box<Responder>,
    calls: Mutex<Vec<(GitMethod, GitRequest)>>,
}

impl ScriptedGitService {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(GitMethod, &GitRequest) -> Result<GitResponse, GitRpcError> + Send + Sync + 'static,
    {
        Self { responder: Box::new(responder), calls: Mutex::new(Vec::new()) }
    }

    /// Answers every call with the given status and message.
    pub fn replying(status: &str, message: &str) -> Self {
        let response = GitResponse { status: status.to_owned(), message: message.to_owned() };
        Self::new(move |_, _| Ok(response.clone()))
    }

    pub fn call(&self, method: GitMethod, request: GitRequest) -> Result<GitResponse, GitRpcError> {
        let reply = (self.responder)(method, &request);
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push((method, request));
        reply
    }

    pub fn calls(&self) -> Vec<(GitMethod, GitRequest)> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}
