// Connection parameters for the external git service.
//
// Parsed once at startup from the `GitConfig` util record (a flat JSON
// object of strings) and shared read-only with every request afterwards.

use std::{collections::HashMap, time::Duration};

use tracing::{info, warn};

use crate::config::DEFAULT_GIT_RPC_TIMEOUT;

/// Name of the util record holding the JSON configuration document.
pub const GIT_CONFIG_UTIL_NAME: &str = "GitConfig";

#[derive(Clone, Default)]
pub struct GitConfig {
    /// gRPC endpoint of the git service (`grpcUrl`).
    pub service_endpoint: String,
    /// Remote repository the service commits into (`gitUrl`).
    pub repository_url: String,
    pub token: String,
    pub username: String,
    pub password: String,
    pub insecure_skip_verify: bool,
    pub rpc_timeout: Duration,
}

impl std::fmt::Debug for GitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitConfig")
            .field("service_endpoint", &self.service_endpoint)
            .field("repository_url", &self.repository_url)
            .field("token", &redacted(&self.token))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("rpc_timeout", &self.rpc_timeout)
            .finish()
    }
}

impl GitConfig {
    /// Parse the raw util value. Never fails: an empty, malformed, or
    /// partial document yields a config that [`GitConfig::is_valid`]
    /// rejects later.
    pub fn from_util_value(raw: &str) -> Self {
        let mut config = Self { rpc_timeout: DEFAULT_GIT_RPC_TIMEOUT, ..Self::default() };

        if raw.trim().is_empty() {
            warn!(util = GIT_CONFIG_UTIL_NAME, "no git configuration value provided");
            return config;
        }

        let document: HashMap<String, String> = match serde_json::from_str(raw) {
            Ok(document) => document,
            Err(error) => {
                warn!(util = GIT_CONFIG_UTIL_NAME, %error, "failed to parse git configuration");
                return config;
            }
        };

        config.service_endpoint = lookup(&document, "grpcUrl");
        config.repository_url = lookup(&document, "gitUrl");
        config.token = lookup(&document, "gitToken");
        if config.token.trim().is_empty() {
            config.username = lookup(&document, "gitUser");
            config.password = lookup(&document, "gitPass");
        }

        info!(
            util = GIT_CONFIG_UTIL_NAME,
            service_endpoint = %config.service_endpoint,
            repository_url = %config.repository_url,
            valid = config.is_valid(),
            "git configuration loaded"
        );
        config
    }

    pub fn with_transport(mut self, insecure_skip_verify: bool, rpc_timeout: Duration) -> Self {
        self.insecure_skip_verify = insecure_skip_verify;
        self.rpc_timeout = rpc_timeout;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the parameters that keep this config from being usable.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.service_endpoint) {
            missing.push("grpcUrl");
        }
        if is_blank(&self.repository_url) {
            missing.push("gitUrl");
        }
        if is_blank(&self.token) && (is_blank(&self.username) || is_blank(&self.password)) {
            missing.push("gitToken (or gitUser and gitPass)");
        }
        missing
    }

    /// Message returned to callers while the config is unusable.
    pub fn invalid_message(&self) -> String {
        format!("{} are mandatory in {GIT_CONFIG_UTIL_NAME} util value", self.missing_fields().join(", "))
    }
}

fn lookup(document: &HashMap<String, String>, key: &str) -> String {
    match document.get(key) {
        Some(value) => value.clone(),
        None => {
            warn!(util = GIT_CONFIG_UTIL_NAME, key, "key missing from git configuration");
            String::new()
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_config_is_valid() {
        let config = GitConfig::from_util_value(
            r#"{"grpcUrl":"git.internal:50051","gitUrl":"https://git.example/app.git","gitToken":"t0k"}"#,
        );
        assert!(config.is_valid());
        assert_eq!(config.service_endpoint, "git.internal:50051");
        assert_eq!(config.repository_url, "https://git.example/app.git");
        assert_eq!(config.token, "t0k");
        assert_eq!(config.rpc_timeout, DEFAULT_GIT_RPC_TIMEOUT);
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn username_and_password_config_is_valid() {
        let config = GitConfig::from_util_value(
            r#"{"grpcUrl":"git:1","gitUrl":"https://g/r.git","gitUser":"bot","gitPass":"pw"}"#,
        );
        assert!(config.is_valid());
        assert_eq!(config.username, "bot");
        assert_eq!(config.password, "pw");
    }

    #[test]
    fn credentials_are_ignored_when_token_present() {
        let config = GitConfig::from_util_value(
            r#"{"grpcUrl":"git:1","gitUrl":"u","gitToken":"t","gitUser":"bot","gitPass":"pw"}"#,
        );
        assert_eq!(config.token, "t");
        assert!(config.username.is_empty());
        assert!(config.password.is_empty());
    }

    #[test]
    fn empty_value_leaves_config_invalid() {
        let config = GitConfig::from_util_value("  ");
        assert!(!config.is_valid());
        assert_eq!(
            config.missing_fields(),
            vec!["grpcUrl", "gitUrl", "gitToken (or gitUser and gitPass)"]
        );
    }

    #[test]
    fn malformed_json_leaves_config_invalid() {
        assert!(!GitConfig::from_util_value("{not json").is_valid());
        assert!(!GitConfig::from_util_value(r#"{"grpcUrl": 5}"#).is_valid());
    }

    #[test]
    fn partial_config_is_accepted_but_invalid() {
        let config = GitConfig::from_util_value(r#"{"grpcUrl":"git:1","gitUrl":"u","gitUser":"bot"}"#);
        assert_eq!(config.service_endpoint, "git:1");
        assert!(!config.is_valid());
        assert_eq!(config.missing_fields(), vec!["gitToken (or gitUser and gitPass)"]);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let config =
            GitConfig::from_util_value(r#"{"grpcUrl":" ","gitUrl":"u","gitToken":"t"}"#);
        assert_eq!(config.missing_fields(), vec!["grpcUrl"]);
    }

    #[test]
    fn invalid_message_names_missing_fields() {
        let config = GitConfig::from_util_value(r#"{"gitToken":"t"}"#);
        assert_eq!(
            config.invalid_message(),
            "grpcUrl, gitUrl are mandatory in GitConfig util value"
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = GitConfig::from_util_value(
            r#"{"grpcUrl":"git:1","gitUrl":"u","gitUser":"bot","gitPass":"hunter2"}"#,
        );
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn with_transport_overrides_tls_and_deadline() {
        let config = GitConfig::default().with_transport(true, Duration::from_secs(3));
        assert!(config.insecure_skip_verify);
        assert_eq!(config.rpc_timeout, Duration::from_secs(3));
    }
}
