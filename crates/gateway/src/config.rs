// Gateway server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. CORS reads `GITGATE_CORS_ORIGINS` itself; everything else is
// parsed here.

use std::{net::SocketAddr, time::Duration};

const DEV_SESSION_SECRET: &str = "gitgate_local_development_session_secret_32c";

/// Deadline applied to every call to the git service.
pub const DEFAULT_GIT_RPC_TIMEOUT: Duration = Duration::from_secs(60);

// The util table sees one read per gated request, so a handful of
// connections is enough.
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Core gateway configuration.
///
/// Constructed via [`GatewayConfig::from_env`] which reads environment
/// variables and falls back to sensible development defaults.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Application name; becomes the repository directory and file prefix.
    pub app_name: String,
    /// HS256 secret for signed session cookies.
    pub session_secret: String,
    /// PostgreSQL connection string. Without it the util store is in-memory.
    pub database_url: Option<String>,
    /// Upper bound on pooled util database connections.
    pub db_max_connections: u32,
    /// How long a request waits for a pooled connection.
    pub db_acquire_timeout: Duration,
    /// Seed for the in-memory `AccessToken` record.
    pub access_token: Option<String>,
    /// Raw `GitConfig` JSON overriding the stored util record.
    pub git_config_override: Option<String>,
    /// Skip TLS certificate verification towards the git service.
    pub git_insecure_skip_verify: bool,
    /// Deadline for one git service call, connection included.
    pub git_rpc_timeout: Duration,
    /// Log filter directive (e.g. `info`, `gitgate=debug`).
    pub log_filter: String,
    /// Emit JSON log lines instead of human-readable text.
    pub log_json: bool,
}

impl GatewayConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `GITGATE_HOST` | `0.0.0.0` |
    /// | `GITGATE_PORT` | `8080` |
    /// | `GITGATE_APP_NAME` | `gitgate` |
    /// | `GITGATE_SESSION_SECRET` | dev-only placeholder |
    /// | `GITGATE_DATABASE_URL` | *(none: in-memory util store)* |
    /// | `GITGATE_DB_MAX_CONNECTIONS` | `4` |
    /// | `GITGATE_DB_ACQUIRE_TIMEOUT_SECS` | `5` |
    /// | `GITGATE_ACCESS_TOKEN` | *(none)* |
    /// | `GITGATE_GIT_CONFIG` | *(none: read the `GitConfig` util record)* |
    /// | `GITGATE_GIT_INSECURE_SKIP_VERIFY` | `false` |
    /// | `GITGATE_GIT_RPC_TIMEOUT_SECS` | `60` |
    /// | `GITGATE_LOG_FILTER` | `info` |
    /// | `GITGATE_LOG_FORMAT` | `text` (`json` for structured output) |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("GITGATE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("GITGATE_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let app_name = env("GITGATE_APP_NAME")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "gitgate".into());

        let session_secret =
            env("GITGATE_SESSION_SECRET").unwrap_or_else(|_| DEV_SESSION_SECRET.into());

        let database_url = non_empty(env("GITGATE_DATABASE_URL").ok());
        let db_max_connections = env("GITGATE_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let db_acquire_timeout = env("GITGATE_DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT);
        let access_token = non_empty(env("GITGATE_ACCESS_TOKEN").ok());
        let git_config_override = non_empty(env("GITGATE_GIT_CONFIG").ok());

        let git_insecure_skip_verify = env("GITGATE_GIT_INSECURE_SKIP_VERIFY")
            .ok()
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let git_rpc_timeout = env("GITGATE_GIT_RPC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GIT_RPC_TIMEOUT);

        let log_filter = env("GITGATE_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_json = env("GITGATE_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            listen_addr,
            app_name,
            session_secret,
            database_url,
            db_max_connections,
            db_acquire_timeout,
            access_token,
            git_config_override,
            git_insecure_skip_verify,
            git_rpc_timeout,
            log_filter,
            log_json,
        }
    }

    /// Returns true when using the development-only session secret.
    pub fn is_dev_session_secret(&self) -> bool {
        self.session_secret == DEV_SESSION_SECRET
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
