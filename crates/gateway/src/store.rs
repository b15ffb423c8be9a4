// Named utility records (`AccessToken`, `GitConfig`).
//
// Production deployments read them from the `utils` table; without a
// database URL the gateway keeps them in memory, seeded from the
// environment at startup.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use sqlx::{
    migrate::Migrator,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use tokio::sync::RwLock;

static MIGRATOR: Migrator = sqlx::migrate!();

/// Name of the util record holding the canonical access token.
pub const ACCESS_TOKEN_UTIL_NAME: &str = "AccessToken";

#[derive(Clone)]
pub enum UtilStore {
    Postgres(PgPool),
    Memory(Arc<RwLock<HashMap<String, String>>>),
}

impl UtilStore {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Connect to the util database over TLS, apply pending migrations and
    /// confirm the `utils` table answers.
    pub async fn connect_postgres(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let options = database_url
            .parse::<PgConnectOptions>()
            .context("failed to parse util database URL")?;
        require_tls(&options)?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .context("failed to connect to util database")?;
        MIGRATOR.run(&pool).await.context("failed to apply util database migrations")?;

        let records = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM utils")
            .fetch_one(&pool)
            .await
            .context("util table is not readable")?;
        tracing::debug!(records, "util table reachable");

        Ok(Self::Postgres(pool))
    }

    /// Value of the record called `name`, or `None` when no such record exists.
    pub async fn get(&self, name: &str) -> Result<Option<String>> {
        match self {
            Self::Postgres(pool) => get_util_pg(pool, name).await,
            Self::Memory(records) => Ok(records.read().await.get(name).cloned()),
        }
    }

    pub async fn put(&self, name: &str, value: &str) -> Result<()> {
        match self {
            Self::Postgres(pool) => put_util_pg(pool, name, value).await,
            Self::Memory(records) => {
                records.write().await.insert(name.to_owned(), value.to_owned());
                Ok(())
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

async fn get_util_pg(pool: &PgPool, name: &str) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT value FROM utils WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to read util record '{name}'"))
}

async fn put_util_pg(pool: &PgPool, name: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO utils (name, value) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await
    .with_context(|| format!("failed to write util record '{name}'"))?;

    Ok(())
}

fn require_tls(options: &PgConnectOptions) -> Result<()> {
    match options.get_ssl_mode() {
        PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull => Ok(()),
        mode => {
            bail!("util database must be reached over TLS (sslmode={mode:?}); use sslmode=require")
        }
    }
}
