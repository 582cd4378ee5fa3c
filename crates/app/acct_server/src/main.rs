//! Acct account service binary.
//!
//! Serves the account and session HTTP API over PostgreSQL (users) and
//! Redis (sessions). Without `REDIS_URL` sessions live in process memory.

use std::sync::Arc;

use acct_api::config::{
    ApiConfig, MAX_ACCESS_TOKEN_TTL_MINUTES, MAX_BCRYPT_COST, MAX_REFRESH_TOKEN_TTL_DAYS,
    MAX_STORE_TIMEOUT_MS,
};
use acct_core::auth::password::{DEFAULT_BCRYPT_COST, MIN_BCRYPT_COST};
use acct_core::kv::{KeyValueStore, MemoryKvStore, RedisKvStore};
use acct_core::users::PgUserDirectory;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How often the in-memory session store sweeps expired entries.
const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// CLI arguments for the account service.
#[derive(Parser, Debug)]
#[command(name = "acct_server", about = "Acct account service")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/acct"
    )]
    database_url: String,

    /// Redis URL for session state (e.g. `redis://127.0.0.1:6379/0`).
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Access token lifetime in minutes.
    #[arg(
        long,
        env = "ACCESS_TOKEN_TTL_MINUTES",
        default_value_t = 15,
        value_parser = clap::value_parser!(i64).range(1..=MAX_ACCESS_TOKEN_TTL_MINUTES)
    )]
    access_token_ttl_minutes: i64,

    /// Refresh token lifetime in days.
    #[arg(
        long,
        env = "REFRESH_TOKEN_TTL_DAYS",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(1..=MAX_REFRESH_TOKEN_TTL_DAYS)
    )]
    refresh_token_ttl_days: i64,

    /// Bound on each session store and user directory call, in milliseconds.
    #[arg(
        long,
        env = "STORE_TIMEOUT_MS",
        default_value_t = 2000,
        value_parser = clap::value_parser!(u64).range(1..=MAX_STORE_TIMEOUT_MS)
    )]
    store_timeout_ms: u64,

    /// bcrypt cost for new password hashes.
    #[arg(
        long,
        env = "BCRYPT_COST",
        default_value_t = DEFAULT_BCRYPT_COST,
        value_parser = clap::value_parser!(u32)
            .range(i64::from(MIN_BCRYPT_COST)..=i64::from(MAX_BCRYPT_COST))
    )]
    bcrypt_cost: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,acct_api=debug,acct_core=debug".into()),
        )
        .init();

    let args = Args::parse();

    info!(bind_addr = %args.bind_addr, "starting acct_server");

    info!(
        max_connections = args.max_connections,
        "configuring connection pool"
    );

    let mut config = ApiConfig::new(acct_core::auth::jwt::resolve_jwt_secret());
    config.bind_addr = args.bind_addr;
    config.pg_connection_url = args.database_url;
    config.redis_url = args.redis_url;
    config.access_token_ttl_minutes = args.access_token_ttl_minutes;
    config.refresh_token_ttl_days = args.refresh_token_ttl_days;
    config.store_timeout_ms = args.store_timeout_ms;
    config.bcrypt_cost = args.bcrypt_cost;
    config.validate()?;
    info!(?config, "configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    acct_core::migrate::migrate(&pool).await?;

    let shutdown = CancellationToken::new();

    let kv: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisKvStore::connect(url).await?),
        None => {
            warn!("REDIS_URL not set, sessions are kept in memory and lost on restart");
            let memory = Arc::new(MemoryKvStore::new());
            spawn_purge(memory.clone(), shutdown.clone());
            memory
        }
    };

    let directory = Arc::new(PgUserDirectory::new(pool));
    let state = acct_api::AppState::new(config.clone(), kv, directory);
    let app = acct_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
            }
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    shutdown.cancel();
    Ok(())
}

/// Sweep expired sessions from the in-memory store until shutdown.
fn spawn_purge(store: Arc<MemoryKvStore>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "purged expired sessions");
                    }
                }
            }
        }
    });
}
