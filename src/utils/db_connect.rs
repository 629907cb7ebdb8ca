// src/utils/db_connect.rs

use anyhow::{Context, Result};
use bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use log::info;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::{Config, NoTls};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// `DATABASE_URL` when set, otherwise the individual `POSTGRES_*` variables.
fn build_pg_config() -> Result<Config> {
    let mut config = match env::var("DATABASE_URL") {
        Ok(url) => Config::from_str(&url).context("DATABASE_URL is not a valid connection string")?,
        Err(_) => {
            let mut config = Config::new();
            config
                .host(&var_or("POSTGRES_HOST", "127.0.0.1"))
                .port(var_or("POSTGRES_PORT", "5432").parse::<u16>().unwrap_or(5432))
                .dbname(&var_or("POSTGRES_DB", "contacts"))
                .user(&var_or("POSTGRES_USER", "postgres"))
                .password(var_or("POSTGRES_PASSWORD", ""));
            config
        }
    };
    config
        .application_name("contact_dedupe")
        .connect_timeout(Duration::from_secs(10));
    info!(
        "DB Config: Hosts={:?}, DB={}, User={}",
        config.get_hosts(),
        config.get_dbname().unwrap_or("-"),
        config.get_user().unwrap_or("-")
    );
    Ok(config)
}

/// Initializes the database connection pool and verifies it with a test query.
pub async fn connect() -> Result<PgPool> {
    let config = build_pg_config()?;
    info!("Connecting to PostgreSQL database...");
    let manager = PostgresConnectionManager::new(config, NoTls);

    let max_size = var_or("POSTGRES_POOL_SIZE", "16").parse::<u32>().unwrap_or(16);

    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(1))
        .idle_timeout(Some(Duration::from_secs(180)))
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .context("Failed to build database connection pool")?;

    let conn = pool
        .get()
        .await
        .context("Failed to get test connection from pool")?;
    conn.query_one("SELECT 1", &[])
        .await
        .context("Test query 'SELECT 1' failed")?;
    drop(conn);
    info!("Database connection pool initialized successfully.");
    Ok(pool)
}

/// (connections, idle connections)
pub fn get_pool_status(pool: &PgPool) -> (u32, u32) {
    let state = pool.state();
    (state.connections, state.idle_connections)
}
