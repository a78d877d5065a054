//! # huddle-db
//!
//! Database layer for Huddle. A single SQLite pool holds profiles, servers,
//! members, channels, conversations and messages. The schema ships embedded in
//! the binary and is applied by [`Database::migrate`].
//!
//! Uniqueness constraints in the schema, not in-process locks, arbitrate
//! concurrent writers: one membership per `(server, profile)`, one
//! conversation per member pair, one `general` channel per server.

pub mod repository;
pub mod rows;

use std::str::FromStr;

use anyhow::Result;
use huddle_common::config::DatabaseConfig;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Shared database state passed through Axum extractors.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Open the pool described by `config`, creating the file if missing.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        tracing::info!(url = %config.url, "Connecting to SQLite...");
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_with(options)
            .await?;

        tracing::info!("Connected to SQLite");
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema applied.
    ///
    /// A single connection that never idles out, since every new connection to
    /// `:memory:` would see an empty database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Round-trip a trivial query; used by the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Whether `err` is a uniqueness violation reported by the database.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
