//! services/insight/src/adapters/connection.rs
//!
//! The connection provider for the ERP database. It implements the
//! `ConnectionService` port and hands out scoped connections to the repository.

use async_trait::async_trait;
use chrono::Local;
use erp_insight_core::domain::DatabaseInfo;
use erp_insight_core::ports::ConnectionService;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Opens connections to the configured PostgreSQL database.
///
/// Connections are established lazily; pooling is left to the driver.
#[derive(Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
    server_name: String,
}

impl PgConnectionProvider {
    /// Creates a provider from a connection string without touching the network.
    pub fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::from_str(database_url)?
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(5));
        let server_name = format!("{}:{}", options.get_host(), options.get_port());

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);

        Ok(Self { pool, server_name })
    }

    /// Acquires a live connection. It is released when the guard is dropped.
    pub async fn open_connection(&self) -> Result<PoolConnection<Postgres>, sqlx::Error> {
        let conn = self.pool.acquire().await?;
        debug!("Database connection acquired.");
        Ok(conn)
    }

    async fn read_server_info(&self) -> Result<DatabaseInfo, sqlx::Error> {
        let mut conn = self.open_connection().await?;
        let (server_version, database_name): (String, String) =
            sqlx::query_as("SELECT version(), current_database()")
                .fetch_one(&mut *conn)
                .await?;

        Ok(DatabaseInfo {
            connected: true,
            server_name: self.server_name.clone(),
            database_name,
            server_version,
            checked_at: Local::now(),
        })
    }
}

//=========================================================================================
// `ConnectionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConnectionService for PgConnectionProvider {
    async fn test_connection(&self) -> bool {
        match self.open_connection().await {
            Ok(_conn) => {
                info!("Database connection verified.");
                true
            }
            Err(e) => {
                error!("Failed to verify the database connection: {}", e);
                false
            }
        }
    }

    async fn server_info(&self) -> DatabaseInfo {
        match self.read_server_info().await {
            Ok(info) => {
                info!(
                    "Database info retrieved: {}/{}",
                    info.server_name, info.database_name
                );
                info
            }
            Err(e) => {
                error!("Failed to read database info: {}", e);
                DatabaseInfo::disconnected()
            }
        }
    }
}
