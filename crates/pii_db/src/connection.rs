//! The `ConnectionProvider` port and a reference `sqlx`-backed implementation.
//!
//! The core treats the live connection as an opaque, scoped resource:
//! acquired once per scan and released on every exit path, including
//! cancellation. `ScopedConnection` carries that release behavior via
//! `Drop` so a panicking or early-returning caller can't leak it.

use crate::error::{DbError, Result};
use crate::types::DbKind;
use async_trait::async_trait;
use pii_protocol::ConnectionId;
use sqlx::any::{AnyConnectOptions, AnyPool, AnyPoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A live connection scope, borrowed for the duration of one scan. All
/// per-column queries issued during `SAMPLING` and `DETECTING_PII` borrow
/// child connections from the same underlying pool.
#[derive(Clone)]
pub struct ScopedConnection {
    pub connection_id: ConnectionId,
    pub pool: AnyPool,
    pub kind: DbKind,
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        debug!(connection_id = %self.connection_id, "scan connection scope released");
    }
}

impl ScopedConnection {
    /// Driver-reported product version string, for the report's
    /// `db_product_version` field. Best-effort: falls back to `"unknown"`
    /// rather than failing a scan over a cosmetic field.
    pub async fn product_version(&self) -> String {
        let query = match self.kind {
            DbKind::Postgres => "SHOW server_version",
            DbKind::MySql => "SELECT VERSION()",
            DbKind::Sqlite => "SELECT sqlite_version()",
        };

        match sqlx::query(query).fetch_one(&self.pool).await {
            Ok(row) => row.try_get::<String, _>(0).unwrap_or_else(|_| "unknown".to_string()),
            Err(e) => {
                warn!(connection_id = %self.connection_id, error = %e, "could not determine db product version");
                "unknown".to_string()
            }
        }
    }
}

/// Port the core depends on to turn a `ConnectionId` into a live,
/// poolable connection. The concrete provider (secret resolution, driver
/// selection, pool sizing policy) lives outside the core; this crate ships
/// one reference implementation backed by `sqlx::AnyPool` over a simple
/// registered-URL map.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self, connection_id: &ConnectionId) -> Result<ScopedConnection>;
    async fn release(&self, connection: ScopedConnection);
    async fn is_valid(&self, connection_id: &ConnectionId) -> bool;
}

/// Reference `ConnectionProvider`: a static map of `ConnectionId -> DSN`,
/// with lazily-created and cached `AnyPool`s. Good enough to exercise the
/// core end to end against a real Postgres/MySQL/SQLite database; a
/// production deployment would swap this for one backed by a secrets
/// manager and a connection-pool-per-tenant policy.
pub struct SqlxConnectionProvider {
    dsns: HashMap<ConnectionId, String>,
    pools: RwLock<HashMap<ConnectionId, AnyPool>>,
    max_connections: u32,
}

struct ResolvedPool {
    pool: AnyPool,
    kind: DbKind,
}

impl SqlxConnectionProvider {
    pub fn new(dsns: HashMap<ConnectionId, String>) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            dsns,
            pools: RwLock::new(HashMap::new()),
            max_connections: 8,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    fn dsn_for(&self, connection_id: &ConnectionId) -> Result<&str> {
        self.dsns
            .get(connection_id)
            .map(String::as_str)
            .ok_or_else(|| DbError::ConnectionNotFound(connection_id.to_string()))
    }

    async fn pool_for(&self, connection_id: &ConnectionId) -> Result<ResolvedPool> {
        let dsn = self.dsn_for(connection_id)?;
        let kind = DbKind::from_dsn(dsn)
            .ok_or_else(|| DbError::UnsupportedDriver(dsn.to_string()))?;

        if let Some(pool) = self.pools.read().await.get(connection_id) {
            return Ok(ResolvedPool { pool: pool.clone(), kind });
        }

        let opts = AnyConnectOptions::from_str(dsn).map_err(DbError::Sqlx)?;
        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(opts)
            .await?;

        self.pools.write().await.insert(connection_id.clone(), pool.clone());
        info!(connection_id = %connection_id, "opened connection pool");
        Ok(ResolvedPool { pool, kind })
    }
}

#[async_trait]
impl ConnectionProvider for SqlxConnectionProvider {
    async fn acquire(&self, connection_id: &ConnectionId) -> Result<ScopedConnection> {
        let resolved = self.pool_for(connection_id).await?;
        Ok(ScopedConnection {
            connection_id: connection_id.clone(),
            pool: resolved.pool,
            kind: resolved.kind,
        })
    }

    async fn release(&self, connection: ScopedConnection) {
        drop(connection);
    }

    async fn is_valid(&self, connection_id: &ConnectionId) -> bool {
        match self.pool_for(connection_id).await {
            Ok(resolved) => sqlx::query("SELECT 1").execute(&resolved.pool).await.is_ok(),
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "connection validity check failed");
                false
            }
        }
    }
}

/// In-process registry so callers can register connections by id without
/// constructing a fresh provider per test/demo.
pub fn static_provider(dsns: impl IntoIterator<Item = (ConnectionId, String)>) -> Arc<dyn ConnectionProvider> {
    Arc::new(SqlxConnectionProvider::new(dsns.into_iter().collect()))
}
