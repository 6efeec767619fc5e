//! Database module providing connection management, migrations, and the image store.

pub mod images;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::migration::Migrator;
use crate::models::{Image, ImageStatus, ProcessedPaths};

pub use memory::MemoryImageStore;

/// Result of a status write against a record that may have been deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// No row matched: the record was deleted, or its state no longer
    /// satisfies the write's guard.
    Missing,
}

/// Persistent store of image records.
///
/// Implementations must be safe to share between HTTP handlers and the worker.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Insert a `pending` record with a freshly generated id.
    async fn create(&self, filename: &str, original_path: &str) -> AppResult<Image>;

    /// Fetch a record; `AppError::NotFound` when no row has this id.
    async fn get(&self, id: Uuid) -> AppResult<Image>;

    /// Set status and artifact paths, refreshing `updated_at`.
    async fn update_status(
        &self,
        id: Uuid,
        status: ImageStatus,
        paths: &ProcessedPaths,
    ) -> AppResult<UpdateOutcome>;

    /// Move a record to `failed`, recording why. A `processed` record is left
    /// as is and reported `Missing`.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> AppResult<UpdateOutcome>;

    /// Reset a record to `pending` before it is published again.
    async fn mark_requeued(&self, id: Uuid) -> AppResult<Image>;

    /// Sweep requeue: bumps `requeue_count` only while the record is still
    /// `pending` with `seen_requeues`, i.e. unchanged since it was found stale.
    async fn requeue_stale(&self, id: Uuid, seen_requeues: i32) -> AppResult<UpdateOutcome>;

    /// Sweep give-up: moves to `failed` under the same guard as `requeue_stale`.
    async fn fail_stale(
        &self,
        id: Uuid,
        seen_requeues: i32,
        reason: &str,
    ) -> AppResult<UpdateOutcome>;

    /// Remove a record, returning it; `AppError::NotFound` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<Image>;

    /// Pending records not touched since `older_than`, oldest first.
    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Image>>;

    /// Connectivity probe.
    async fn ping(&self) -> AppResult<()>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration.
    pub async fn new(config: &Config) -> AppResult<Self> {
        let mut options = ConnectOptions::new(config.database.url.clone());
        options
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(DbPool { conn })
    }

    /// Get access to the connection for executing queries.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Apply pending schema migrations.
    pub async fn run_migrations(&self) -> AppResult<()> {
        Migrator::up(&self.conn, None)
            .await
            .map_err(|e| AppError::Database(format!("Failed to run migrations: {}", e)))
    }

    pub(crate) async fn select_one(&self) -> AppResult<()> {
        let stmt = sea_orm::Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_owned(),
        );
        self.conn
            .query_one_raw(stmt)
            .await
            .map_err(|e| AppError::Database(format!("Database ping failed: {}", e)))?;
        Ok(())
    }
}
