//! Repository layer for database operations
//!
//! The services only see the store traits below; `Repository` wires the
//! Postgres implementations and `memory::MemoryStore` backs tests.

pub mod libraries;
pub mod memory;
pub mod settings;
pub mod timestamps;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{ConfigurationSetting, Library, SettingsChanges, Timestamp},
};

/// Persisted configuration settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a setting that is not scoped to any library
    async fn get_global(&self, key: &str) -> AppResult<Option<ConfigurationSetting>>;

    /// Create or overwrite a global setting in its own transaction
    async fn put_global(&self, key: &str, value: &str) -> AppResult<()>;

    /// All settings of a library whose key lives in the plugin's namespace
    async fn list_for_plugin(
        &self,
        library_id: i32,
        plugin_name: &str,
    ) -> AppResult<Vec<ConfigurationSetting>>;

    /// Apply inserts, then updates, then deletes atomically
    async fn apply_changes(&self, changes: &SettingsChanges) -> AppResult<()>;
}

/// Per-service run timestamps
#[async_trait]
pub trait TimestampStore: Send + Sync {
    async fn get_timestamp(&self, service: &str) -> AppResult<Option<Timestamp>>;

    /// Create or update the record of a service with the given run window
    async fn record_run(
        &self,
        service: &str,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// Resolves libraries by short name
#[async_trait]
pub trait LibraryResolver: Send + Sync {
    async fn find_by_short_name(&self, short_name: &str) -> AppResult<Option<Library>>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub libraries: libraries::LibrariesRepository,
    pub settings: settings::SettingsRepository,
    pub timestamps: timestamps::TimestampsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            libraries: libraries::LibrariesRepository::new(pool.clone()),
            settings: settings::SettingsRepository::new(pool.clone()),
            timestamps: timestamps::TimestampsRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Type-erased handles on the stores, shared by the services
#[derive(Clone)]
pub struct Stores {
    pub libraries: Arc<dyn LibraryResolver>,
    pub settings: Arc<dyn SettingsStore>,
    pub timestamps: Arc<dyn TimestampStore>,
}

impl From<Repository> for Stores {
    fn from(repository: Repository) -> Self {
        Self {
            libraries: Arc::new(repository.libraries),
            settings: Arc::new(repository.settings),
            timestamps: Arc::new(repository.timestamps),
        }
    }
}

impl From<Arc<memory::MemoryStore>> for Stores {
    fn from(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            libraries: store.clone(),
            settings: store.clone(),
            timestamps: store,
        }
    }
}
