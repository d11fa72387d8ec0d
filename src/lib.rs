//! Circulation Manager plugin subsystem
//!
//! Schedules externally supplied plugins across cron-triggered processes and
//! reconciles their per-library configuration settings.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

pub mod config;
pub mod error;
pub mod models;
pub mod plugins;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use plugins::PluginRegistry;
use repository::{Repository, Stores};
use services::Services;

/// Application state shared by every command
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
}

impl AppState {
    /// Connect to the database, run migrations and discover the plugins of the manifest
    pub async fn connect(config: AppConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;

        tracing::debug!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to run database migrations: {}", e)))?;

        let stores = Stores::from(Repository::new(pool));
        Ok(Self::with_stores(config, stores))
    }

    /// Build the state over already constructed stores
    pub fn with_stores(config: AppConfig, stores: Stores) -> Self {
        let plugins = PluginRegistry::discover(&config.plugins);
        let services = Services::new(stores, plugins, config.scheduler.clone());

        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
