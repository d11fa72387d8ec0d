//! Business logic services

pub mod lease;
pub mod liveness;
pub mod plugin_settings;
pub mod scheduler;

use std::sync::Arc;

use crate::{
    config::SchedulerConfig,
    error::{AppError, AppResult},
    plugins::{Plugin, PluginRegistry},
    repository::Stores,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub stores: Stores,
    pub plugins: PluginRegistry,
    pub plugin_settings: plugin_settings::PluginSettingsService,
    probe: Arc<dyn liveness::LivenessProbe>,
    scheduler_config: SchedulerConfig,
}

impl Services {
    pub fn new(stores: Stores, plugins: PluginRegistry, scheduler_config: SchedulerConfig) -> Self {
        Self {
            plugin_settings: plugin_settings::PluginSettingsService::from_stores(&stores),
            stores,
            plugins,
            probe: Arc::new(liveness::SignalProbe),
            scheduler_config,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn liveness::LivenessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn lease(&self) -> lease::Lease {
        lease::Lease::new(self.stores.settings.clone(), self.probe.clone())
            .with_key(self.scheduler_config.lease_key.clone())
    }

    /// Scheduler for one pass on behalf of process `pid`
    pub fn scheduler(&self, pid: u32, target_plugin_name: Option<String>, force: bool) -> scheduler::Scheduler {
        scheduler::Scheduler::new(
            pid,
            target_plugin_name,
            force,
            self.plugins.clone(),
            self.lease(),
            self.stores.timestamps.clone(),
        )
        .with_default_frequency(self.scheduler_config.default_frequency_hours)
    }

    pub fn plugin(&self, name: &str) -> AppResult<&Arc<dyn Plugin>> {
        self.plugins
            .get(name)
            .ok_or_else(|| AppError::PluginNotFound(name.to_string()))
    }
}
