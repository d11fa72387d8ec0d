//! Plugin scheduler
//!
//! One scheduler pass runs either a single target plugin or every registered
//! plugin, one after the other. A plugin runs when it is due (enough hours
//! since its last successful finish) or when the pass is forced.

use chrono::{DateTime, Duration, Utc};
use std::any::Any;
use std::sync::Arc;

use super::lease::{Lease, LeaseOutcome};
use crate::{
    error::{AppError, AppResult},
    plugins::{Plugin, PluginError, PluginRegistry},
    repository::TimestampStore,
};

/// Hours between two runs of a plugin that declares no frequency
pub const DEFAULT_FREQUENCY_HOURS: u32 = 24;

/// Prefix of the timestamp service name of a plugin
pub const SERVICE_PLUGIN_PREFIX: &str = "plugin ";

pub fn service_name(plugin_name: &str) -> String {
    format!("{}{}", SERVICE_PLUGIN_PREFIX, plugin_name)
}

/// Whether a plugin last finished at `last_finish` should run again at `now`.
/// A plugin that never finished is always due. A next run beyond the
/// representable calendar never comes due.
pub fn is_due(last_finish: Option<DateTime<Utc>>, frequency_hours: u32, now: DateTime<Utc>) -> bool {
    let Some(finish) = last_finish else {
        return true;
    };
    finish
        .checked_add_signed(Duration::hours(i64::from(frequency_hours)))
        .map_or(false, |next| now > next)
}

/// What happened to one plugin during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRunOutcome {
    Ran {
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    },
    NotDue {
        last_finish: DateTime<Utc>,
        frequency_hours: u32,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRun {
    pub name: String,
    pub outcome: PluginRunOutcome,
}

/// Result of a scheduler pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub lease: LeaseOutcome,
    /// False when the pass stopped at the lease check
    pub proceeded: bool,
    pub runs: Vec<PluginRun>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| matches!(run.outcome, PluginRunOutcome::Failed { .. }))
            .count()
    }

    /// The first failed plugin of the pass as an error
    pub fn error(&self) -> Option<AppError> {
        self.runs.iter().find_map(|run| match &run.outcome {
            PluginRunOutcome::Failed { reason } => Some(AppError::PluginRuntime {
                plugin: run.name.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        })
    }
}

pub struct Scheduler {
    pid: u32,
    target_plugin_name: Option<String>,
    force: bool,
    default_frequency_hours: u32,
    plugins: PluginRegistry,
    lease: Lease,
    timestamps: Arc<dyn TimestampStore>,
}

impl Scheduler {
    pub fn new(
        pid: u32,
        target_plugin_name: Option<String>,
        force: bool,
        plugins: PluginRegistry,
        lease: Lease,
        timestamps: Arc<dyn TimestampStore>,
    ) -> Self {
        Self {
            pid,
            target_plugin_name,
            force,
            default_frequency_hours: DEFAULT_FREQUENCY_HOURS,
            plugins,
            lease,
            timestamps,
        }
    }

    pub fn with_default_frequency(mut self, hours: u32) -> Self {
        self.default_frequency_hours = hours;
        self
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Run one scheduler pass.
    ///
    /// Stops before running anything when another live process holds the
    /// lease, unless the pass is forced or targets a single plugin. Fails only
    /// when the target plugin is unknown; plugin failures end up in the report.
    pub async fn run(&self) -> AppResult<RunReport> {
        let lease = self.lease.try_acquire(self.pid).await;
        let bypass = self.force || self.target_plugin_name.is_some();

        if !lease.is_acquired() {
            if !bypass {
                tracing::info!("Scheduler lease {}, finishing this one.", lease);
                return Ok(RunReport {
                    lease,
                    proceeded: false,
                    runs: Vec::new(),
                });
            }
            tracing::warn!("Scheduler lease {}, running anyway", lease);
        }

        let mut runs = Vec::new();

        if let Some(target) = &self.target_plugin_name {
            let plugin = self.plugins.get(target).ok_or_else(|| {
                tracing::error!("Cannot find plugin {}.", target);
                AppError::PluginNotFound(target.clone())
            })?;
            runs.push(self.run_plugin(target, plugin).await);
        } else {
            for (name, plugin) in self.plugins.iter() {
                runs.push(self.run_plugin(name, plugin).await);
            }
        }

        let report = RunReport {
            lease,
            proceeded: true,
            runs,
        };
        tracing::info!(
            "Scheduler pass finished: {} plugin(s), {} failure(s)",
            report.runs.len(),
            report.failures()
        );
        Ok(report)
    }

    /// Run a plugin if it is due. Never fails: every problem becomes an outcome.
    pub async fn run_plugin(&self, name: &str, plugin: &Arc<dyn Plugin>) -> PluginRun {
        tracing::info!("Start to run plugin {}", name);
        let outcome = self.try_run_plugin(name, plugin).await;

        if let PluginRunOutcome::Failed { reason } = &outcome {
            tracing::warn!("Cannot run plugin {}. {}.", name, reason);
        }

        PluginRun {
            name: name.to_string(),
            outcome,
        }
    }

    async fn try_run_plugin(&self, name: &str, plugin: &Arc<dyn Plugin>) -> PluginRunOutcome {
        let frequency_hours = plugin.frequency().unwrap_or(self.default_frequency_hours);
        let service = service_name(name);

        if !self.force {
            let last_finish = match self.timestamps.get_timestamp(&service).await {
                Ok(timestamp) => timestamp.and_then(|t| t.finish),
                Err(e) => {
                    return PluginRunOutcome::Failed {
                        reason: format!("cannot read last run: {}", e),
                    }
                }
            };

            if let Some(last_finish) = last_finish {
                if !is_due(Some(last_finish), frequency_hours, Utc::now()) {
                    tracing::info!(
                        "It is not time to run {}! You can force it using --force argument.",
                        name
                    );
                    return PluginRunOutcome::NotDue {
                        last_finish,
                        frequency_hours,
                    };
                }
            }
        }

        let start = Utc::now();
        // Own task so that a panicking plugin surfaces as a JoinError
        let task = {
            let plugin = Arc::clone(plugin);
            let name = name.to_string();
            tokio::spawn(async move { plugin.run_scripts(&name).await })
        };
        let result = match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(PluginError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(PluginError::Failed(e.to_string())),
        };
        let finish = Utc::now();

        if let Err(e) = result {
            tracing::error!("Error while running plugin {}: {}", name, e);
            return PluginRunOutcome::Failed {
                reason: e.to_string(),
            };
        }

        if let Err(e) = self.timestamps.record_run(&service, start, finish).await {
            tracing::error!("Error while updating timestamp of plugin {}: {}", name, e);
        }

        tracing::info!(
            "Plugin {} ran in {} seconds",
            name,
            (finish - start).num_milliseconds() as f64 / 1000.0
        );
        PluginRunOutcome::Ran { start, finish }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
