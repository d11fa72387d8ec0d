//! Plugin capability interface and registry
//!
//! Plugins are registered from the manifest in the configuration file, in
//! manifest order, which is also the order the scheduler runs them in.

pub mod command;

use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::FieldDescriptor,
};

pub use command::CommandPlugin;

/// Prefix carried by legacy plugin package names, stripped on registration
pub const PLUGIN_PREFIX: &str = "cm-plugin-";

// No dots: plugin names namespace setting keys as "<plugin>.<field>"
static PLUGIN_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("plugin name pattern"));

/// Failure reported by a plugin run
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("cannot start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("script exited with {0}")]
    Exit(std::process::ExitStatus),

    #[error("plugin panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

/// A unit of scheduled work
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Minimum hours between two runs; `None` applies the scheduler default
    fn frequency(&self) -> Option<u32> {
        None
    }

    /// Configurable settings; `None` when the plugin takes no settings
    fn fields(&self) -> Option<&[FieldDescriptor]> {
        None
    }

    async fn run_scripts(&self, name: &str) -> Result<(), PluginError>;
}

/// One plugin declared in the configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PluginManifestEntry {
    #[validate(regex(
        path = *PLUGIN_NAME_RE,
        message = "Plugin names use lowercase letters, digits, '-' and '_'"
    ))]
    pub name: String,
    #[validate(length(min = 1, message = "Plugin command must not be empty"))]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Hours between runs, kept verbatim so that bad values can be reported
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub fields: Option<Vec<FieldDescriptor>>,
}

fn default_enabled() -> bool {
    true
}

impl PluginManifestEntry {
    /// Registry name, without the legacy package prefix
    pub fn plugin_name(&self) -> &str {
        self.name.strip_prefix(PLUGIN_PREFIX).unwrap_or(&self.name)
    }

    fn check(&self) -> AppResult<()> {
        self.validate().map_err(|e| AppError::Discovery {
            entry: self.name.clone(),
            reason: e.to_string(),
        })?;
        if self.plugin_name().is_empty() {
            return Err(AppError::Discovery {
                entry: self.name.clone(),
                reason: "name is only the plugin prefix".to_string(),
            });
        }
        Ok(())
    }
}

/// Plugins by name, in registration order
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: IndexMap<String, Arc<dyn Plugin>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the manifest. Invalid or duplicate entries are
    /// logged and left out, they never fail the whole discovery.
    pub fn discover(manifest: &[PluginManifestEntry]) -> Self {
        let mut registry = Self::new();

        for entry in manifest {
            if !entry.enabled {
                tracing::debug!("Plugin {} is disabled in the manifest", entry.name);
                continue;
            }

            let registered = entry.check().and_then(|_| {
                registry.register(entry.plugin_name(), Arc::new(CommandPlugin::from_manifest(entry)))
            });

            if let Err(e) = registered {
                tracing::error!("Skipping plugin: {}", e);
            }
        }

        tracing::info!("Discovered {} plugin(s)", registry.len());
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> AppResult<()> {
        let name = name.into();
        if self.plugins.contains_key(&name) {
            return Err(AppError::Discovery {
                entry: name,
                reason: "a plugin with this name is already registered".to_string(),
            });
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Builder form of [`register`](Self::register); duplicates are logged and ignored
    pub fn with(mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        if let Err(e) = self.register(name, plugin) {
            tracing::warn!("{}", e);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Plugin>)> {
        self.plugins.iter().map(|(name, plugin)| (name.as_str(), plugin))
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
