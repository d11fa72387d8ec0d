//! Plugin running an external script

use async_trait::async_trait;
use tokio::process::Command;

use super::{Plugin, PluginError, PluginManifestEntry};
use crate::models::FieldDescriptor;

/// Environment variable telling the script which plugin it runs as
pub const PLUGIN_NAME_ENV: &str = "CIRCULATION_PLUGIN";

#[derive(Debug, Clone)]
pub struct CommandPlugin {
    command: String,
    args: Vec<String>,
    frequency: Option<u32>,
    fields: Option<Vec<FieldDescriptor>>,
}

impl CommandPlugin {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            frequency: None,
            fields: None,
        }
    }

    pub fn from_manifest(entry: &PluginManifestEntry) -> Self {
        Self {
            command: entry.command.clone(),
            args: entry.args.clone(),
            frequency: parse_frequency(&entry.name, entry.frequency.as_deref()),
            fields: entry.fields.clone(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Whole hours from the manifest. Anything else falls back to the scheduler default.
fn parse_frequency(plugin: &str, raw: Option<&str>) -> Option<u32> {
    let raw = raw?;
    match raw.trim().parse::<u32>() {
        Ok(hours) => Some(hours),
        Err(_) => {
            tracing::warn!(
                "Unable to convert frequency {:?} of plugin {} to hours, using the default",
                raw,
                plugin
            );
            None
        }
    }
}

#[async_trait]
impl Plugin for CommandPlugin {
    fn frequency(&self) -> Option<u32> {
        self.frequency
    }

    fn fields(&self) -> Option<&[FieldDescriptor]> {
        self.fields.as_deref()
    }

    async fn run_scripts(&self, name: &str) -> Result<(), PluginError> {
        tracing::debug!("Running {} {:?} for plugin {}", self.command, self.args, name);

        let status = Command::new(&self.command)
            .args(&self.args)
            .env(PLUGIN_NAME_ENV, name)
            .status()
            .await
            .map_err(|source| PluginError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(PluginError::Exit(status))
        }
    }
}
