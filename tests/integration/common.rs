//! Shared fixtures

use std::io;
use std::sync::Arc;

use circulation_plugins::{
    config::SchedulerConfig,
    plugins::{PluginManifestEntry, PluginRegistry},
    repository::{memory::MemoryStore, Stores},
    services::{liveness::LivenessProbe, Services},
};

/// Liveness probe with a fixed answer
pub struct FixedProbe(pub bool);

impl LivenessProbe for FixedProbe {
    fn is_running(&self, pid: Option<u32>) -> io::Result<bool> {
        Ok(pid.is_some() && self.0)
    }
}

/// Manifest entry running a shell snippet
pub fn shell_plugin(name: &str, script: &str) -> PluginManifestEntry {
    PluginManifestEntry {
        name: name.to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        frequency: None,
        enabled: true,
        fields: None,
    }
}

pub fn services(
    store: &Arc<MemoryStore>,
    manifest: &[PluginManifestEntry],
    holder_running: bool,
) -> Services {
    Services::new(
        Stores::from(store.clone()),
        PluginRegistry::discover(manifest),
        SchedulerConfig::default(),
    )
    .with_probe(Arc::new(FixedProbe(holder_running)))
}
