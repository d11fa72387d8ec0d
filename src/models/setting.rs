//! Configuration setting model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted key/value pair, optionally scoped to a library.
///
/// Plugin settings use namespaced keys of the form `<plugin_name>.<field_key>`.
/// Settings with no library (such as the scheduler lease) are global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConfigurationSetting {
    pub id: i32,
    pub library_id: Option<i32>,
    pub key: String,
    pub value: Option<String>,
}

/// Build the namespaced setting key for a plugin field
pub fn namespaced_key(plugin_name: &str, field_key: &str) -> String {
    format!("{}.{}", plugin_name, field_key)
}

/// Prefix shared by every setting key of a plugin
pub fn plugin_prefix(plugin_name: &str) -> String {
    format!("{}.", plugin_name)
}

impl ConfigurationSetting {
    /// Field key with the plugin namespace stripped, if the setting belongs to the plugin
    pub fn field_key<'a>(&'a self, plugin_name: &str) -> Option<&'a str> {
        self.key
            .strip_prefix(plugin_name)
            .and_then(|rest| rest.strip_prefix('.'))
    }
}

/// A setting to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSetting {
    pub library_id: i32,
    pub key: String,
    pub value: String,
}

/// A new value for an existing setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingUpdate {
    pub setting: ConfigurationSetting,
    pub value: String,
}

/// Mutations computed for one save request, applied as a single unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsChanges {
    pub inserts: Vec<NewSetting>,
    pub updates: Vec<SettingUpdate>,
    pub deletes: Vec<ConfigurationSetting>,
}

impl SettingsChanges {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}
