//! Per-library plugin settings
//!
//! A save request is a full snapshot of a plugin's values for one library:
//! stored fields missing from the request are deleted, not kept.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{
        setting::namespaced_key, ConfigurationSetting, FieldDescriptor, Library, NewSetting,
        PluginField, SettingUpdate, SettingsChanges,
    },
    plugins::Plugin,
    repository::{LibraryResolver, SettingsStore, Stores},
};

/// Submitted values by bare field key; `None` asks for deletion
pub type SubmittedValues = IndexMap<String, Option<String>>;

/// Compute the mutations turning `saved` into the `submitted` snapshot.
///
/// `saved` is keyed by bare field key. Empty strings are ordinary values.
pub fn plan_changes(
    library_id: i32,
    plugin_name: &str,
    saved: &IndexMap<String, ConfigurationSetting>,
    submitted: &SubmittedValues,
) -> SettingsChanges {
    let mut changes = SettingsChanges::default();

    for (key, value) in submitted {
        if key.is_empty() {
            continue;
        }
        match (saved.get(key), value) {
            (None, Some(value)) => changes.inserts.push(NewSetting {
                library_id,
                key: namespaced_key(plugin_name, key),
                value: value.clone(),
            }),
            (Some(setting), None) => changes.deletes.push(setting.clone()),
            (Some(setting), Some(value)) if setting.value.as_deref() != Some(value.as_str()) => {
                changes.updates.push(SettingUpdate {
                    setting: setting.clone(),
                    value: value.clone(),
                })
            }
            _ => {}
        }
    }

    changes.deletes.extend(
        saved
            .iter()
            .filter(|(key, _)| !submitted.contains_key(*key))
            .map(|(_, setting)| setting.clone()),
    );

    changes
}

#[derive(Clone)]
pub struct PluginSettingsService {
    libraries: Arc<dyn LibraryResolver>,
    settings: Arc<dyn SettingsStore>,
}

impl PluginSettingsService {
    pub fn new(libraries: Arc<dyn LibraryResolver>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            libraries,
            settings,
        }
    }

    pub fn from_stores(stores: &Stores) -> Self {
        Self::new(stores.libraries.clone(), stores.settings.clone())
    }

    async fn library(&self, short_name: &str) -> AppResult<Library> {
        self.libraries
            .find_by_short_name(short_name)
            .await?
            .ok_or_else(|| AppError::LibraryNotFound(short_name.to_string()))
    }

    /// Stored settings of the plugin for a library, keyed by bare field key
    async fn saved_values(
        &self,
        library: &Library,
        plugin_name: &str,
    ) -> AppResult<IndexMap<String, ConfigurationSetting>> {
        let settings = self
            .settings
            .list_for_plugin(library.id, plugin_name)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Cannot load {} settings of library {}: {}",
                    plugin_name,
                    library.short_name,
                    e
                );
                e
            })?;

        Ok(settings
            .into_iter()
            .filter_map(|setting| {
                let key = setting.field_key(plugin_name)?.to_string();
                Some((key, setting))
            })
            .collect())
    }

    /// Field descriptors of a plugin with the effective value for a library
    pub async fn get_fields(
        &self,
        library_short_name: &str,
        plugin_name: &str,
        schema: Option<&[FieldDescriptor]>,
    ) -> AppResult<Vec<PluginField>> {
        let library = self.library(library_short_name).await?;

        let Some(schema) = schema else {
            return Ok(Vec::new());
        };

        let saved = self.saved_values(&library, plugin_name).await?;

        Ok(schema
            .iter()
            .map(|descriptor| {
                let stored = saved
                    .get(&descriptor.key)
                    .and_then(|setting| setting.value.clone());
                // An empty default declares no default
                let default = descriptor.default.clone().filter(|d| !d.is_empty());
                PluginField {
                    value: stored.or(default),
                    descriptor: descriptor.clone(),
                }
            })
            .collect())
    }

    /// Reconcile the stored settings of a plugin with a submitted snapshot.
    /// Returns the changes that were applied.
    pub async fn save_fields(
        &self,
        library_short_name: &str,
        plugin_name: &str,
        schema: Option<&[FieldDescriptor]>,
        values: &SubmittedValues,
    ) -> AppResult<SettingsChanges> {
        let library = self.library(library_short_name).await?;

        if schema.is_none() {
            return Err(AppError::SchemaMismatch(format!(
                "plugin {} does not expect values",
                plugin_name
            )));
        }

        let saved = self.saved_values(&library, plugin_name).await?;
        let changes = plan_changes(library.id, plugin_name, &saved, values);

        tracing::debug!(
            "Saving {} settings for library {}: {} insert(s), {} update(s), {} delete(s)",
            plugin_name,
            library.short_name,
            changes.inserts.len(),
            changes.updates.len(),
            changes.deletes.len()
        );

        if changes.is_empty() {
            return Ok(changes);
        }

        self.settings.apply_changes(&changes).await.map_err(|e| {
            tracing::error!(
                "Error while saving {} settings of library {}: {}",
                plugin_name,
                library.short_name,
                e
            );
            e
        })?;

        Ok(changes)
    }

    pub async fn get_plugin_fields(
        &self,
        library_short_name: &str,
        plugin_name: &str,
        plugin: &dyn Plugin,
    ) -> AppResult<Vec<PluginField>> {
        self.get_fields(library_short_name, plugin_name, plugin.fields())
            .await
    }

    pub async fn save_plugin_fields(
        &self,
        library_short_name: &str,
        plugin_name: &str,
        plugin: &dyn Plugin,
        values: &SubmittedValues,
    ) -> AppResult<SettingsChanges> {
        self.save_fields(library_short_name, plugin_name, plugin.fields(), values)
            .await
    }
}
