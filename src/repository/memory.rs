//! In-memory store implementing every store trait
//!
//! Writes are staged on a copy and swapped in only when the whole operation
//! succeeds, which gives the same all-or-nothing behavior as a database
//! transaction. Failures can be injected per key to exercise rollbacks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::{LibraryResolver, SettingsStore, TimestampStore};
use crate::{
    error::{AppError, AppResult},
    models::{ConfigurationSetting, Library, SettingsChanges, Timestamp},
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    libraries: Vec<Library>,
    settings: Vec<ConfigurationSetting>,
    timestamps: Vec<Timestamp>,
    next_id: i32,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    /// Setting keys or timestamp services whose writes fail
    keys: HashSet<String>,
    reads: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failures: Mutex<FailurePlan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failures(&self) -> MutexGuard<'_, FailurePlan> {
        self.failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_write(&self, key: &str) -> AppResult<()> {
        if self.failures().keys.contains(key) {
            return Err(AppError::Storage(format!("injected write failure on {}", key)));
        }
        Ok(())
    }

    fn check_read(&self) -> AppResult<()> {
        if self.failures().reads {
            return Err(AppError::Storage("injected read failure".to_string()));
        }
        Ok(())
    }

    /// Make every write touching `key` (setting key or timestamp service) fail
    pub fn fail_writes_on(&self, key: impl Into<String>) {
        self.failures().keys.insert(key.into());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.failures().reads = fail;
    }

    pub fn clear_failures(&self) {
        let mut failures = self.failures();
        failures.keys.clear();
        failures.reads = false;
    }

    pub fn add_library(&self, short_name: &str, name: &str) -> Library {
        let mut state = self.state();
        let library = Library {
            id: state.next_id(),
            short_name: short_name.to_string(),
            name: Some(name.to_string()),
        };
        state.libraries.push(library.clone());
        library
    }

    /// Seed a setting directly, bypassing failure injection
    pub fn insert_setting(
        &self,
        library_id: Option<i32>,
        key: &str,
        value: Option<&str>,
    ) -> ConfigurationSetting {
        let mut state = self.state();
        let setting = ConfigurationSetting {
            id: state.next_id(),
            library_id,
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        state.settings.push(setting.clone());
        setting
    }

    /// Seed a timestamp directly, bypassing failure injection
    pub fn set_timestamp(
        &self,
        service: &str,
        start: Option<DateTime<Utc>>,
        finish: Option<DateTime<Utc>>,
    ) {
        let mut state = self.state();
        state.timestamps.retain(|t| t.service != service);
        let id = state.next_id();
        state.timestamps.push(Timestamp {
            id,
            service: service.to_string(),
            service_type: Some(Timestamp::SCRIPT_TYPE.to_string()),
            start,
            finish,
        });
    }

    /// Snapshot of every stored setting, in insertion order
    pub fn settings(&self) -> Vec<ConfigurationSetting> {
        self.state().settings.clone()
    }

    pub fn timestamp(&self, service: &str) -> Option<Timestamp> {
        self.state()
            .timestamps
            .iter()
            .find(|t| t.service == service)
            .cloned()
    }
}

#[async_trait]
impl LibraryResolver for MemoryStore {
    async fn find_by_short_name(&self, short_name: &str) -> AppResult<Option<Library>> {
        self.check_read()?;
        Ok(self
            .state()
            .libraries
            .iter()
            .find(|l| l.short_name == short_name)
            .cloned())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_global(&self, key: &str) -> AppResult<Option<ConfigurationSetting>> {
        self.check_read()?;
        Ok(self
            .state()
            .settings
            .iter()
            .find(|s| s.library_id.is_none() && s.key == key)
            .cloned())
    }

    async fn put_global(&self, key: &str, value: &str) -> AppResult<()> {
        self.check_write(key)?;
        let mut state = self.state();
        if let Some(existing) = state
            .settings
            .iter_mut()
            .find(|s| s.library_id.is_none() && s.key == key)
        {
            existing.value = Some(value.to_string());
            return Ok(());
        }
        let id = state.next_id();
        state.settings.push(ConfigurationSetting {
            id,
            library_id: None,
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    async fn list_for_plugin(
        &self,
        library_id: i32,
        plugin_name: &str,
    ) -> AppResult<Vec<ConfigurationSetting>> {
        self.check_read()?;
        Ok(self
            .state()
            .settings
            .iter()
            .filter(|s| s.library_id == Some(library_id) && s.field_key(plugin_name).is_some())
            .cloned()
            .collect())
    }

    async fn apply_changes(&self, changes: &SettingsChanges) -> AppResult<()> {
        let mut state = self.state();
        let mut staged = state.clone();

        for insert in &changes.inserts {
            self.check_write(&insert.key)?;
            let duplicate = staged
                .settings
                .iter()
                .any(|s| s.library_id == Some(insert.library_id) && s.key == insert.key);
            if duplicate {
                return Err(AppError::Storage(format!(
                    "duplicate setting {} for library {}",
                    insert.key, insert.library_id
                )));
            }
            let id = staged.next_id();
            staged.settings.push(ConfigurationSetting {
                id,
                library_id: Some(insert.library_id),
                key: insert.key.clone(),
                value: Some(insert.value.clone()),
            });
        }

        for update in &changes.updates {
            self.check_write(&update.setting.key)?;
            let existing = staged
                .settings
                .iter_mut()
                .find(|s| s.id == update.setting.id)
                .ok_or_else(|| {
                    AppError::Storage(format!("setting {} no longer exists", update.setting.id))
                })?;
            existing.value = Some(update.value.clone());
        }

        for setting in &changes.deletes {
            self.check_write(&setting.key)?;
            let before = staged.settings.len();
            staged.settings.retain(|s| s.id != setting.id);
            if staged.settings.len() == before {
                return Err(AppError::Storage(format!(
                    "setting {} no longer exists",
                    setting.id
                )));
            }
        }

        *state = staged;
        Ok(())
    }
}

#[async_trait]
impl TimestampStore for MemoryStore {
    async fn get_timestamp(&self, service: &str) -> AppResult<Option<Timestamp>> {
        self.check_read()?;
        Ok(self.timestamp(service))
    }

    async fn record_run(
        &self,
        service: &str,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
    ) -> AppResult<()> {
        self.check_write(service)?;
        let mut state = self.state();
        if let Some(existing) = state.timestamps.iter_mut().find(|t| t.service == service) {
            existing.start = Some(start);
            existing.finish = Some(finish);
            return Ok(());
        }
        let id = state.next_id();
        state.timestamps.push(Timestamp {
            id,
            service: service.to_string(),
            service_type: Some(Timestamp::SCRIPT_TYPE.to_string()),
            start: Some(start),
            finish: Some(finish),
        });
        Ok(())
    }
}
