//! Data models for the plugin subsystem

pub mod field;
pub mod library;
pub mod setting;
pub mod timestamp;

// Re-export commonly used types
pub use field::{FieldDescriptor, FieldOption, PluginField};
pub use library::Library;
pub use setting::{ConfigurationSetting, NewSetting, SettingUpdate, SettingsChanges};
pub use timestamp::Timestamp;
