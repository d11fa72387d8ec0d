//! Plugin settings through the service container

use std::sync::Arc;

use circulation_plugins::{
    config::{AppConfig, DatabaseConfig, LoggingConfig, SchedulerConfig},
    models::FieldDescriptor,
    repository::{memory::MemoryStore, Stores},
    services::plugin_settings::SubmittedValues,
    AppError, AppState,
};

use crate::common::{services, shell_plugin};

fn submitted(json: serde_json::Value) -> SubmittedValues {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn test_save_and_read_back_through_plugin_schema() {
    let store = Arc::new(MemoryStore::new());
    store.add_library("NYPL", "New York Public Library");

    let mut reaper = shell_plugin("axis-reaper", "exit 0");
    reaper.fields = Some(vec![
        FieldDescriptor::new("collection"),
        FieldDescriptor::new("batch_size").with_default("50"),
        FieldDescriptor::new("notes"),
    ]);
    let services = services(&store, &[reaper], false);
    let plugin = services.plugin("axis-reaper").unwrap().clone();

    let changes = services
        .plugin_settings
        .save_plugin_fields(
            "NYPL",
            "axis-reaper",
            plugin.as_ref(),
            &submitted(serde_json::json!({ "collection": "main", "notes": "" })),
        )
        .await
        .unwrap();
    assert_eq!(changes.inserts.len(), 2);

    let fields = services
        .plugin_settings
        .get_plugin_fields("NYPL", "axis-reaper", plugin.as_ref())
        .await
        .unwrap();
    let json = serde_json::to_value(&fields).unwrap();
    assert_eq!(json[0]["value"], "main");
    assert_eq!(json[1]["value"], "50");
    assert_eq!(json[2]["value"], "");

    let changes = services
        .plugin_settings
        .save_plugin_fields(
            "NYPL",
            "axis-reaper",
            plugin.as_ref(),
            &submitted(serde_json::json!({ "collection": "main", "notes": null })),
        )
        .await
        .unwrap();
    assert!(changes.inserts.is_empty());
    assert!(changes.updates.is_empty());
    assert_eq!(changes.deletes.len(), 1);

    let fields = services
        .plugin_settings
        .get_plugin_fields("NYPL", "axis-reaper", plugin.as_ref())
        .await
        .unwrap();
    let json = serde_json::to_value(&fields).unwrap();
    assert!(json[2].get("value").is_none());
}

#[tokio::test]
async fn test_plugin_without_fields_rejects_values() {
    let store = Arc::new(MemoryStore::new());
    store.add_library("NYPL", "New York Public Library");
    let services = services(&store, &[shell_plugin("bare", "exit 0")], false);
    let plugin = services.plugin("bare").unwrap().clone();

    let fields = services
        .plugin_settings
        .get_plugin_fields("NYPL", "bare", plugin.as_ref())
        .await
        .unwrap();
    assert!(fields.is_empty());

    let err = services
        .plugin_settings
        .save_plugin_fields(
            "NYPL",
            "bare",
            plugin.as_ref(),
            &submitted(serde_json::json!({ "anything": "x" })),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_response().message, "The plugin does not expect values");
    assert!(store.settings().is_empty());
}

#[tokio::test]
async fn test_state_discovers_manifest_plugins() {
    let store = Arc::new(MemoryStore::new());
    let config = AppConfig {
        database: DatabaseConfig::default(),
        logging: LoggingConfig::default(),
        scheduler: SchedulerConfig::default(),
        plugins: vec![
            shell_plugin("cm-plugin-odl-import", "exit 0"),
            shell_plugin("bad.name", "exit 0"),
        ],
    };

    let state = AppState::with_stores(config, Stores::from(store));

    assert_eq!(state.services.plugins.names(), vec!["odl-import"]);
    assert!(matches!(
        state.services.plugin("bad.name"),
        Err(AppError::PluginNotFound(_))
    ));
}
