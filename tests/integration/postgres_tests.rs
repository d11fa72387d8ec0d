//! Repository tests against a live Postgres database
//!
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use circulation_plugins::{
    models::{FieldDescriptor, NewSetting, SettingUpdate, SettingsChanges},
    repository::{LibraryResolver, Repository, SettingsStore, Stores, TimestampStore},
    services::plugin_settings::{PluginSettingsService, SubmittedValues},
};

async fn pool() -> Pool<Postgres> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    pool
}

/// Insert a library with a name no other test run uses
async fn library(pool: &Pool<Postgres>) -> (i32, String) {
    let short_name = format!("T{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO libraries (short_name, name) VALUES ($1, 'Test Library') RETURNING id",
    )
    .bind(&short_name)
    .fetch_one(pool)
    .await
    .expect("Failed to insert library");
    (id, short_name)
}

#[tokio::test]
#[ignore]
async fn test_find_library() {
    let pool = pool().await;
    let (id, short_name) = library(&pool).await;
    let repository = Repository::new(pool);

    let found = repository
        .libraries
        .find_by_short_name(&short_name)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.name.as_deref(), Some("Test Library"));
    assert!(repository
        .libraries
        .find_by_short_name("no-such-library")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore]
async fn test_batch_rolls_back_on_failure() {
    let pool = pool().await;
    let (library_id, _) = library(&pool).await;
    let repository = Repository::new(pool);

    repository
        .settings
        .apply_changes(&SettingsChanges {
            inserts: vec![NewSetting {
                library_id,
                key: "pname.a".into(),
                value: "1".into(),
            }],
            ..Default::default()
        })
        .await
        .unwrap();
    let saved = repository.settings.list_for_plugin(library_id, "pname").await.unwrap();
    assert_eq!(saved.len(), 1);

    // The second insert collides with the stored key, so the first insert and the update are undone
    let result = repository
        .settings
        .apply_changes(&SettingsChanges {
            inserts: vec![
                NewSetting {
                    library_id,
                    key: "pname.b".into(),
                    value: "2".into(),
                },
                NewSetting {
                    library_id,
                    key: "pname.a".into(),
                    value: "again".into(),
                },
            ],
            updates: vec![SettingUpdate {
                setting: saved[0].clone(),
                value: "10".into(),
            }],
            deletes: Vec::new(),
        })
        .await;
    assert!(result.is_err());

    let after = repository.settings.list_for_plugin(library_id, "pname").await.unwrap();
    assert_eq!(after, saved);
}

#[tokio::test]
#[ignore]
async fn test_batch_on_vanished_row_rolls_back() {
    let pool = pool().await;
    let (library_id, _) = library(&pool).await;
    let repository = Repository::new(pool.clone());

    repository
        .settings
        .apply_changes(&SettingsChanges {
            inserts: vec![NewSetting {
                library_id,
                key: "pname.a".into(),
                value: "1".into(),
            }],
            ..Default::default()
        })
        .await
        .unwrap();
    let saved = repository.settings.list_for_plugin(library_id, "pname").await.unwrap();

    // Another writer removes the row between planning and applying
    sqlx::query("DELETE FROM configurationsettings WHERE id = $1")
        .bind(saved[0].id)
        .execute(&pool)
        .await
        .unwrap();

    let update = SettingsChanges {
        inserts: vec![NewSetting {
            library_id,
            key: "pname.b".into(),
            value: "2".into(),
        }],
        updates: vec![SettingUpdate {
            setting: saved[0].clone(),
            value: "10".into(),
        }],
        deletes: Vec::new(),
    };
    assert!(repository.settings.apply_changes(&update).await.is_err());

    let delete = SettingsChanges {
        deletes: saved.clone(),
        ..Default::default()
    };
    assert!(repository.settings.apply_changes(&delete).await.is_err());

    let after = repository.settings.list_for_plugin(library_id, "pname").await.unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_plugin_prefix_is_literal() {
    let pool = pool().await;
    let (library_id, short_name) = library(&pool).await;
    let stores = Stores::from(Repository::new(pool));
    let service = PluginSettingsService::from_stores(&stores);

    let schema = vec![FieldDescriptor::new("key")];
    let values: SubmittedValues = [("key".to_string(), Some("v".to_string()))]
        .into_iter()
        .collect();
    service
        .save_fields(&short_name, "p_x", Some(&schema), &values)
        .await
        .unwrap();
    service
        .save_fields(&short_name, "pax", Some(&schema), &values)
        .await
        .unwrap();

    let found = stores.settings.list_for_plugin(library_id, "p_x").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key, "p_x.key");
}

#[tokio::test]
#[ignore]
async fn test_global_setting_and_timestamps() {
    let pool = pool().await;
    let repository = Repository::new(pool);
    let key = format!("test-lease-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());

    repository.settings.put_global(&key, "1").await.unwrap();
    repository.settings.put_global(&key, "2").await.unwrap();
    let lease = repository.settings.get_global(&key).await.unwrap().unwrap();
    assert_eq!(lease.value.as_deref(), Some("2"));
    assert_eq!(lease.library_id, None);

    let service = format!("plugin {}", key);
    let start = Utc::now() - Duration::minutes(5);
    let finish = Utc::now();
    repository.timestamps.record_run(&service, start, finish).await.unwrap();
    repository
        .timestamps
        .record_run(&service, finish, finish + Duration::seconds(1))
        .await
        .unwrap();

    let timestamp = repository.timestamps.get_timestamp(&service).await.unwrap().unwrap();
    assert_eq!(timestamp.service_type.as_deref(), Some("script"));
    assert!(timestamp.finish.unwrap() > finish);
}
