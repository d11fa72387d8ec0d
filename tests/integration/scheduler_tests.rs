//! Scheduler passes over manifest-driven plugins

use chrono::{Duration, Utc};
use std::sync::Arc;

use circulation_plugins::{
    repository::{memory::MemoryStore, SettingsStore},
    services::{
        lease::{LeaseOutcome, LEASE_KEY},
        scheduler::PluginRunOutcome,
    },
    AppError,
};

use crate::common::{services, shell_plugin};

#[tokio::test]
async fn test_first_pass_runs_every_plugin_and_takes_the_lease() {
    let store = Arc::new(MemoryStore::new());
    let services = services(
        &store,
        &[shell_plugin("first", "exit 0"), shell_plugin("second", "exit 0")],
        false,
    );

    let report = services.scheduler(100, None, false).run().await.unwrap();

    assert_eq!(report.lease, LeaseOutcome::Acquired);
    assert_eq!(report.runs.len(), 2);
    assert!(report
        .runs
        .iter()
        .all(|run| matches!(run.outcome, PluginRunOutcome::Ran { .. })));
    assert!(store.timestamp("plugin first").is_some());
    assert!(store.timestamp("plugin second").is_some());

    let lease = store.get_global(LEASE_KEY).await.unwrap().unwrap();
    assert_eq!(lease.value.as_deref(), Some("100"));
}

#[tokio::test]
async fn test_second_pass_skips_plugins_that_are_not_due() {
    let store = Arc::new(MemoryStore::new());
    let mut hourly = shell_plugin("hourly", "exit 0");
    hourly.frequency = Some("1".to_string());
    let services = services(&store, &[hourly], false);

    services.scheduler(100, None, false).run().await.unwrap();
    let report = services.scheduler(101, None, false).run().await.unwrap();

    assert!(matches!(
        report.runs[0].outcome,
        PluginRunOutcome::NotDue { frequency_hours: 1, .. }
    ));
}

#[tokio::test]
async fn test_failing_script_stays_overdue() {
    let store = Arc::new(MemoryStore::new());
    let earlier = Utc::now() - Duration::days(2);
    store.set_timestamp("plugin broken", Some(earlier), Some(earlier));
    let services = services(
        &store,
        &[shell_plugin("broken", "exit 1"), shell_plugin("healthy", "exit 0")],
        false,
    );

    let report = services.scheduler(100, None, false).run().await.unwrap();

    assert_eq!(report.failures(), 1);
    assert!(matches!(report.runs[1].outcome, PluginRunOutcome::Ran { .. }));
    let broken = store.timestamp("plugin broken").unwrap();
    assert_eq!(broken.finish, Some(earlier));
}

#[tokio::test]
async fn test_pass_stops_when_another_scheduler_is_alive() {
    let store = Arc::new(MemoryStore::new());
    store.insert_setting(None, LEASE_KEY, Some("4242"));
    let services = services(&store, &[shell_plugin("first", "exit 0")], true);

    let report = services.scheduler(100, None, false).run().await.unwrap();
    assert!(!report.proceeded);
    assert!(store.timestamp("plugin first").is_none());

    // A targeted run goes ahead without taking the lease
    let report = services
        .scheduler(100, Some("first".to_string()), false)
        .run()
        .await
        .unwrap();
    assert!(report.proceeded);
    assert_eq!(report.runs.len(), 1);
    let lease = store.get_global(LEASE_KEY).await.unwrap().unwrap();
    assert_eq!(lease.value.as_deref(), Some("4242"));
}

#[tokio::test]
async fn test_unknown_target_is_reported() {
    let store = Arc::new(MemoryStore::new());
    let services = services(&store, &[shell_plugin("first", "exit 0")], false);

    let err = services
        .scheduler(100, Some("missing".to_string()), true)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PluginNotFound(_)));
    assert!(store.timestamp("plugin first").is_none());
}
