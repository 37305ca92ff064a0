mod common;

use serial_test::serial;
use std::time::Duration;

use common::{MemoryStore, RecordingProgress};
use update_kv_core::config::SyncConfig;
use update_kv_core::contract::{KeyOutcome, MockKvStore, NoProgress};
use update_kv_core::document::{DocumentError, FormatMode};
use update_kv_core::substitute::SubstitutionTable;
use update_kv_core::synchronise::{prepare, synchronise, RunOutcome, SyncError};

fn fast_config() -> SyncConfig {
    SyncConfig {
        timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn end_to_end_creates_all_keys_into_empty_store() {
    let store = MemoryStore::with_leader();
    let mut progress = RecordingProgress::default();

    let report = synchronise(
        &fast_config(),
        r#"{"a": 1, "b": true, "c": "x"}"#,
        &store,
        &mut progress,
    )
    .await
    .expect("synchronise should succeed");

    assert_eq!(report.created(), 3);
    assert_eq!(report.run_outcome(), RunOutcome::Success);
    assert_eq!(report.run_outcome().exit_code(), 0);
    assert_eq!(store.value("a").as_deref(), Some("1"));
    assert_eq!(store.value("b").as_deref(), Some("true"));
    assert_eq!(store.value("c").as_deref(), Some("x"));
    assert_eq!(progress.events[0], "waiting 2s");
    assert_eq!(progress.events[1], "ready");
}

#[tokio::test]
async fn substitutions_are_applied_before_parsing() {
    let store = MemoryStore::with_leader();
    let mut config = fast_config();
    config.substitutions.insert("DB_HOST", "db.internal");
    config.substitutions.insert("DB_PORT", "5432");
    let raw = "db/host: $DB_HOST$\ndb/port: $DB_PORT$\nuntouched: $OTHER$\n";

    let report = synchronise(&config, raw, &store, &mut NoProgress)
        .await
        .expect("synchronise should succeed");

    assert_eq!(report.created(), 3);
    assert_eq!(store.value("db/host").as_deref(), Some("db.internal"));
    // substituted before parsing, so YAML reads it as an integer
    assert_eq!(store.value("db/port").as_deref(), Some("5432"));
    assert_eq!(store.value("untouched").as_deref(), Some("$OTHER$"));
}

#[tokio::test]
#[serial]
async fn substitution_table_from_environment() {
    std::env::set_var("UPDATEKV_TEST_REGION", "eu-west-1");
    std::env::remove_var("UPDATEKV_TEST_UNSET");

    let names = SubstitutionTable::parse_names("UPDATEKV_TEST_REGION, UPDATEKV_TEST_UNSET");
    let config = SyncConfig {
        substitutions: SubstitutionTable::from_env(&names),
        ..fast_config()
    };
    let set = prepare(&config, r#"{"region": "$UPDATEKV_TEST_REGION$", "x": "$UPDATEKV_TEST_UNSET$"}"#)
        .expect("document should be valid");

    assert_eq!(set.get("region").unwrap().to_string(), "eu-west-1");
    assert_eq!(set.get("x").unwrap().to_string(), "$UPDATEKV_TEST_UNSET$");

    std::env::remove_var("UPDATEKV_TEST_REGION");
}

#[tokio::test]
async fn parse_failure_touches_nothing() {
    let store = MockKvStore::new();
    let config = SyncConfig {
        format: FormatMode::JsonOnly,
        ..fast_config()
    };

    let err = synchronise(&config, "a: 1\n", &store, &mut NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Document(DocumentError::Unparsable { .. })
    ));
    assert_eq!(err.outcome(), RunOutcome::ParseFailure);
    assert_eq!(err.outcome().exit_code(), 1);
}

#[tokio::test]
async fn validation_failure_touches_nothing() {
    let store = MockKvStore::new();

    let err = synchronise(&fast_config(), "[1, 2, 3]", &store, &mut NoProgress)
        .await
        .unwrap_err();

    assert_eq!(err.outcome(), RunOutcome::ValidationFailure);
    assert_eq!(err.outcome().exit_code(), 2);
}

#[tokio::test]
async fn timeout_aborts_before_any_key_is_read() {
    let mut store = MockKvStore::new();
    store
        .expect_leader_status()
        .returning(|| Err("connection refused".into()));
    store.expect_get().never();
    store.expect_put().never();
    let config = SyncConfig {
        timeout: Duration::from_millis(100),
        ..fast_config()
    };
    let mut progress = RecordingProgress::default();

    let err = synchronise(&config, r#"{"a": 1}"#, &store, &mut progress)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Timeout { .. }));
    assert_eq!(err.outcome(), RunOutcome::TimeoutFailure);
    assert_eq!(err.outcome().exit_code(), 3);
    assert_eq!(err.to_string(), "consul is not up for 0 seconds");
    assert_eq!(progress.count("timed_out"), 1);
}

#[tokio::test]
async fn store_failures_map_to_their_own_exit_code() {
    let mut store = MemoryStore::with_leader();
    store.failing_writes.insert("b".into());

    let report = synchronise(&fast_config(), r#"{"a": 1, "b": 2}"#, &store, &mut NoProgress)
        .await
        .expect("per-key failures are not fatal");

    assert_eq!(report.outcome("a"), Some(&KeyOutcome::Created));
    assert!(report.outcome("b").is_some_and(KeyOutcome::is_failure));
    assert_eq!(report.run_outcome(), RunOutcome::StoreFailure);
    assert_eq!(report.run_outcome().exit_code(), 4);
}

#[tokio::test]
async fn overwrite_flag_flows_through_the_pipeline() {
    let store = MemoryStore::with_leader();
    store.seed("k", "x");
    let config = SyncConfig {
        overwrite: true,
        ..fast_config()
    };

    let report = synchronise(&config, "k: y\n", &store, &mut NoProgress)
        .await
        .expect("synchronise should succeed");

    assert_eq!(report.updated(), 1);
    assert_eq!(store.value("k").as_deref(), Some("y"));
}
