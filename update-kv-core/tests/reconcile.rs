mod common;

use common::{MemoryStore, RecordingProgress};
use update_kv_core::contract::{KeyAction, KeyOutcome, MockKvStore, NoProgress};
use update_kv_core::document::{parse, ConfigSet, FormatMode};
use update_kv_core::reconcile::reconcile;

fn entries(json: &str) -> ConfigSet {
    parse(json, FormatMode::JsonOnly).expect("test document should be valid")
}

#[tokio::test]
async fn creates_missing_keys_as_plain_text() {
    let store = MemoryStore::with_leader();
    let set = entries(r#"{"a": 1, "b": true, "c": "x"}"#);

    let report = reconcile(&set, &store, false, &mut NoProgress).await;

    assert_eq!(report.created(), 3);
    assert_eq!(store.value("a").as_deref(), Some("1"));
    assert_eq!(store.value("b").as_deref(), Some("true"));
    assert_eq!(store.value("c").as_deref(), Some("x"));
    assert!(!report.has_failures());
}

#[tokio::test]
async fn second_run_without_overwrite_skips_everything() {
    let store = MemoryStore::with_leader();
    let set = entries(r#"{"a": 1, "b": false}"#);

    reconcile(&set, &store, false, &mut NoProgress).await;
    let writes_after_first = store.writes();
    let second = reconcile(&set, &store, false, &mut NoProgress).await;

    assert_eq!(second.skipped(), 2);
    assert_eq!(second.created() + second.updated(), 0);
    assert_eq!(store.writes(), writes_after_first, "no store mutation expected");
}

#[tokio::test]
async fn existing_key_is_kept_without_overwrite() {
    let store = MemoryStore::with_leader();
    store.seed("k", "x");

    let report = reconcile(&entries(r#"{"k": "y"}"#), &store, false, &mut NoProgress).await;

    assert_eq!(report.outcome("k"), Some(&KeyOutcome::Skipped));
    assert_eq!(store.value("k").as_deref(), Some("x"));
}

#[tokio::test]
async fn existing_key_is_replaced_with_overwrite() {
    let store = MemoryStore::with_leader();
    store.seed("k", "x");

    let report = reconcile(&entries(r#"{"k": "y"}"#), &store, true, &mut NoProgress).await;

    assert_eq!(report.outcome("k"), Some(&KeyOutcome::Updated));
    assert_eq!(store.value("k").as_deref(), Some("y"));
}

#[tokio::test]
async fn failures_are_per_key_and_do_not_stop_the_run() {
    let mut store = MemoryStore::with_leader();
    store.failing_reads.insert("b".into());
    store.failing_writes.insert("c".into());
    let set = entries(r#"{"a": "1", "b": "2", "c": "3", "d": "4"}"#);

    let report = reconcile(&set, &store, false, &mut NoProgress).await;

    assert_eq!(report.keys.len(), 4);
    assert_eq!(report.created(), 2);
    assert_eq!(report.failed(), 2);
    assert!(matches!(
        report.outcome("b"),
        Some(KeyOutcome::Failed { action: None, .. })
    ));
    assert!(matches!(
        report.outcome("c"),
        Some(KeyOutcome::Failed {
            action: Some(KeyAction::Create),
            ..
        })
    ));
    assert_eq!(store.value("a").as_deref(), Some("1"));
    assert_eq!(store.value("d").as_deref(), Some("4"));
    assert_eq!(store.value("c"), None);
}

#[tokio::test]
async fn keys_are_processed_in_sorted_order_with_progress() {
    let mut store = MemoryStore::with_leader();
    store.seed("m", "old");
    store.failing_writes.insert("z".into());
    let set = entries(r#"{"z": 1, "a": 2, "m": 3}"#);
    let mut progress = RecordingProgress::default();

    let report = reconcile(&set, &store, true, &mut progress).await;

    let order: Vec<&str> = report.keys.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(order, vec!["a", "m", "z"]);
    assert_eq!(
        progress.events,
        vec![
            "start a Create",
            "finish a Created",
            "start m Overwrite",
            "finish m Updated",
            "start z Create",
            "finish z Failed { action: Some(Create), error: \"write of 'z' refused\" }",
        ]
    );
}

#[tokio::test]
async fn skipped_keys_are_never_written() {
    let mut store = MockKvStore::new();
    store
        .expect_get()
        .times(2)
        .returning(|_| Ok(Some(b"present".to_vec())));
    store.expect_put().never();

    let report = reconcile(&entries(r#"{"a": 1, "b": 2}"#), &store, false, &mut NoProgress).await;

    assert_eq!(report.skipped(), 2);
}

#[tokio::test]
async fn writes_the_serialized_value() {
    let mut store = MockKvStore::new();
    store.expect_get().times(1).returning(|_| Ok(None));
    store
        .expect_put()
        .withf(|key, value| key.to_string() == "port" && value.to_string() == "8500")
        .times(1)
        .returning(|_, _| Ok(()));

    let report = reconcile(&entries(r#"{"port": 8500}"#), &store, false, &mut NoProgress).await;

    assert_eq!(report.created(), 1);
}
