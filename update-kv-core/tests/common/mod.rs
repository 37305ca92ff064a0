#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use update_kv_core::contract::{KeyAction, KeyReport, KvStore, Progress, StoreError};

/// In-memory store with a switchable leader and injectable per-key failures.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Vec<u8>>>,
    pub leader: bool,
    pub failing_reads: BTreeSet<String>,
    pub failing_writes: BTreeSet<String>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn with_leader() -> Self {
        Self {
            leader: true,
            ..Default::default()
        }
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.as_bytes().to_vec());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn leader_status(&self) -> Result<bool, StoreError> {
        Ok(self.leader)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.failing_reads.contains(key) {
            return Err(format!("read of '{key}' refused").into());
        }
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.failing_writes.contains(key) {
            return Err(format!("write of '{key}' refused").into());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.as_bytes().to_vec());
        Ok(())
    }
}

/// Progress sink that records every callback as a short string.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Vec<String>,
}

impl RecordingProgress {
    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| e.as_str() == event).count()
    }
}

impl Progress for RecordingProgress {
    fn waiting(&mut self, timeout: Duration) {
        self.events.push(format!("waiting {}s", timeout.as_secs()));
    }

    fn heartbeat(&mut self) {
        self.events.push("heartbeat".into());
    }

    fn ready(&mut self) {
        self.events.push("ready".into());
    }

    fn timed_out(&mut self) {
        self.events.push("timed_out".into());
    }

    fn key_started(&mut self, key: &str, action: KeyAction) {
        self.events.push(format!("start {key} {action:?}"));
    }

    fn key_finished(&mut self, report: &KeyReport) {
        self.events
            .push(format!("finish {} {:?}", report.key, report.outcome));
    }
}
