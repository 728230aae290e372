//! In-process remote store.
//!
//! Keeps children in insertion order and can be told to fail reads or writes,
//! or to hold a number of readers until all of them have taken their snapshot.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Barrier;
use uuid::Uuid;

use super::{ChildRecord, KeyPath, RemoteStore};

struct ReadGate {
    barrier: Arc<Barrier>,
    remaining: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    children: Mutex<HashMap<String, Vec<ChildRecord>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_gate: Mutex<Option<ReadGate>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `readers` reads wait for each other after taking their
    /// snapshot, so they all observe the same state.
    pub fn hold_reads_until(&self, readers: usize) {
        let gate = (readers > 1).then(|| ReadGate {
            barrier: Arc::new(Barrier::new(readers)),
            remaining: readers,
        });
        *lock(&self.read_gate) = gate;
    }

    /// Seed a child directly, bypassing key generation and fault injection.
    pub fn insert_raw(&self, path: &KeyPath, key: impl Into<String>, value: Value) {
        lock(&self.children)
            .entry(path.to_string())
            .or_default()
            .push(ChildRecord::new(key, value));
    }

    pub fn children_at(&self, path: &KeyPath) -> Vec<ChildRecord> {
        lock(&self.children)
            .get(&path.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of read attempts, failed ones included.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write attempts, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_gate_ticket(&self) -> Option<Arc<Barrier>> {
        let mut guard = lock(&self.read_gate);
        let gate = guard.as_mut()?;
        let barrier = gate.barrier.clone();
        gate.remaining -= 1;
        if gate.remaining == 0 {
            *guard = None;
        }
        Some(barrier)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_children(&self, path: &KeyPath) -> Result<Vec<ChildRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("simulated read failure at {path}");
        }

        let snapshot = self.children_at(path);

        if let Some(barrier) = self.take_gate_ticket() {
            barrier.wait().await;
        }

        Ok(snapshot)
    }

    async fn push_child(&self, path: &KeyPath, value: Value) -> Result<String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("simulated write failure at {path}");
        }

        let key = Uuid::new_v4().simple().to_string();
        self.insert_raw(path, key.clone(), value);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path() -> KeyPath {
        KeyPath::root("measurements").unwrap().child("s1").unwrap()
    }

    #[tokio::test]
    async fn keeps_insertion_order() {
        let store = MemoryStore::new();
        let first = store.push_child(&path(), json!({"n": 1})).await.unwrap();
        let second = store.push_child(&path(), json!({"n": 2})).await.unwrap();
        assert_ne!(first, second);

        let children = store.read_children(&path()).await.unwrap();
        let keys: Vec<_> = children.iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, vec![first, second]);
    }

    #[tokio::test]
    async fn unknown_path_reads_empty() {
        let store = MemoryStore::new();
        assert!(store.read_children(&path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_do_not_touch_state() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.push_child(&path(), json!({})).await.is_err());
        assert!(store.children_at(&path()).is_empty());

        store.set_fail_reads(true);
        assert!(store.read_children(&path()).await.is_err());
        assert_eq!(store.read_count(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn read_gate_releases_after_all_readers_arrive() {
        let store = Arc::new(MemoryStore::new());
        store.hold_reads_until(2);

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.read_children(&path()).await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.read_children(&path()).await })
        };

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());

        // gate is spent; a lone reader must not block
        assert!(store.read_children(&path()).await.unwrap().is_empty());
    }
}
