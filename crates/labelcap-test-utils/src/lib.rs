//! Testing utilities for labelcap workspace
//!
//! Shared fixtures and a scriptable blob store.

#![allow(missing_docs)]

use async_trait::async_trait;
use labelcap_keys::InlinePayload;
use labelcap_store::{BlobStore, MemoryBlobStore, StoreError};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub fn jpeg_payload() -> InlinePayload {
    InlinePayload::new("jpeg", vec![0xff, 0xd8, 0xff, 0xe0]).unwrap()
}

pub fn png_payload() -> InlinePayload {
    InlinePayload::new("png", vec![0x89, 0x50, 0x4e, 0x47]).unwrap()
}

/// Data URL as produced by a webcam screenshot
pub fn jpeg_data_url() -> String {
    jpeg_payload().to_data_url()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    List,
    ListPrefixes,
    Delete,
}

/// Closed gate that blocks store calls until opened
#[derive(Debug, Clone)]
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
    waiting: Arc<AtomicUsize>,
}

impl Gate {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            open: Arc::new(tx),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Calls currently blocked on this gate
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` calls are blocked
    pub async fn wait_for_waiters(&self, n: usize) {
        while self.waiting() < n {
            tokio::task::yield_now().await;
        }
    }

    async fn pass(&self) {
        let mut rx = self.open.subscribe();
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _ = rx.wait_for(|open| *open).await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Blob store wrapper with injectable failures, gates and listing lag
#[derive(Debug, Default)]
pub struct ScriptedBlobStore {
    inner: MemoryBlobStore,
    failures: Mutex<HashMap<StoreOp, StoreError>>,
    list_gates: Mutex<HashMap<String, Gate>>,
    put_gate: Mutex<Option<Gate>>,
    lagging: AtomicBool,
    unindexed: Mutex<HashSet<String>>,
    puts_in_flight: AtomicUsize,
    max_puts_in_flight: AtomicUsize,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

impl ScriptedBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Objects actually stored
    pub fn inner(&self) -> &MemoryBlobStore {
        &self.inner
    }

    /// Fail every `op` with `error` until cleared
    pub fn fail(&self, op: StoreOp, error: StoreError) {
        self.failures.lock().insert(op, error);
    }

    pub fn clear_failure(&self, op: StoreOp) {
        self.failures.lock().remove(&op);
    }

    /// Block `list_by_prefix(prefix)` until the returned gate opens
    pub fn gate_listing(&self, prefix: &str) -> Gate {
        let gate = Gate::new();
        self.list_gates.lock().insert(prefix.to_string(), gate.clone());
        gate
    }

    /// Block every `put` until the returned gate opens
    pub fn gate_puts(&self) -> Gate {
        let gate = Gate::new();
        *self.put_gate.lock() = Some(gate.clone());
        gate
    }

    /// Hide new objects from listings until `index_all` (eventual consistency)
    pub fn set_lagging(&self, lagging: bool) {
        self.lagging.store(lagging, Ordering::SeqCst);
    }

    /// Make every hidden object visible to listings
    pub fn index_all(&self) {
        self.unindexed.lock().clear();
    }

    /// Highest number of puts observed in flight at once
    pub fn max_puts_in_flight(&self) -> usize {
        self.max_puts_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        match self.failures.lock().get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn visible(&self, keys: Vec<String>) -> Vec<String> {
        let hidden = self.unindexed.lock();
        keys.into_iter().filter(|k| !hidden.contains(k)).collect()
    }
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    async fn put(&self, key: &str, payload: &[u8], content_type: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Put)?;

        let now = self.puts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_puts_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.put_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let result = self.inner.put(key, payload, content_type).await;
        if result.is_ok() && self.lagging.load(Ordering::SeqCst) {
            self.unindexed.lock().insert(key.to_string());
        }
        self.puts_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.enter(StoreOp::List)?;

        let gate = self.list_gates.lock().get(prefix).cloned();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let keys = self.inner.list_by_prefix(prefix).await?;
        Ok(self.visible(keys))
    }

    async fn list_common_prefixes(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        self.enter(StoreOp::ListPrefixes)?;
        let keys = self.visible(self.inner.keys());
        Ok(labelcap_store::common_prefixes(
            prefix,
            keys.iter().map(String::as_str),
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Delete)?;
        self.unindexed.lock().remove(key);
        self.inner.delete(key).await
    }
}
