//! Reservation engine: resource registry, booking scheduler, utilization
//! analytics and demo seeding, all on top of a [`KvStore`].
//!
//! Writers touching one resource (its record or its booking set) serialize on
//! a per-resource async mutex held across read-check-write, so the
//! no-double-booking invariant holds under concurrent load. Booking creates
//! and cancels also lock the booking id, always before the resource. A lock
//! is released only once the store has settled the write made under it.
//! Readers take no locks and observe a snapshot that may be stale by the
//! time it is returned.

mod analytics;
mod conflict;
mod error;
mod registry;
mod scheduler;
mod seed;
mod validate;

pub use analytics::utilization;
pub use error::{EngineError, ErrorKind};
pub use seed::demo_catalogue;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::store::{KvStore, MemoryStore, StoreError};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

type LockMap = DashMap<String, Arc<Mutex<()>>>;

pub struct Engine {
    store: Arc<dyn KvStore>,
    /// lock key → writer lock. Entries exist only while held or awaited.
    locks: Arc<LockMap>,
    store_timeout: Duration,
}

/// Held writer lock on one key. Dropping it releases the lock and removes
/// the map entry once nobody else holds or waits on it.
pub(super) struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// A single store mutation issued while holding writer locks.
pub(super) enum Write {
    Put(String, Bytes),
    DeleteMany(Vec<String>),
}

impl Engine {
    pub fn new(store: Arc<dyn KvStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
            store_timeout,
        }
    }

    /// Engine over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_STORE_TIMEOUT)
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Acquire the writer lock for one key. Callers taking several locks
    /// take the booking lock before the resource lock.
    pub(super) async fn lock_key(&self, key: String) -> KeyGuard {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        KeyGuard {
            key,
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Run one read under the configured deadline.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, EngineError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(EngineError::Storage),
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> EngineError {
        metrics::counter!(crate::observability::STORE_TIMEOUTS_TOTAL).increment(1);
        tracing::warn!("store call exceeded {}ms", self.store_timeout.as_millis());
        EngineError::Storage(StoreError::Timeout(self.store_timeout))
    }

    pub(super) async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, EngineError> {
        match self.bounded(self.store.get(key)).await? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub(super) async fn load_all<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, EngineError> {
        self.bounded(self.store.scan_prefix(prefix))
            .await?
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }

    pub(super) async fn save<T: Serialize>(
        &self,
        key: &str,
        record: &T,
        guards: Vec<KeyGuard>,
    ) -> Result<(), EngineError> {
        let bytes = encode(record)?;
        self.commit(Write::Put(key.to_string(), bytes), guards).await
    }

    pub(super) async fn remove_all(&self, keys: Vec<String>, guards: Vec<KeyGuard>) -> Result<(), EngineError> {
        self.commit(Write::DeleteMany(keys), guards).await
    }

    /// Issue `write` and wait for it up to the deadline.
    ///
    /// The write runs on its own task that owns `guards`, so a caller that
    /// times out leaves the locks held until the store settles the write.
    /// The next writer on those keys then reads the real outcome.
    async fn commit(&self, write: Write, guards: Vec<KeyGuard>) -> Result<(), EngineError> {
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            let result = match write {
                Write::Put(key, bytes) => store.put(&key, bytes).await,
                Write::DeleteMany(keys) => store.delete_many(&keys).await,
            };
            drop(guards);
            result
        });
        match tokio::time::timeout(self.store_timeout, task).await {
            Ok(Ok(result)) => result.map_err(EngineError::Storage),
            Ok(Err(join)) => Err(EngineError::Storage(StoreError::Io(format!("write task failed: {join}")))),
            Err(_) => Err(self.timed_out()),
        }
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Bytes, EngineError> {
    serde_json::to_vec(record)
        .map(Bytes::from)
        .map_err(|e| EngineError::Storage(StoreError::Codec(e.to_string())))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EngineError> {
    serde_json::from_slice(bytes).map_err(|e| EngineError::Storage(StoreError::Codec(e.to_string())))
}
