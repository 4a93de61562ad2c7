mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Key prefix for resource records.
pub const RESOURCE_PREFIX: &str = "resource:";
/// Key prefix for booking records.
pub const BOOKING_PREFIX: &str = "booking:";

pub fn resource_key(id: &str) -> String {
    format!("{RESOURCE_PREFIX}{id}")
}

pub fn booking_key(id: &str) -> String {
    format!("{BOOKING_PREFIX}{id}")
}

/// Namespaced key-value storage the engine is built on.
///
/// Each call is atomic on its own; nothing spans calls. `delete_many` removes
/// all of its keys as one unit.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Upsert.
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Idempotent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Idempotent; missing keys are skipped.
    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError>;

    /// All values whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Bytes>, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Timeout(Duration),
    Io(String),
    Codec(String),
    Closed,
}

impl StoreError {
    /// Whether a caller may reasonably retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Io(_))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Timeout(d) => write!(f, "store call timed out after {}ms", d.as_millis()),
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Codec(e) => write!(f, "store codec error: {e}"),
            StoreError::Closed => write!(f, "store writer shut down"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A single store mutation. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
    DeleteMany { keys: Vec<String> },
}

pub(crate) type Table = BTreeMap<String, Bytes>;

pub(crate) fn apply_op(table: &mut Table, op: &StoreOp) {
    match op {
        StoreOp::Put { key, value } => {
            table.insert(key.clone(), Bytes::from(value.clone()));
        }
        StoreOp::Delete { key } => {
            table.remove(key);
        }
        StoreOp::DeleteMany { keys } => {
            for key in keys {
                table.remove(key);
            }
        }
    }
}

pub(crate) fn scan_table(table: &Table, prefix: &str) -> Vec<Bytes> {
    table
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(_, v)| v.clone())
        .collect()
}
