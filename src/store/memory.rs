use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{apply_op, scan_table, KvStore, StoreError, StoreOp, Table};

/// Volatile store. Everything is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    async fn apply(&self, op: StoreOp) {
        let mut table = self.table.write().await;
        apply_op(&mut table, &op);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.apply(StoreOp::Put { key: key.to_string(), value: value.to_vec() }).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.table.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.apply(StoreOp::Delete { key: key.to_string() }).await;
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        self.apply(StoreOp::DeleteMany { keys: keys.to_vec() }).await;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Bytes>, StoreError> {
        Ok(scan_table(&*self.table.read().await, prefix))
    }
}
