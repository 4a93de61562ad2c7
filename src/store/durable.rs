use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::wal::Wal;

use super::{apply_op, scan_table, KvStore, StoreError, StoreOp, Table};

enum WalCommand {
    Append {
        op: StoreOp,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (StoreOp, oneshot::Sender<io::Result<()>>);

/// Durable store: an in-memory table fronted by a group-commit WAL.
///
/// The writer task is the only mutator of the table. An op becomes visible to
/// readers only after its batch is fsynced, so a caller that gives up waiting
/// (timeout, dropped request) never leaves a half-applied write behind.
pub struct WalStore {
    table: Arc<RwLock<Table>>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalStore {
    /// Replay the log at `path`, cut any damaged tail, and start the writer
    /// task. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let ops = Wal::recover(path)?;
        let mut table = Table::new();
        for op in &ops {
            apply_op(&mut table, op);
        }
        tracing::info!("replayed {} WAL records, {} live keys", ops.len(), table.len());

        let wal = Wal::open(path)?;
        let table = Arc::new(RwLock::new(table));
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, table.clone(), wal_rx));
        Ok(Self { table, wal_tx })
    }

    async fn append(&self, op: StoreOp) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { op, response: tx })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await
            .map_err(|_| StoreError::Closed)?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Rewrite the log as one `Put` per live key.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { response: tx })
            .await
            .map_err(|_| StoreError::Closed)?;
        rx.await
            .map_err(|_| StoreError::Closed)?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl KvStore for WalStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.append(StoreOp::Put { key: key.to_string(), value: value.to_vec() }).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.table.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.append(StoreOp::Delete { key: key.to_string() }).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.append(StoreOp::DeleteMany { keys: keys.to_vec() }).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Bytes>, StoreError> {
        Ok(scan_table(&*self.table.read().await, prefix))
    }
}

/// Owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain all immediately available Appends into the batch.
/// 3. One flush_sync for the whole batch.
/// 4. On success apply the batch to the table, then answer every sender.
async fn wal_writer_loop(
    mut wal: Wal,
    table: Arc<RwLock<Table>>,
    mut rx: mpsc::Receiver<WalCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { op, response } => {
                let mut batch = vec![(op, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { op, response }) => batch.push((op, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &table, &mut batch).await;
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, &table, other).await;
                }
            }
            other => handle_non_append(&mut wal, &table, other).await,
        }
    }
}

async fn commit_batch(wal: &mut Wal, table: &RwLock<Table>, batch: &mut Vec<Pending>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    match &result {
        Ok(()) => {
            let mut guard = table.write().await;
            for (op, _) in batch.iter() {
                apply_op(&mut guard, op);
            }
        }
        Err(e) => tracing::error!("WAL flush failed for batch of {}: {e}", batch.len()),
    }

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (op, _) in batch {
        if let Err(e) = wal.append_buffered(op) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

async fn handle_non_append(wal: &mut Wal, table: &RwLock<Table>, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { response } => {
            let snapshot: Vec<StoreOp> = table
                .read()
                .await
                .iter()
                .map(|(k, v)| StoreOp::Put { key: k.clone(), value: v.to_vec() })
                .collect();
            let result = Wal::write_compact_file(wal.path(), snapshot.iter())
                .and_then(|()| wal.swap_compact_file());
            match &result {
                Ok(()) => tracing::info!("WAL compacted to {} records", snapshot.len()),
                Err(e) => tracing::error!("WAL compaction failed: {e}"),
            }
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { op, response } => {
            commit_batch(wal, table, &mut vec![(op, response)]).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("resbook_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let path = test_wal_path("reopen.wal");
        {
            let store = WalStore::open(&path).unwrap();
            store.put("resource:a", Bytes::from_static(b"A")).await.unwrap();
            store.put("booking:1", Bytes::from_static(b"1")).await.unwrap();
            store.put("booking:2", Bytes::from_static(b"2")).await.unwrap();
            store
                .delete_many(&["resource:a".to_string(), "booking:1".to_string()])
                .await
                .unwrap();
        }
        let store = WalStore::open(&path).unwrap();
        assert_eq!(store.get("resource:a").await.unwrap(), None);
        assert_eq!(
            store.scan_prefix("booking:").await.unwrap(),
            vec![Bytes::from_static(b"2")]
        );
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_committed() {
        let path = test_wal_path("group_commit.wal");
        let store = Arc::new(WalStore::open(&path).unwrap());

        let mut handles = Vec::new();
        for i in 0..50 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                s.put(&format!("booking:{i:03}"), Bytes::from(i.to_string())).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.scan_prefix("booking:").await.unwrap().len(), 50);
        assert_eq!(store.appends_since_compact().await, 50);
        assert_eq!(Wal::replay(&path).unwrap().len(), 50);
    }

    #[tokio::test]
    async fn writes_after_torn_tail_survive_second_restart() {
        use std::io::Write;

        let path = test_wal_path("torn_restart.wal");
        {
            let store = WalStore::open(&path).unwrap();
            store.put("resource:a", Bytes::from_static(b"A")).await.unwrap();
        }
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[40, 0, 0, 0, 1, 2, 3]).unwrap();
        drop(file);

        {
            let store = WalStore::open(&path).unwrap();
            assert_eq!(store.get("resource:a").await.unwrap(), Some(Bytes::from_static(b"A")));
            store.put("resource:b", Bytes::from_static(b"B")).await.unwrap();
        }

        let store = WalStore::open(&path).unwrap();
        assert_eq!(store.get("resource:a").await.unwrap(), Some(Bytes::from_static(b"A")));
        assert_eq!(store.get("resource:b").await.unwrap(), Some(Bytes::from_static(b"B")));
    }

    #[tokio::test]
    async fn compact_keeps_live_state() {
        let path = test_wal_path("compact_store.wal");
        {
            let store = WalStore::open(&path).unwrap();
            for i in 0..20 {
                store.put("resource:a", Bytes::from(i.to_string())).await.unwrap();
            }
            store.put("resource:b", Bytes::from_static(b"b")).await.unwrap();
            store.delete("resource:b").await.unwrap();
            assert_eq!(store.appends_since_compact().await, 22);

            store.compact().await.unwrap();
            assert_eq!(store.appends_since_compact().await, 0);
        }
        assert_eq!(Wal::replay(&path).unwrap().len(), 1);
        let store = WalStore::open(&path).unwrap();
        assert_eq!(
            store.get("resource:a").await.unwrap(),
            Some(Bytes::from_static(b"19"))
        );
    }
}
