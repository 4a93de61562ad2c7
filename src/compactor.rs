use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::WalStore;

const CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Background task that compacts the WAL once `threshold` appends have
/// accumulated since the last compaction. Exits when `shutdown` fires.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => {
                debug!("compactor stopping");
                return;
            }
        }
        compact_if_needed(&store, threshold).await;
    }
}

/// Returns true if a compaction ran and succeeded.
pub async fn compact_if_needed(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        debug!("compaction skipped: {appends} appends < {threshold}");
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;
    use bytes::Bytes;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("resbook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let store = WalStore::open(&test_wal_path("threshold.wal")).unwrap();
        for i in 0..4 {
            store.put("resource:a", Bytes::from(i.to_string())).await.unwrap();
        }
        assert!(!compact_if_needed(&store, 5).await);
        assert_eq!(store.appends_since_compact().await, 4);

        store.put("resource:a", Bytes::from_static(b"last")).await.unwrap();
        assert!(compact_if_needed(&store, 5).await);
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(
            store.get("resource:a").await.unwrap(),
            Some(Bytes::from_static(b"last"))
        );
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let store = Arc::new(WalStore::open(&test_wal_path("shutdown.wal")).unwrap());
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_compactor(store, 1000, token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("compactor did not stop")
            .unwrap();
    }
}
