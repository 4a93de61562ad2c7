use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use resbook::compactor;
use resbook::config::Config;
use resbook::engine::Engine;
use resbook::store::{KvStore, MemoryStore, WalStore};
use resbook::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    if let Err(e) = resbook::observability::init(config.metrics_port) {
        tracing::error!("metrics exporter disabled: {e}");
    }

    let tls_acceptor =
        resbook::tls::load_tls_acceptor(config.tls_cert.as_deref(), config.tls_key.as_deref())?;

    let background = CancellationToken::new();
    let store: Arc<dyn KvStore> = if config.in_memory {
        Arc::new(MemoryStore::new())
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        let wal_store = Arc::new(WalStore::open(&config.wal_path())?);
        tokio::spawn(compactor::run_compactor(
            wal_store.clone(),
            config.compact_threshold,
            background.clone(),
        ));
        wal_store
    };
    let engine = Arc::new(Engine::new(store, config.store_timeout));

    if config.seed_demo {
        let inserted = engine.seed_demo().await?;
        info!("demo seed inserted {inserted} resources");
    }

    let semaphore = Arc::new(Semaphore::new(config.max_connections));
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("resbook listening on {addr}");
    if config.in_memory {
        info!("  store: in-memory");
    } else {
        info!("  store: {}", config.wal_path().display());
    }
    info!("  max_connections: {}", config.max_connections);
    info!("  store_timeout: {}ms", config.store_timeout.as_millis());
    info!("  tls: {}", if tls_acceptor.is_some() { "enabled" } else { "disabled" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(resbook::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(resbook::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(resbook::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();
                let pw = config.password.clone();
                let tls = tls_acceptor.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, engine, pw, tls).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(resbook::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == config.max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = config.max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    background.cancel();
    info!("resbook stopped");
    Ok(())
}
