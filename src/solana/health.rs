// src/solana/health.rs
use crate::solana::rpc::ResilientConnection;
use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Probes every endpoint once with `get_slot`. Returns per-endpoint liveness in pool order.
pub async fn probe_all(connection: &ResilientConnection, probe_timeout: Duration) -> Vec<bool> {
    let probes = (0..connection.endpoint_count()).map(|idx| {
        let client = connection.client(idx);
        async move {
            match timeout(probe_timeout, client.get_slot()).await {
                Ok(Ok(slot)) => {
                    debug!("[Health] Endpoint #{} alive at slot {}", idx, slot);
                    true
                }
                Ok(Err(e)) => {
                    warn!("[Health] Endpoint #{} probe failed: {}", idx, e);
                    false
                }
                Err(_) => {
                    warn!("[Health] Endpoint #{} probe timed out after {:?}", idx, probe_timeout);
                    false
                }
            }
        }
    });

    let results = join_all(probes).await;
    for (idx, alive) in results.iter().enumerate() {
        connection.record_probe(idx, *alive).await;
    }
    results
}

/// Spawns the background prober. It stops when `cancel` fires.
pub fn spawn_health_prober(
    connection: Arc<ResilientConnection>,
    every: Duration,
    probe_timeout: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("[Health] Prober started, interval {:?}", every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[Health] Prober stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let results = probe_all(&connection, probe_timeout).await;
                    let alive = results.iter().filter(|ok| **ok).count();
                    debug!("[Health] {}/{} endpoints alive", alive, results.len());
                }
            }
        }
    })
}
