//! Periodic heartbeat producer

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use cloud_link::CloudLink;
use shared::{DeviceMessage, MessageType};

pub const HEARTBEAT_APP_ID: &str = "HEARTBEAT";

#[derive(Debug, Serialize)]
struct Heartbeat {
    seq: u64,
    uptime_secs: u64,
}

/// Enqueue a heartbeat every `interval` until shutdown
///
/// Messages are queued as copies. A full queue drops the heartbeat.
pub async fn run_heartbeat(link: CloudLink, interval: Duration, shutdown: CancellationToken) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        seq += 1;
        let beat = Heartbeat {
            seq,
            uptime_secs: started.elapsed().as_secs(),
        };
        let mut message = match DeviceMessage::json(HEARTBEAT_APP_ID, MessageType::Heartbeat, &beat) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode heartbeat");
                continue;
            }
        };
        if link.is_date_time_known() {
            message = message.stamped_now();
        }

        if let Err(e) = link.enqueue_outbound(&Arc::new(message), true) {
            tracing::warn!(seq, error = %e, "Heartbeat dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloud_link::{LinkConfig, MemoryBackend, WaitTimeout};

    #[tokio::test(start_paused = true)]
    async fn heartbeats_fill_the_queue_then_drop() {
        let (link, _supervisor, mut outbound) = CloudLink::builder()
            .config(LinkConfig::new().with_queue_capacity(2))
            .backends(MemoryBackend::new().backends())
            .build()
            .unwrap();

        let shutdown = CancellationToken::new();
        let producer = tokio::spawn(run_heartbeat(
            link.clone(),
            Duration::from_secs(60),
            shutdown.clone(),
        ));

        // Ticks at 0, 60 and 120 seconds; the third does not fit
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(link.outbound().len(), 2);

        shutdown.cancel();
        producer.await.unwrap();

        let first = outbound.recv_timeout(WaitTimeout::NoWait).await.unwrap();
        assert!(first.is_copy());
        assert_eq!(first.app_id, HEARTBEAT_APP_ID);
        let payload: serde_json::Value = first.parse_payload().unwrap();
        assert_eq!(payload["seq"], 1);
        // Time was never acquired
        assert!(first.timestamp_ms.is_none());
    }
}
