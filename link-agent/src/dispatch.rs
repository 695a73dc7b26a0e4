//! Outbound dispatcher
//!
//! Drains the outbound queue into the cloud client. Each message waits for a
//! fully established connection before it is sent; a failed send is logged
//! and the message dropped.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use cloud_link::{CloudClient, CloudLink, OutboundReceiver, WaitTimeout};
use shared::DeviceMessage;

pub async fn run_dispatcher(
    link: CloudLink,
    cloud: Arc<dyn CloudClient>,
    mut outbound: OutboundReceiver<DeviceMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = shutdown.cancelled() => break,
            item = outbound.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = link.await_full_connection(WaitTimeout::Forever) => {}
        }

        match cloud.send(&item).await {
            Ok(()) => tracing::debug!(
                request_id = %item.request_id,
                app_id = %item.app_id,
                "Device message sent"
            ),
            Err(e) => tracing::error!(
                request_id = %item.request_id,
                error = %e,
                "Failed to send device message"
            ),
        }
        item.release();
    }

    tracing::info!("Outbound dispatcher stopped");
}
