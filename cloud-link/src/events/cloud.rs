//! Cloud client event dispatch

use super::{CloudEventListener, EventAdapter};
use crate::flags::CloudFlags;
use shared::CloudEvent;

impl CloudEventListener for EventAdapter {
    fn on_cloud_event(&self, event: &CloudEvent) {
        let _delivery = self.signals.begin_delivery();
        let cloud = self.signals.cloud();

        tracing::debug!(event = event.name(), "Cloud event");

        match event {
            CloudEvent::TransportConnected => {
                cloud.post(CloudFlags::CONNECTED);
            }
            CloudEvent::UserAssociationRequest => {
                tracing::info!(
                    "Add the device to a cloud account to complete association. \
                     The connection is reestablished afterwards."
                );
                cloud.post(CloudFlags::ASSOCIATION_REQUESTED);
            }
            CloudEvent::UserAssociated => {
                // After the first association the service requires a fresh session
                if cloud.query(CloudFlags::ASSOCIATION_REQUESTED) {
                    tracing::info!("Device associated with cloud account, reconnecting");
                    self.signals.signal_disconnect();
                }
            }
            CloudEvent::Ready => {
                cloud.post(CloudFlags::READY);
            }
            CloudEvent::TransportDisconnected => {
                self.signals.signal_disconnect();
            }
            CloudEvent::RxDataGeneral(data) => {
                if !self.hook.invoke(data) {
                    tracing::debug!(len = data.len(), "Inbound data dropped, no handler registered");
                }
            }
            CloudEvent::RxDataShadow(data) => {
                tracing::debug!(len = data.len(), "Shadow data received");
            }
            CloudEvent::TransportConnectError { status } => {
                tracing::warn!(status, "Cloud transport connect error");
            }
            CloudEvent::Error { status } => {
                tracing::error!(status, "Cloud error");
            }
            CloudEvent::FotaDone(fota_type) => {
                tracing::info!(fota_type = %fota_type, "FOTA downloaded");
                if let Some(observer) = &self.fota {
                    observer.on_fota_downloaded(*fota_type);
                }
            }
            CloudEvent::TransportConnecting
            | CloudEvent::SensorDataAck
            | CloudEvent::FotaStart
            | CloudEvent::FotaError => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::FotaObserver;
    use crate::events::{CloudEventListener, EventAdapter};
    use crate::flags::{CloudFlags, ConnectionSignals};
    use crate::hook::InboundHook;
    use parking_lot::Mutex;
    use shared::{CloudEvent, FotaType, InboundData};
    use std::sync::{Arc, Barrier};

    fn adapter() -> (EventAdapter, Arc<InboundHook>) {
        let hook = Arc::new(InboundHook::new());
        (EventAdapter::new(ConnectionSignals::shared(), hook.clone()), hook)
    }

    #[test]
    fn connected_and_ready_post_flags() {
        let (adapter, _) = adapter();
        adapter.on_cloud_event(&CloudEvent::TransportConnected);
        adapter.on_cloud_event(&CloudEvent::Ready);

        assert_eq!(
            adapter.signals().cloud().snapshot(),
            CloudFlags::CONNECTED | CloudFlags::READY
        );
    }

    #[test]
    fn first_association_requests_disconnect() {
        let (adapter, _) = adapter();
        adapter.on_cloud_event(&CloudEvent::UserAssociationRequest);
        assert!(!adapter.signals().cloud().query(CloudFlags::DISCONNECTED));

        adapter.on_cloud_event(&CloudEvent::UserAssociated);
        assert!(adapter.signals().cloud().query(CloudFlags::DISCONNECTED));
    }

    #[test]
    fn plain_association_is_ignored() {
        let (adapter, _) = adapter();
        adapter.on_cloud_event(&CloudEvent::UserAssociated);
        assert!(adapter.signals().cloud().snapshot().is_empty());
    }

    #[test]
    fn transport_disconnect_signals_supervisor() {
        let (adapter, _) = adapter();
        adapter.on_cloud_event(&CloudEvent::TransportConnected);
        adapter.on_cloud_event(&CloudEvent::TransportDisconnected);
        assert!(adapter.signals().cloud().query(CloudFlags::DISCONNECTED));
    }

    #[test]
    fn general_data_reaches_the_hook() {
        let (adapter, hook) = adapter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hook.register(Arc::new(move |data: &InboundData| {
            sink.lock().push(data.payload.clone());
        }));

        adapter.on_cloud_event(&CloudEvent::RxDataGeneral(InboundData::new(b"led on".to_vec())));
        adapter.on_cloud_event(&CloudEvent::RxDataShadow(InboundData::new(b"{}".to_vec())));

        assert_eq!(*seen.lock(), vec![b"led on".to_vec()]);
    }

    #[derive(Default)]
    struct RecordingFota {
        seen: Mutex<Vec<FotaType>>,
    }

    impl FotaObserver for RecordingFota {
        fn on_fota_downloaded(&self, fota_type: FotaType) {
            self.seen.lock().push(fota_type);
        }
    }

    #[test]
    fn fota_done_is_forwarded() {
        let observer = Arc::new(RecordingFota::default());
        let (adapter, _) = adapter();
        let adapter = adapter.with_fota_observer(observer.clone());

        adapter.on_cloud_event(&CloudEvent::FotaStart);
        adapter.on_cloud_event(&CloudEvent::FotaDone(FotaType::ModemDelta));

        assert_eq!(*observer.seen.lock(), vec![FotaType::ModemDelta]);
        assert!(adapter.signals().cloud().snapshot().is_empty());
    }

    #[test]
    fn association_racing_a_reset_leaves_no_disconnect_behind() {
        for _ in 0..200 {
            let (adapter, _) = adapter();
            let signals = adapter.signals().clone();
            signals
                .cloud()
                .post(CloudFlags::CONNECTED | CloudFlags::ASSOCIATION_REQUESTED);
            let start = Barrier::new(2);

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    start.wait();
                    adapter.on_cloud_event(&CloudEvent::UserAssociated);
                });
                scope.spawn(|| {
                    start.wait();
                    signals.reset_cloud_cycle();
                });
            });

            // Either the clear wiped the disconnect, or the adapter saw no request
            assert!(signals.cloud().snapshot().is_empty());
        }
    }
}
