//! Network registration handling

use super::{EventAdapter, NetworkEventListener};
use crate::flags::{CloudFlags, NetworkFlags};
use shared::NetworkEvent;

impl NetworkEventListener for EventAdapter {
    fn on_network_event(&self, event: &NetworkEvent) {
        let _delivery = self.signals.begin_delivery();

        match event {
            NetworkEvent::RegistrationStatus(status) => {
                tracing::debug!(status = %status, "Network registration status");

                if status.is_attached() {
                    self.signals.network().post(NetworkFlags::ATTACHED);
                    return;
                }

                self.signals.network().clear_all();

                // A transport on a dead link stalls until its own timeouts fire
                let cloud = self.signals.cloud();
                if cloud.query(CloudFlags::CONNECTED) && !cloud.query(CloudFlags::DISCONNECTED) {
                    tracing::info!("LTE connection lost. Disconnect from cloud.");
                    self.signals.signal_disconnect();
                }
            }
            NetworkEvent::PsmUpdate(psm) => {
                tracing::debug!(tau = psm.tau, active_time = psm.active_time, "PSM parameter update");
            }
            NetworkEvent::EdrxUpdate(edrx) => {
                tracing::debug!(edrx = edrx.edrx, ptw = edrx.ptw, "eDRX parameter update");
            }
            NetworkEvent::RrcUpdate(mode) => {
                tracing::debug!(mode = %mode, "RRC mode");
            }
            NetworkEvent::CellUpdate(cell) => {
                tracing::debug!(cell_id = cell.id, tac = cell.tac, "LTE cell changed");
            }
            NetworkEvent::LteModeUpdate(mode) => {
                tracing::debug!(mode = %mode, "Active LTE mode changed");
            }
            NetworkEvent::ModemEvent(modem_event) => {
                tracing::debug!(event = %modem_event, "Modem domain event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{EventAdapter, NetworkEventListener};
    use crate::flags::{CloudFlags, ConnectionSignals, NetworkFlags};
    use crate::hook::InboundHook;
    use shared::{NetworkEvent, RegistrationStatus, RrcMode};
    use std::sync::{Arc, Barrier};

    fn adapter() -> EventAdapter {
        EventAdapter::new(ConnectionSignals::shared(), Arc::new(InboundHook::new()))
    }

    fn registration(status: RegistrationStatus) -> NetworkEvent {
        NetworkEvent::RegistrationStatus(status)
    }

    #[test]
    fn home_and_roaming_attach() {
        for status in [
            RegistrationStatus::RegisteredHome,
            RegistrationStatus::RegisteredRoaming,
        ] {
            let adapter = adapter();
            adapter.on_network_event(&registration(status));
            assert!(adapter.signals().network().query(NetworkFlags::ATTACHED));
        }
    }

    #[test]
    fn other_status_detaches() {
        let adapter = adapter();
        adapter.on_network_event(&registration(RegistrationStatus::RegisteredHome));
        adapter.on_network_event(&registration(RegistrationStatus::Searching));

        assert!(!adapter.signals().network().query(NetworkFlags::ATTACHED));
        // No cloud session, nothing to tear down
        assert!(!adapter.signals().cloud().query(CloudFlags::DISCONNECTED));
    }

    #[test]
    fn loss_while_connected_requests_disconnect() {
        let adapter = adapter();
        adapter.signals().cloud().post(CloudFlags::CONNECTED);
        adapter.on_network_event(&registration(RegistrationStatus::RegisteredHome));
        adapter.on_network_event(&registration(RegistrationStatus::NotRegistered));

        assert!(adapter.signals().cloud().query(CloudFlags::DISCONNECTED));
    }

    #[test]
    fn radio_parameters_leave_flags_alone() {
        let adapter = adapter();
        adapter.on_network_event(&registration(RegistrationStatus::RegisteredHome));
        adapter.on_network_event(&NetworkEvent::RrcUpdate(RrcMode::Idle));

        assert!(adapter.signals().network().query(NetworkFlags::ATTACHED));
        assert!(adapter.signals().cloud().snapshot().is_empty());
    }

    #[test]
    fn network_loss_racing_a_reset_leaves_no_disconnect_behind() {
        for _ in 0..200 {
            let adapter = adapter();
            let signals = adapter.signals().clone();
            signals.network().post(NetworkFlags::ATTACHED);
            signals.cloud().post(CloudFlags::CONNECTED);
            let start = Barrier::new(2);

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    start.wait();
                    adapter.on_network_event(&registration(RegistrationStatus::NotRegistered));
                });
                scope.spawn(|| {
                    start.wait();
                    signals.reset_cloud_cycle();
                });
            });

            assert!(signals.cloud().snapshot().is_empty());
            assert!(!signals.network().query(NetworkFlags::ATTACHED));
        }
    }
}
