// cloud-link/tests/supervisor.rs
// Full connection cycles against the in-memory backend, on paused time

use cloud_link::backend::memory::{
    CloudCall, LteCall, MemoryBackend, MemoryCloud, MemoryLte, MemoryModem,
};
use cloud_link::{
    BackendError, CloudLink, DEFAULT_CAPABILITIES, EnqueueError, IndicatorPattern, LinkConfig,
    LinkError, LinkResult, LinkState, ModemInit, OutboundReceiver, WaitTimeout,
};
use shared::{CloudEvent, DeviceMessage, DeviceStatus, MessageType, RegistrationStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const RETRY: Duration = Duration::from_secs(30);
const READY_TIMEOUT: Duration = Duration::from_secs(600);
const COOLDOWN: Duration = Duration::from_secs(20);
const REESTABLISH: Duration = Duration::from_secs(10);

struct Harness {
    link: CloudLink,
    backend: MemoryBackend,
    shutdown: CancellationToken,
    task: JoinHandle<LinkResult<()>>,
    _outbound: OutboundReceiver<DeviceMessage>,
}

fn config() -> LinkConfig {
    LinkConfig::new()
        .with_retry_timeout(RETRY)
        .with_ready_timeout(READY_TIMEOUT)
        .with_reset_cooldown(COOLDOWN)
        .with_reestablish_delay(REESTABLISH)
}

fn start_with(backend: MemoryBackend, config: LinkConfig) -> Harness {
    let (link, supervisor, outbound) = CloudLink::builder()
        .config(config)
        .backends(backend.backends())
        .build()
        .unwrap();

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(supervisor.run(shutdown.clone()));

    Harness {
        link,
        backend,
        shutdown,
        task,
        _outbound: outbound,
    }
}

fn start(backend: MemoryBackend) -> Harness {
    start_with(backend, config())
}

/// Backend with a custom cloud client, otherwise default
fn backend_with_cloud(cloud: MemoryCloud) -> MemoryBackend {
    MemoryBackend {
        cloud: Arc::new(cloud),
        ..MemoryBackend::new()
    }
}

async fn wait_for_state(link: &CloudLink, target: LinkState, within: Duration) -> bool {
    let mut rx = link.subscribe_state();
    matches!(
        tokio::time::timeout(within, rx.wait_for(|state| *state == target)).await,
        Ok(Ok(_))
    )
}

async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    check()
}

#[tokio::test(start_paused = true)]
async fn test_connects_end_to_end() {
    let h = start(MemoryBackend::new());

    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);
    assert!(h.link.is_cloud_connected());
    assert!(!h.link.is_cloud_disconnecting());

    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(1)).await);
    assert!(eventually(Duration::from_secs(1), || !h.backend.cloud.statuses().is_empty()).await);
    assert_eq!(
        h.backend.cloud.statuses(),
        vec![DeviceStatus::from_service_info(DEFAULT_CAPABILITIES)]
    );

    let stats = h.link.stats();
    assert_eq!(stats.connect_attempts, 1);
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.resets, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_disconnect() {
    let h = start(MemoryBackend::new());
    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);
    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(1)).await);

    let dropped_at = Instant::now();
    h.backend.cloud.drop_connection();
    assert!(h.link.is_cloud_disconnecting());

    assert!(wait_for_state(&h.link, LinkState::Disconnected, Duration::from_secs(60)).await);
    // Cooldown runs before the flags are cleared
    assert!(dropped_at.elapsed() >= COOLDOWN);
    assert!(!h.link.is_cloud_disconnecting());
    assert!(!h.link.is_cloud_connected());

    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(60)).await);
    assert!(dropped_at.elapsed() >= COOLDOWN + REESTABLISH);

    let stats = h.link.stats();
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.resets, 1);
    assert_eq!(stats.connect_attempts, 2);
    // Server already closed the session, so the reset's disconnect was a no-op
    assert_eq!(h.backend.cloud.calls().count(&CloudCall::Disconnect), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retries_connect_at_fixed_interval() {
    let h = start(backend_with_cloud(MemoryCloud::new().with_failed_connects(2)));

    assert!(h.link.await_full_connection(Duration::from_secs(120)).await);

    let attempts = h.backend.cloud.calls().times(&CloudCall::Connect);
    assert_eq!(attempts.len(), 3);
    for pair in attempts.windows(2) {
        assert!(pair[1] - pair[0] >= RETRY, "retried after {:?}", pair[1] - pair[0]);
    }
    assert_eq!(h.link.stats().connect_attempts, 3);
    assert_eq!(h.link.stats().sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retry_timeout_from_environment_keeps_interval() {
    let config = LinkConfig::from_lookup(|key| {
        (key == "CLOUD_CONNECTION_RETRY_TIMEOUT_SECONDS").then(|| "0".to_string())
    });
    assert_eq!(config.retry_timeout, RETRY);

    let h = start_with(
        backend_with_cloud(MemoryCloud::new().with_failed_connects(usize::MAX)),
        config,
    );

    // Attach after 1s, then attempts at 1s, 31s and 61s
    tokio::time::sleep(Duration::from_secs(75)).await;

    let attempts = h.link.stats().connect_attempts;
    assert_eq!(attempts, 3);
    assert_eq!(h.backend.cloud.calls().count(&CloudCall::Connect), 3);
    assert_eq!(h.link.stats().sessions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_ready_timeout_resets_and_retries() {
    let h = start(backend_with_cloud(MemoryCloud::new().with_auto_ready(false)));

    assert!(eventually(Duration::from_secs(5), || h.link.is_cloud_connected()).await);

    // Connect attempt of the second cycle
    assert!(
        eventually(READY_TIMEOUT + Duration::from_secs(120), || {
            h.link.stats().connect_attempts == 2
        })
        .await
    );
    let attempts = h.backend.cloud.calls().times(&CloudCall::Connect);
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1] - attempts[0] >= READY_TIMEOUT + COOLDOWN * 2 + REESTABLISH);

    let stats = h.link.stats();
    assert_eq!(stats.sessions, 0);
    // Once inside connect_cloud, once more in the loop
    assert_eq!(stats.resets, 2);
    assert_eq!(h.backend.cloud.calls().count(&CloudCall::Disconnect), 2);
    assert!(h.backend.cloud.statuses().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_short_circuits_readiness() {
    let h = start(backend_with_cloud(MemoryCloud::new().with_auto_ready(false)));
    assert!(eventually(Duration::from_secs(5), || h.link.is_cloud_connected()).await);
    assert!(wait_for_state(&h.link, LinkState::Connected, Duration::from_secs(1)).await);

    let started = Instant::now();
    h.backend.cloud.emit(&CloudEvent::TransportDisconnected);
    h.backend.cloud.emit(&CloudEvent::Ready);

    assert!(wait_for_state(&h.link, LinkState::Disconnecting, Duration::from_secs(1)).await);
    // Reset starts well before the readiness timeout
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(wait_for_state(&h.link, LinkState::Disconnected, Duration::from_secs(60)).await);
    // The late ready belonged to the old cycle
    assert!(!h.link.await_cloud_ready(WaitTimeout::NoWait).await);
    assert_eq!(h.link.stats().sessions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_first_association_reconnects_once() {
    let h = start(MemoryBackend::new());
    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);
    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(1)).await);

    h.backend.cloud.emit(&CloudEvent::UserAssociationRequest);
    assert!(!h.link.is_cloud_disconnecting());
    h.backend.cloud.emit(&CloudEvent::UserAssociated);
    assert!(h.link.is_cloud_disconnecting());

    assert!(wait_for_state(&h.link, LinkState::Disconnected, Duration::from_secs(60)).await);
    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(60)).await);

    // Association request was consumed by the reset
    h.backend.cloud.emit(&CloudEvent::UserAssociated);
    assert!(!h.link.is_cloud_disconnecting());

    let stats = h.link.stats();
    assert_eq!(stats.resets, 1);
    assert_eq!(stats.sessions, 2);
    assert_eq!(h.backend.cloud.calls().count(&CloudCall::Disconnect), 1);
}

#[tokio::test(start_paused = true)]
async fn test_plain_association_keeps_session() {
    let h = start(MemoryBackend::new());
    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);

    h.backend.cloud.emit(&CloudEvent::UserAssociated);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.link.state(), LinkState::Ready);
    assert_eq!(h.link.stats().resets, 0);
    assert_eq!(h.backend.cloud.calls().count(&CloudCall::Disconnect), 0);
}

#[tokio::test(start_paused = true)]
async fn test_network_loss_disconnects_cloud() {
    let h = start(MemoryBackend::new());
    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);
    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(1)).await);

    h.backend.lte.set_registration(RegistrationStatus::Searching);
    assert!(!h.link.await_network(WaitTimeout::NoWait).await);
    assert!(h.link.is_cloud_disconnecting());

    // Reset completes, then the supervisor waits for the network again
    assert!(wait_for_state(&h.link, LinkState::Disconnected, Duration::from_secs(60)).await);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.link.stats().connect_attempts, 1);
    assert_eq!(h.link.stats().cycles, 2);

    h.backend.lte.set_registration(RegistrationStatus::RegisteredRoaming);
    assert!(wait_for_state(&h.link, LinkState::Ready, Duration::from_secs(5)).await);
    assert_eq!(h.link.stats().sessions, 2);
}

#[tokio::test(start_paused = true)]
async fn test_date_time_latch() {
    let h = start(MemoryBackend::new());
    assert!(!h.link.is_date_time_known());

    assert!(h.link.await_date_time_known(Duration::from_secs(5)).await);

    h.backend.clock.set_valid(false);
    h.backend.clock.notify();
    assert!(h.link.await_date_time_known(WaitTimeout::NoWait).await);
}

#[tokio::test(start_paused = true)]
async fn test_modem_failure_is_fatal() {
    let backend = MemoryBackend {
        modem: Arc::new(MemoryModem::with_result(Err(BackendError::status(
            "nrf_modem_lib_init",
            -12,
        )))),
        ..MemoryBackend::new()
    };
    let h = start(backend);

    let result = h.task.await.unwrap();
    assert!(matches!(result, Err(LinkError::ModemInit(_))));
    assert_eq!(
        h.backend.indicator.patterns(),
        vec![IndicatorPattern::Waiting, IndicatorPattern::Failure]
    );
    assert!(h.backend.cloud.calls().calls().is_empty());
    assert!(h.backend.lte.calls().calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_modem_update_is_not_fatal() {
    let backend = MemoryBackend {
        modem: Arc::new(MemoryModem::with_result(Ok(ModemInit::FirmwareUpdateFailed(-5)))),
        ..MemoryBackend::new()
    };
    let h = start(backend);

    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);
    assert_eq!(h.backend.modem.init_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_psm_failure_is_fatal() {
    let backend = MemoryBackend {
        lte: Arc::new(MemoryLte::new().failing(
            LteCall::RequestPsm(true),
            BackendError::status("lte_lc_psm_req", -1),
        )),
        ..MemoryBackend::new()
    };
    let h = start_with(backend, config().with_power_saving_mode(true));

    let result = h.task.await.unwrap();
    assert!(matches!(result, Err(LinkError::NetworkSetup(_))));
    assert_eq!(h.backend.lte.calls().calls(), vec![LteCall::RequestPsm(true)]);
    assert!(h.backend.indicator.patterns().contains(&IndicatorPattern::Failure));
}

#[tokio::test(start_paused = true)]
async fn test_network_setup_order() {
    let h = start_with(MemoryBackend::new(), config().with_power_saving_mode(true));
    assert!(h.link.await_network(Duration::from_secs(5)).await);

    assert_eq!(
        h.backend.lte.calls().calls(),
        vec![
            LteCall::RequestPsm(true),
            LteCall::EnableModemEvents,
            LteCall::Connect
        ]
    );
    assert_eq!(
        h.backend.cloud.calls().calls().first(),
        Some(&CloudCall::Init {
            application_version: config().application_version
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_waiting_indication_follows_verbosity() {
    let quiet = start_with(MemoryBackend::new(), config().with_verbose_indication(false));
    assert!(quiet.link.await_full_connection(Duration::from_secs(5)).await);
    assert_eq!(quiet.backend.indicator.patterns(), vec![IndicatorPattern::Waiting]);

    let verbose = start_with(MemoryBackend::new(), config().with_verbose_indication(true));
    assert!(verbose.link.await_full_connection(Duration::from_secs(5)).await);
    assert_eq!(
        verbose.backend.indicator.patterns(),
        vec![IndicatorPattern::Waiting, IndicatorPattern::Waiting]
    );
}

#[tokio::test(start_paused = true)]
async fn test_outbound_queue_rejects_when_full() {
    let h = start_with(MemoryBackend::new(), config().with_queue_capacity(2));
    let message = Arc::new(DeviceMessage::new("HEARTBEAT", MessageType::Heartbeat, vec![]));

    assert!(h.link.enqueue_outbound(&message, true).is_ok());
    assert!(h.link.enqueue_outbound(&message, false).is_ok());
    assert_eq!(
        h.link.enqueue_outbound(&message, true),
        Err(EnqueueError::QueueFull)
    );
    // Only the shared item holds a reference
    assert_eq!(Arc::strong_count(&message), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_supervisor() {
    let h = start(MemoryBackend::new());
    assert!(h.link.await_full_connection(Duration::from_secs(5)).await);

    h.shutdown.cancel();
    let result = h.task.await.unwrap();
    assert!(result.is_ok());
}
