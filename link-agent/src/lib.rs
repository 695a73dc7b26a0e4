//! Link Agent - runs the cloud link against simulated device collaborators
//!
//! # Tasks
//!
//! ```text
//! connection_supervisor  setup, then connect / reset / reconnect forever
//! outbound_dispatcher    outbound queue -> CloudClient::send
//! heartbeat              periodic heartbeat -> outbound queue
//! ```

pub mod config;
pub mod dispatch;
pub mod heartbeat;
pub mod logger;
pub mod sim;
pub mod tasks;

use std::sync::Arc;
use std::time::Duration;

use cloud_link::{CloudLink, LinkConfig};
use shared::InboundData;

pub use config::AgentConfig;
pub use logger::init_logger;
pub use tasks::{BackgroundTasks, TaskFailure, TaskKind};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Load `.env` and initialize logging
pub fn setup_environment() -> AgentConfig {
    // Missing .env is fine
    let _ = dotenv::dotenv();

    let config = AgentConfig::from_env();
    init_logger(&config.log_level, config.log_json, config.log_file_dir());
    config
}

/// Run until Ctrl-C or a fatal setup failure
pub async fn run(agent: AgentConfig, link_config: LinkConfig) -> anyhow::Result<()> {
    tracing::info!(
        version = %link_config.application_version,
        queue_capacity = link_config.queue_capacity,
        "Link agent starting..."
    );

    let backend = sim::simulated_backend(&agent);
    let backends = sim::agent_backends(&backend);
    let cloud = backends.cloud.clone();

    let (link, supervisor, outbound) = CloudLink::builder()
        .config(link_config)
        .backends(backends)
        .fota_observer(Arc::new(sim::LogFota))
        .build()?;

    link.register_inbound_handler(Arc::new(|data: &InboundData| {
        tracing::info!(
            len = data.len(),
            payload = %String::from_utf8_lossy(&data.payload),
            "Received device message from cloud"
        );
    }));

    let mut tasks = BackgroundTasks::new();
    let token = tasks.shutdown_token();

    tasks.spawn_fallible(
        "connection_supervisor",
        TaskKind::Supervisor,
        supervisor.run(token.clone()),
    );
    tasks.spawn(
        "outbound_dispatcher",
        TaskKind::Worker,
        dispatch::run_dispatcher(link.clone(), cloud, outbound, token.clone()),
    );
    tasks.spawn(
        "heartbeat",
        TaskKind::Periodic,
        heartbeat::run_heartbeat(link.clone(), agent.heartbeat_interval, token.clone()),
    );
    tasks.log_summary();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);

    let outcome = loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    break Err(anyhow::Error::new(e).context("failed to listen for Ctrl-C"));
                }
                tracing::info!("Ctrl-C received");
                break Ok(());
            }
            _ = tasks.stopped() => {
                break match tasks.failure() {
                    Some(failure) => Err(anyhow::anyhow!("cloud link stopped: {failure}")),
                    None => Err(anyhow::anyhow!("background tasks stopped")),
                };
            }
            _ = health.tick() => {
                tasks.check_health();
                tracing::debug!(state = %link.state(), stats = ?link.stats(), "Link status");
            }
        }
    };

    tasks.shutdown().await;
    outcome
}
