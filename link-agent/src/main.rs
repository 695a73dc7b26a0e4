use cloud_link::LinkConfig;
use link_agent::setup_environment;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env and logging first so config loading is visible
    let agent_config = setup_environment();
    let link_config = LinkConfig::from_env();

    link_agent::run(agent_config, link_config).await
}
