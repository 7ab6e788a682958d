use anyhow::Result;
use clap::Parser;

use mission_control::cli::{commands, Cli};
use mission_control::config::MissionControlConfig;
use mission_control::telemetry::{init_telemetry, shutdown_telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    MissionControlConfig::load_env_file()?;
    let cli = Cli::parse();
    let config = MissionControlConfig::load()?;
    init_telemetry(&config.observability)?;

    let result = commands::execute(cli, config).await;
    shutdown_telemetry();
    result
}
