use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use log::{error, info};

mod advertising;
mod backend;
mod config;
mod connection;
mod coordinator;
mod error;
mod identity;
mod messages;
mod network;
mod radio;
mod registration;
mod sync;
mod telemetry;
#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::network::HttpNetwork;
use crate::radio::{SimulatedPeer, SimulatedRadio};

#[derive(Parser, Debug)]
#[command(version, about = "Proximity beacon coordinator")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Simulate a peer that connects for this many seconds, then leaves for as long
    #[arg(long, value_name = "SECONDS")]
    simulate_peer: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let identity = config.initial_identity()?;
    info!(
        "Starting beacon {:?} ({:?})",
        identity.id, identity.display_name
    );

    let network = HttpNetwork::new(config.request_timeout(), config.network.clone())
        .context("building http client")?;
    let radio = SimulatedRadio::new(config.gatt());
    let coordinator_config = CoordinatorConfig::from_app(&config, identity)?;

    let peer = SimulatedPeer::new(&radio);
    let coordinator = Coordinator::new(coordinator_config, Box::new(radio), Arc::new(network));
    if let Some(secs) = args.simulate_peer {
        tokio::spawn(peer.run(coordinator.link_events(), Duration::from_secs(secs.max(1))));
    }

    coordinator
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Could not listen for Ctrl-C: {}", err);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Beacon stopped");
    Ok(())
}
