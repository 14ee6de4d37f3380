mod config;

use anyhow::Context;
use beacon_peer::{SubscriberConfig, SubscriberRuntime};
use beacon_transport::{read_private_key, read_public_key, CurveTransport, KeyPair};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Configuration, DEFAULT_FILE};

#[derive(Parser)]
#[command(name = "beacon-node", about = "Subscribe to static beacon peers and watch their gossip")]
struct Cli {
    /// Configuration file.
    #[arg(default_value = DEFAULT_FILE)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let configuration = match Configuration::load(&cli.config) {
        Ok(configuration) => configuration,
        Err(e) => {
            eprintln!("failed to read configuration: {e:#}");
            eprintln!("abort...");
            return Err(e);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&configuration.logging.level)),
        )
        .with_writer(std::io::stdout)
        .init();

    tracing::info!(data_directory = %configuration.data_directory, "program start");
    tracing::info!(mode = %configuration.chain, "chain mode");

    let peering = &configuration.peering;
    let secret = read_private_key(&peering.private_key)
        .with_context(|| format!("private key {}", peering.private_key))?;
    let public = read_public_key(&peering.public_key)
        .with_context(|| format!("public key {}", peering.public_key))?;
    let keys = KeyPair::new(secret, public).context("key pair")?;
    tracing::info!(public_key = %keys.public(), "local identity");

    let runtime = SubscriberRuntime::setup(
        &CurveTransport::default(),
        &keys,
        &peering.node,
        SubscriberConfig::from_peering(configuration.chain, peering),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "peer initialise error");
        e
    })?;

    let signal = wait_for_signal().await?;
    tracing::info!(signal, "received signal");
    tracing::info!("shutting down...");

    let report = runtime.shutdown().await?;
    tracing::info!(
        messages = report.messages,
        reconnects = report.reconnects,
        closed = report.connections_closed,
        "finished"
    );
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("wait for SIGINT")?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    Ok("ctrl-c")
}
