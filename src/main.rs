//! noirforge webhook gateway.
//!
//! Loads configuration, binds the listener, reports the effective settings
//! on stdout, and serves until SIGINT or SIGTERM.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use noirforge_webhooks::{
    config::CONFIG_FILE, serve, shutdown_signal, ConfigOverrides, Gateway, WebhookConfig,
};
use tokio::net::TcpListener;
use tracing::info;

/// Receives QuickNode and Helius push notifications and records them as
/// JSONL.
#[derive(Debug, Parser)]
#[command(name = "noirforge-webhooks", version)]
struct Args {
    /// Provider whose authentication scheme is enforced (quicknode, helius).
    #[arg(long)]
    provider: Option<String>,

    /// Bind host.
    #[arg(long)]
    host: Option<String>,

    /// Bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Path accepting deliveries.
    #[arg(long)]
    path: Option<String>,

    /// Configuration file; skipped when missing.
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider.clone(),
            host: self.host.clone(),
            port: self.port,
            path: self.path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let args = Args::parse();
    let config = WebhookConfig::load_from(&args.config, &args.overrides())?;
    let gateway = Gateway::new(config).context("Invalid webhook gateway configuration")?;

    let (host, port) = (gateway.config().host.clone(), gateway.config().port);
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;
    let bound = listener.local_addr()?;

    println!("OK");
    println!("provider={}", gateway.provider());
    println!("host={host}");
    println!("port={}", bound.port());
    println!("path={}", gateway.config().path);

    info!(
        provider = %gateway.provider(),
        addr = %bound,
        path = %gateway.config().path,
        "noirforge webhook gateway ready"
    );

    serve(listener, Arc::new(gateway), shutdown_signal()).await.context("Webhook gateway failed")?;

    info!("noirforge webhook gateway shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,noirforge=debug,tower_http=debug"))
        .context("Invalid RUST_LOG environment variable")?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}
