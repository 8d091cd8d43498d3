//! bam daemon
//!
//! Discovers local apps, serves them as `<app>.<tld>` through the proxy,
//! answers DNS for the TLD and runs the management console.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bam_core::config::{self, BamConfig};
use bam_core::App;
use bam_server::generate::{self, Template};
use bam_server::shutdown::{self, ShutdownSequencer};
use bam_server::tunnel::LocalTunnel;
use bam_server::{LocalDns, Proxy, Registry};

#[derive(Parser)]
#[command(name = "bam")]
#[command(about = "Local app supervisor with host-based proxy and loopback DNS")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Local top-level domain (overrides config)
    #[arg(long, env = "LOCALTLD")]
    tld: Option<String>,

    /// Directory scanned for apps (overrides config)
    #[arg(long)]
    apps_dir: Option<PathBuf>,

    /// HTTP proxy port (overrides config)
    #[arg(long)]
    proxy_port: Option<u16>,

    /// DNS port, 0 disables the resolver (overrides config)
    #[arg(long)]
    dns_port: Option<u16>,

    /// Start every app once the console is up
    #[arg(long)]
    auto_start: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a configuration file or a macOS firewall plist
    ///
    /// To install the firewall rules:
    ///
    ///   bam generate firewall > bam.firewall.plist
    ///   sudo cp bam.firewall.plist /Library/LaunchDaemons/
    ///   sudo launchctl bootstrap system /Library/LaunchDaemons/bam.firewall.plist
    Generate {
        #[arg(value_enum)]
        template: Template,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(args: &Args) -> Result<BamConfig> {
    let mut config = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                BamConfig::default()
            })
        } else {
            tracing::debug!("Using default configuration");
            BamConfig::default()
        }
    };

    if let Some(tld) = &args.tld {
        config.tld = tld.clone();
    }
    if let Some(apps_dir) = &args.apps_dir {
        config.apps_dir = apps_dir.clone();
    }
    if let Some(port) = args.proxy_port {
        config.proxy_port = port;
    }
    if let Some(port) = args.dns_port {
        config.dns_port = port;
    }
    if args.auto_start {
        config.auto_start = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;

    if let Some(Command::Generate { template, output }) = &args.command {
        match (template, output) {
            (Template::Config, Some(path)) => config::save_config(path, &config)
                .with_context(|| format!("Failed to write {:?}", path))?,
            (_, Some(path)) => std::fs::write(path, generate::render(*template, &config)?)
                .with_context(|| format!("Failed to write {:?}", path))?,
            (_, None) => print!("{}", generate::render(*template, &config)?),
        }
        return Ok(());
    }

    tracing::info!("bam starting (apps in {})", config.apps_dir.display());

    let tunnels = Arc::new(LocalTunnel::new(config.share.server.clone()));
    let registry = Registry::new(&config, tunnels);

    let dns = LocalDns::new(&config.tld, config.dns_port);
    if config.dns_enabled() {
        dns.start()
            .await
            .with_context(|| format!("Failed to start DNS on port {}", config.dns_port))?;
    }

    let listener = TcpListener::bind(config.proxy_address())
        .await
        .with_context(|| format!("Failed to bind proxy on {}", config.proxy_address()))?;
    let proxy_cancel = CancellationToken::new();
    let proxy_task = tokio::spawn(Proxy::new(registry.clone()).serve(listener, proxy_cancel.clone()));

    registry.start().await.context("Failed to start console")?;

    let sequencer = Arc::new(ShutdownSequencer::new());
    shutdown::watch_signals(sequencer.clone());
    sequencer.graceful().cancelled().await;

    // DNS first, then apps and console, then the proxy
    if dns.running() {
        shutdown::step("dns", dns.stop()).await;
    }
    shutdown::step("registry", registry.stop()).await;
    proxy_cancel.cancel();
    shutdown::step("proxy", proxy_task).await;

    tracing::info!("bam shutdown complete");
    Ok(())
}
