//! Tiny HTTP app for trying bam out
//!
//! Greets `$OWNER` at `/` and answers `pong` at `/ping`. Run it from a
//! Procfile as `web: bam-ping -p $PORT`.

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "bam-ping")]
#[command(about = "Greets $OWNER over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 9000)]
    port: u16,
}

async fn root() -> Html<String> {
    let owner = std::env::var("OWNER")
        .ok()
        .filter(|o| !o.is_empty())
        .unwrap_or_else(|| "world".to_string());
    Html(format!("Hello {}<br><a href='/ping'>Ping</a>", owner))
}

async fn ping() -> &'static str {
    "pong"
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("listening on {}", addr);

    let app = Router::new()
        .route("/", get(root))
        .route("/ping", get(ping));
    axum::serve(listener, app).await?;
    Ok(())
}
