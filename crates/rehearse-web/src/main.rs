//! Mock-interview web server.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run -p rehearse-web
//! OPENAI_API_KEY=sk-... cargo run -p rehearse-web -- --port 8080 --config rehearse.toml
//! OPENAI_API_KEY=sk-... cargo run -p rehearse-web -- --static-dir ./ui
//! ```
//!
//! Then open the printed URL in a browser.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rehearse::prelude::*;
use rehearse_web::{WebConfig, spawn_web};
use tracing::info;

/// Mock-interview web server.
#[derive(Parser)]
#[command(about = "Practice job interviews in the browser")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port for the web UI server.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Configuration file (defaults to ./rehearse.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve this directory instead of the embedded UI.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Override the configured chat model.
    #[arg(long)]
    model: Option<String>,

    /// Minutes a session may sit idle before it is dropped (0 keeps sessions forever).
    #[arg(long, default_value_t = 120)]
    session_ttl_mins: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    let activity = init_tracing(&args.log);

    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.provider.model = model;
    }

    let api_key = rehearse::api_key_from_env()
        .map_err(|e| format!("{e}: set it to your OpenAI API key"))?;
    let client = OpenAiClient::from_config(api_key, &config)?;

    let web_config = WebConfig {
        bind_addr: SocketAddr::new(args.host, args.port),
        static_dir: args.static_dir,
        session_ttl: (args.session_ttl_mins > 0)
            .then(|| Duration::from_secs(args.session_ttl_mins * 60)),
    };
    let addr = spawn_web(Arc::new(client), Arc::new(config), activity, web_config).await?;
    println!("Web UI: http://{addr}");
    info!("Serving on {addr}");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to wait for Ctrl-C: {e}"))?;
    info!("Shutting down");
    Ok(())
}
