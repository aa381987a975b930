//! logwell - NDJSON log server.
//!
//! Serves a large append-only NDJSON log file through bulk JSON, plain text
//! and live SSE endpoints plus a streaming HTML view, with a time-indexed
//! reader underneath.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use logwell_server::{LogServer, ServerConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "logwell")]
#[command(about = "Serve an NDJSON log file over HTTP")]
#[command(version)]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "LOGWELL_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Path to the NDJSON log file
    #[arg(long, env = "LOG_FILE_PATH")]
    log_file: PathBuf,

    /// Shared secret for the `pwd` query parameter
    #[arg(long, env = "LOG_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Tail watcher poll interval in milliseconds
    #[arg(long, default_value_t = 250)]
    poll_ms: u64,

    /// Allowed CORS origin (repeatable; default allows all)
    #[arg(long = "cors-origin")]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::new(cli.bind, cli.log_file)
        .with_poll_interval(Duration::from_millis(cli.poll_ms));
    if let Some(password) = cli.password {
        config = config.with_password(password);
    }
    for origin in cli.cors_origins {
        config = config.with_cors_origin(origin);
    }

    let bind_addr = config.bind_addr;
    let server = LogServer::new(config);

    if let Err(e) = server
        .serve_with_shutdown(bind_addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    {
        error!(error = %e, "log server failed");
        std::process::exit(1);
    }

    Ok(())
}
