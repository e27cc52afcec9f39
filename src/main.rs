//! API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────────┐
//!                      │                      API GATEWAY                      │
//!                      │                                                       │
//!   Client Request     │  ┌────────┐   ┌────────────┐   ┌──────────────────┐   │
//!   ───────────────────┼─▶│  auth  │──▶│ rate limit │──▶│  load balancer   │   │
//!                      │  │X-API-Key│  │ IP + key   │   │ live round robin │   │
//!                      │  └────────┘   └────────────┘   └────────┬─────────┘   │
//!                      │                                         │             │
//!   Client Response    │  ┌────────────┐    ┌─────────────┐      ▼             │
//!   ◀──────────────────┼──│ access log │◀───│   forward   │◀─────────────────┼──── Backend
//!                      │  └────────────┘    └─────────────┘                    │
//!                      │                                                       │
//!                      │  ┌────────────────────────┐  ┌────────────────────┐   │
//!                      │  │ health monitor (timer) │  │ metrics / tracing  │   │
//!                      │  └────────────────────────┘  └────────────────────┘   │
//!                      └───────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use api_gateway::config::{self, GatewayConfig, LogFormat};
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::{signals, Shutdown};
use api_gateway::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "api-gateway")]
#[command(about = "Reverse-proxy gateway with auth, rate limiting and health-aware load balancing")]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides listener.bind_address port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Comma-separated backend URLs.
    #[arg(short, long, value_delimiter = ',')]
    backends: Option<Vec<String>>,

    /// Requests per minute per client IP.
    #[arg(long)]
    rate_limit: Option<u32>,

    /// Requests per minute per API key.
    #[arg(long)]
    key_rate_limit: Option<u32>,

    /// Access log file.
    #[arg(long)]
    log_file: Option<String>,

    /// Diagnostic log format.
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn apply(self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(port) = self.port {
            config.listener.bind_address = format!("0.0.0.0:{port}");
        }
        if let Some(backends) = self.backends {
            config.backends = backends
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
        }
        if let Some(limit) = self.rate_limit {
            config.rate_limit.per_ip_per_minute = limit;
        }
        if let Some(limit) = self.key_rate_limit {
            config.rate_limit.per_key_per_minute = limit;
        }
        if let Some(path) = self.log_file {
            config.access_log.path = path;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        config
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    match raw {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cli = Cli::parse();

    let base = match cli.config.take() {
        Some(path) => config::load_config(&path)?,
        None => GatewayConfig::default(),
    };
    let config = config::finalize(cli.apply(base))?;

    logging::init(&config.observability);
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends,
        per_ip_per_minute = config.rate_limit.per_ip_per_minute,
        per_key_per_minute = config.rate_limit.per_key_per_minute,
        health_interval_secs = config.health_check.interval_secs,
        access_log = %config.access_log.path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
