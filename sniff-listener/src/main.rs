mod handler;
mod listener;
mod report;

use clap::Parser;
use handler::ReadLimits;
use report::Reporter;
use sniff_proto::config::{load_listener_config, ListenerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "sniff-listener", about = "HTTP/SNI Hostname Listener: log the hostname each client asks for")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on [default: 443]
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind to [default: 0.0.0.0]
    #[arg(long)]
    bind_addr: Option<String>,

    /// Amount of data to read from the socket. This should not need to be changed [default: 4096]
    #[arg(long)]
    recv_size: Option<usize>,

    /// Suppress output for all non-sni requests
    #[arg(short, long)]
    quiet: bool,

    /// Print one JSON object per connection
    #[arg(long)]
    json: bool,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut ListenerConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(addr) = &self.bind_addr {
            config.listener.bind_addr = addr.clone();
        }
        if let Some(size) = self.recv_size {
            config.limits.recv_size = size;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.output.quiet |= self.quiet;
        config.output.json |= self.json;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load config
    let mut config = match &cli.config {
        Some(path) => load_listener_config(path)?,
        None => ListenerConfig::default(),
    };
    cli.apply(&mut config);
    let bind_addr = config.validate()?;

    // Setup logging (stderr; stdout carries the observations)
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let reporter = Reporter::new(config.output.quiet, config.output.json);
    let limits = ReadLimits {
        recv_size: config.limits.recv_size,
        timeout: Duration::from_secs(config.limits.read_timeout_sec),
    };
    let max_conns = config.limits.max_connections as usize;

    // Bind listener
    let listener = listener::bind(bind_addr)?;
    tracing::info!("Listening on {}", bind_addr);
    reporter.banner(bind_addr)?;

    // Connection limiter
    let semaphore = Arc::new(Semaphore::new(max_conns));

    // Accept loop
    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                let sem = semaphore.clone();

                tokio::spawn(async move {
                    let _permit = match sem.try_acquire() {
                        Ok(p) => p,
                        Err(_) => {
                            tracing::warn!("Connection limit reached, dropping {}", addr);
                            return;
                        }
                    };

                    let observation = match handler::observe(stream, limits).await {
                        Ok(obs) => obs,
                        Err(e) => {
                            tracing::debug!("Client {} error: {}", addr, e);
                            return;
                        }
                    };
                    if let report::Observation::Failed(e) = &observation {
                        tracing::debug!("Client {} sent a malformed ClientHello: {}", addr, e);
                    }
                    if let Err(e) = reporter.report(addr, &observation) {
                        tracing::warn!("Failed to write observation for {}: {}", addr, e);
                    }
                });
            }
            _ = shutdown_signal() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("Hostname listener stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Failed to setup SIGTERM handler: {}", e);
            let _ = ctrl_c.await;
            return;
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm.recv() => {},
    }
}
