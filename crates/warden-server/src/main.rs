//! Warden ingest server binary.
//!
//! Accepts camera hosts over TCP and records what they see.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use warden_server::{IngestServer, ServerConfig, DEFAULT_BIND_PORT, DEFAULT_RECORD_ROOT};

/// Builds the server configuration from command line arguments.
///
/// Usage: `wardend [bind_addr] [record_root] [--continue] [--alert <classes>]`.
/// `--alert` takes a comma-separated class list and may repeat; an
/// unparseable bind address falls back to the default.
fn build_config(args: &[String]) -> ServerConfig {
    let mut bind_addr = SocketAddr::from(([0, 0, 0, 0], DEFAULT_BIND_PORT));
    let mut record_root = PathBuf::from(DEFAULT_RECORD_ROOT);
    let mut alert_classes: Vec<String> = Vec::new();
    let mut continue_run = false;
    let mut positional = 0;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--continue" | "-c" => continue_run = true,
            "--alert" | "-a" => {
                if let Some(list) = iter.next() {
                    alert_classes.extend(
                        list.split(',')
                            .map(str::trim)
                            .filter(|class| !class.is_empty())
                            .map(String::from),
                    );
                }
            }
            flag if flag.starts_with('-') => {}
            value => {
                match positional {
                    0 => {
                        if let Ok(addr) = value.parse() {
                            bind_addr = addr;
                        }
                    }
                    1 => record_root = PathBuf::from(value),
                    _ => {}
                }
                positional += 1;
            }
        }
    }

    ServerConfig::new(bind_addr, record_root)
        .with_alert_classes(alert_classes)
        .with_continue_run(continue_run)
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = build_config(&args);

    info!("Starting warden ingest server on {}", config.bind_addr);
    info!("  Recording runs under: {}", config.record_root.display());
    if config.continue_run {
        info!("  Continuing prior runs");
    }
    if !config.alert_classes.is_empty() {
        info!("  Alerting on: {}", config.alert_classes.join(", "));
    }

    let (mut server, mut events) = match IngestServer::new(config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Invalid server configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Drain dashboard events; a deployment hands these to the UI instead.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(host = %event.hostname(), event = ?event, "dashboard event");
        }
    });

    let shutdown = server.shutdown_handle();
    let serve = server.serve();
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            shutdown.shutdown();
            if let Err(e) = serve.await {
                error!("Server error during shutdown: {}", e);
                std::process::exit(1);
            }
        }
    }
}
