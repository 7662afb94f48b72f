//! wa-gateway: WhatsApp Gateway Main Binary
//!
//! Main entry point for the WhatsApp gateway application.
//!
//! Usage:
//!   wa-gateway           - Start the HTTP API server
//!   wa-gateway --help    - Show help
//!   wa-gateway --version - Show version

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use wa_core::{Config, SessionManager};
use wa_driver::{BridgeClientFactory, BridgeConfig};

/// Run mode
enum RunMode {
    /// Server mode (HTTP API)
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args();

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("wa-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting wa-gateway...");
    tracing::info!("Session storage: {}", config.session.storage_path.display());

    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("wa-gateway - WhatsApp Gateway");
    println!();
    println!("Usage:");
    println!("  wa-gateway           Start the HTTP API server");
    println!("  wa-gateway --help    Show this help message");
    println!("  wa-gateway --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  PORT                    HTTP API port (default: 3000)");
    println!("  WA_SESSION_PATH         Session storage directory");
    println!("  WA_LOGOUT_TIMEOUT_SECS  Graceful sign-out bound in seconds (default: 5)");
    println!("  WA_NODE_BIN             Node binary for the bridge (default: node)");
    println!("  WA_BRIDGE_SCRIPT        Bridge script path (default: bridge/whatsapp-bridge.js)");
    println!("  WA_HEADLESS             Run the browser headless (default: true)");
    println!("  WA_BRIDGE_TIMEOUT_SECS  Bridge request timeout in seconds (default: 120)");
}

/// Run the HTTP API server backed by a live session manager
async fn run_server(config: Config) -> anyhow::Result<()> {
    // The bridge and the session cleaner must agree on one storage
    // directory
    let mut bridge_config = BridgeConfig::from_env();
    bridge_config.storage_path = config.session.storage_path.clone();

    let factory = BridgeClientFactory::new(bridge_config);
    let manager = Arc::new(SessionManager::new(
        Box::new(factory),
        config.session.clone(),
    ));

    // Start HTTP API server
    let api_port = config.api.port;
    let api_manager = Arc::clone(&manager);

    let handle = tokio::spawn(async move {
        if let Err(e) = wa_api::start_server(api_port, api_manager).await {
            tracing::error!("HTTP API error: {}", e);
        }
    });
    tracing::info!("HTTP API server started on port {}", api_port);

    tracing::info!("wa-gateway initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    handle.abort();

    // Tear down any live session so the bridge process exits
    let result = manager.logout().await;
    if !result.success {
        tracing::warn!(
            "Session teardown failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
