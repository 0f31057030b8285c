mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use pixeldrop::broker::BrokerClient;
use pixeldrop::compressor::Compressor;
use pixeldrop::config;
use pixeldrop::server::{self, AppContext};
use pixeldrop::store::FileStore;
use pixeldrop::worker::Worker;

async fn start(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting pixeldrop");

    let store = Arc::new(
        FileStore::new(&config.storage.path).context("Failed to initialize file store")?,
    );
    let client = Arc::new(
        BrokerClient::connect(&config.broker.to_broker_config())
            .await
            .context("Failed to set up broker connection")?,
    );

    let worker = Worker::new(
        client.clone(),
        store.clone(),
        Compressor::new(),
        config.worker.to_settings(),
    )
    .context("Failed to construct worker")?;
    let shutdown = worker.shutdown_token();
    let mut worker_handle = tokio::spawn(worker.run());

    let ctx = AppContext {
        store,
        publisher: client,
    };
    let serve_fut = server::serve(&config.server, ctx, shutdown_signal());
    tokio::pin!(serve_fut);

    tokio::select! {
        // Signal-driven shutdown: stop pulling messages, then drain.
        result = &mut serve_fut => {
            tracing::info!("Shutting down...");
            shutdown.cancel();
            match worker_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Worker exited with error: {}", e),
                Err(e) => tracing::error!("Worker task join error: {}", e),
            }
            tracing::info!("Server exiting");
            result
        }

        // A broker stream failure is fatal for the whole process.
        result = &mut worker_handle => {
            match result {
                Ok(Ok(())) => anyhow::bail!("Worker stopped unexpectedly"),
                Ok(Err(e)) => Err(e).context("Worker halted"),
                Err(e) => Err(e).context("Worker task panicked"),
            }
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn validate_config_cmd(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Broker: {} (queue '{}')", config.broker.url, config.broker.queue);
            println!("  Storage: {:?}", config.storage.path);
            println!(
                "  Worker: max_inflight={}, drain_timeout={}s",
                config.worker.max_inflight, config.worker.drain_timeout_secs
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Broker: {} (queue '{}')", config.broker.url, config.broker.queue);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "pixeldrop=trace,tower_http=debug,lapin=debug".to_string()
        } else {
            "pixeldrop=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config_cmd(path.as_deref())
        }
        Commands::Version => {
            println!("pixeldrop {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
