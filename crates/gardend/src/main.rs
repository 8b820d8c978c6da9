use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use gardend::Config;
use gardend::api;

#[derive(Parser, Debug)]
#[command(version, about = "AeroGarden home automation daemon")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "gardend.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)?;

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.logging.level))
        .init();

    tracing::info!("gardend starting");
    tracing::info!("Loaded config from: {}", args.config);

    let mut engine = gardend::Engine::new();
    engine.register_integrations_from_config(&config)?;
    let engine = Arc::new(engine);

    let engine_handle = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine exited with error: {}", e);
            }
        })
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_handle = {
        let engine = engine.clone();
        let listen = config.api.listen.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = api::serve(listen, port, engine, shutdown_rx).await {
                tracing::error!("API server exited with error: {}", e);
            }
        })
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    let _ = shutdown_tx.send(());
    let _ = api_handle.await;
    engine_handle.abort();

    tracing::info!("gardend shutdown complete");
    Ok(())
}
