use airq_ingestor::config::Cli;
use airq_ingestor::{db, metrics, mqtt, rest, TelemetryStore};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    cli.validate()?;
    let settings = cli.broker_settings()?;

    info!("Starting air quality ingestor");
    info!("MQTT broker: {}:{} as {}", settings.host, settings.port, settings.client_id);
    info!("Topics: {}", cli.topics.join(", "));
    info!("HTTP server: {}", cli.http_addr);

    metrics::init_metrics();

    let pool = match db::make_pool(&cli.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let (client, eventloop) = mqtt::connect(&settings);
    let store = Arc::new(TelemetryStore::new(client, pool.clone(), cli.topics.clone())?);

    let ingest_store = store.clone();
    let ingest_handle = tokio::spawn(async move {
        mqtt::run_ingest(&ingest_store, eventloop).await;
    });

    let listener = tokio::net::TcpListener::bind(&cli.http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", cli.http_addr, e);
            std::process::exit(1);
        });
    info!("HTTP server listening on {}", cli.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, rest::create_router())
            .await
            .unwrap_or_else(|e| {
                error!("HTTP server error: {}", e);
            });
    });

    tokio::select! {
        _ = ingest_handle => {
            error!("Ingest task terminated");
        }
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    pool.close().await;
    Ok(())
}
