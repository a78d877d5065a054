//! # Huddle Server
//!
//! Main binary. Serves the REST API and the realtime gateway from a single
//! process, sharing one database pool and one broadcast hub.

use clap::{Parser, Subcommand};
use huddle_api::{build_router, AppState};
use huddle_db::Database;
use huddle_gateway::{hub, GatewayState};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "huddle", version, about = "Huddle chat server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API and gateway (default)
    Serve,
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = huddle_common::config::init()?;

    // Initialize tracing (structured logging)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("Starting Huddle v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(&config.database).await?;
    db.migrate().await?;

    if matches!(cli.command, Some(Command::Migrate)) {
        tracing::info!("Migrations applied");
        return Ok(());
    }

    let hub = hub::init_global(config.gateway.topic_capacity).clone();

    let api_router = build_router(AppState {
        db: db.clone(),
        hub: hub.clone(),
        jwt_secret: config.auth.jwt_secret.clone(),
        limits: config.limits.clone(),
    });
    let gateway_router = huddle_gateway::build_router(GatewayState::new(
        db,
        hub,
        config.auth.jwt_secret.clone(),
    ));

    let app = api_router.merge(gateway_router);
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    tracing::info!("REST API listening on http://{addr}/api");
    tracing::info!("Gateway listening on ws://{addr}/api/socket/io");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
