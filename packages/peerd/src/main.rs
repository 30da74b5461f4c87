use std::sync::Arc;
use std::time::Instant;

use rmi::LocalRegistry;
use vaultpair_core::interfaces::{AUTH_SERVICE_NAME, PEER_SERVICE_NAME};
use vaultpair_core::net::parse_host_port;
use vaultpair_core::time::MonotonicClock;

use peerd::api::{self, ApiState};
use peerd::config::Config;
use peerd::coordinator::{Coordinator, CoordinatorSettings};
use peerd::executor::CommandExecutor;
use peerd::ledger::Ledger;
use peerd::queue::CommandQueue;
use peerd::services::{AuthService, PeerService};

fn main() -> eyre::Result<()> {
    // Install color-eyre for better error reporting
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("Starting VaultPair peer daemon");

    let config = Config::load()?;
    tracing::info!(
        peer_id = config.peer_id,
        self_addr = %config.self_addr(),
        peer_addr = %config.peer_addr(),
        "Configuration loaded"
    );

    let ledger = Ledger::connect(&config.database.url).await?;
    tracing::info!("Ledger connected");

    let (host, port) = parse_host_port(config.self_addr())?;
    let registry = LocalRegistry::new(host, port);

    let queue = Arc::new(CommandQueue::new());
    let clock = Arc::new(MonotonicClock::new());
    let executor = Arc::new(CommandExecutor::new(
        ledger.writer.clone(),
        config.peer_id,
        registry.http_client(),
    ));

    let coordinator = Coordinator::new(
        CoordinatorSettings {
            peer_id: config.peer_id,
            peer_addr: config.peer_addr().to_string(),
            poll_interval: config.poll_interval(),
            token_request_timeout: config.token_request_timeout(),
            holds_token_at_start: config.holds_token_at_start(),
        },
        queue.clone(),
        executor,
    )?;

    let auth = AuthService::new(
        registry.clone(),
        ledger.reader.clone(),
        queue.clone(),
        clock,
        config.peer_id,
    );
    registry.bind(AUTH_SERVICE_NAME, auth)?;
    registry.bind(PEER_SERVICE_NAME, PeerService::new(coordinator.clone()))?;

    let addr = registry.listen(true).await?;
    tracing::info!(%addr, "RPC registry serving");

    // Health/metrics server, if configured
    if let Some(health_addr) = config.health_addr.clone() {
        let state = ApiState {
            peer_id: config.peer_id,
            coordinator: coordinator.clone(),
            queue: queue.clone(),
            started: Instant::now(),
        };
        tokio::spawn(async move {
            if let Err(e) = api::start_health_server(&health_addr, state).await {
                tracing::error!(error = %e, "health server error");
            }
        });
    }

    // Shutdown plumbing
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    coordinator.run(shutdown_rx).await?;

    tracing::info!("VaultPair peer daemon stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,peerd=debug,rmi=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
