use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use chargewatch_core::error::CoreError;
use chargewatch_core::registry::StatusRegistry;
use chargewatch_core::timeline::TimelineStore;
use chargewatch_db::{select_backend, StorageConfig};
use chargewatch_events::{AvailabilityNotifier, EmailConfig, EmailDelivery, EventBus};
use chargewatch_worker::{HttpChecker, MonitorLoop, MonitorSettings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chargewatch_api::config::{load_stations, ServerConfig};
use chargewatch_api::router::build_app_router;
use chargewatch_api::state::AppState;

/// How long background tasks get to finish after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chargewatch_api=info,chargewatch_worker=info,chargewatch_db=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Fatal error, exiting");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CoreError> {
    // --- Configuration ---
    let config = ServerConfig::from_env();
    let settings = MonitorSettings::from_env();
    let storage = StorageConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        interval_secs = settings.interval.as_secs(),
        "Loaded configuration"
    );

    let stations = load_stations(&config.stations_file)?;
    tracing::info!(count = stations.len(), "Loaded station list");

    // --- Persistence ---
    let backend = select_backend(&storage)?;
    let registry = Arc::new(StatusRegistry::load(Arc::clone(&backend)).await);
    let timeline = Arc::new(TimelineStore::load(Arc::clone(&backend)).await);

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    let notifier_handle = match EmailConfig::from_env() {
        Some(email) => {
            let notifier = AvailabilityNotifier::new(EmailDelivery::new(email));
            Some(tokio::spawn(notifier.run(event_bus.subscribe())))
        }
        None => {
            tracing::info!("Availability emails disabled");
            None
        }
    };

    // --- Monitor ---
    let cancel = CancellationToken::new();
    let monitor = MonitorLoop::new(
        stations,
        Box::new(HttpChecker::new(settings.check_timeout)),
        Arc::clone(&registry),
        Arc::clone(&timeline),
        Arc::clone(&event_bus),
        settings.clone(),
    );
    let monitor_handle = tokio::spawn(monitor.run(cancel.clone()));

    // --- HTTP server ---
    let state = AppState {
        registry: Arc::clone(&registry),
        timeline: Arc::clone(&timeline),
        event_bus: Arc::clone(&event_bus),
        backend,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|e| CoreError::Config(format!("invalid HOST '{}': {e}", config.host)))?;
    let addr = SocketAddr::new(host, config.port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CoreError::Config(format!("cannot bind {addr}: {e}")))?;
    tracing::info!(%addr, "Starting server");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CoreError::Internal(format!("server error: {e}")));

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping monitor");
    cancel.cancel();
    let monitor_grace = settings.check_timeout + SHUTDOWN_GRACE;
    match tokio::time::timeout(monitor_grace, monitor_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Monitor task failed"),
        Err(_) => tracing::warn!("Monitor did not stop in time"),
    }

    // Persist whatever the last, possibly partial, cycle recorded.
    timeline.flush_cycle().await;
    registry.flush_cycle().await;

    // Dropping the last bus handle closes the channel and ends the notifier.
    drop(event_bus);
    if let Some(handle) = notifier_handle {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
    }

    tracing::info!("Graceful shutdown complete");
    served
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix). If a handler cannot
/// be installed that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
