use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labflow_api::config::ServerConfig;
use labflow_api::router::build_app_router;
use labflow_api::state::AppState;
use labflow_core::directory::MemoryIdentityDirectory;
use labflow_core::signature::MemoryCredentialValidator;
use labflow_core::store::MemoryReportStore;
use labflow_core::workflow::{MemoryWorkflowRepository, WorkflowEngine};
use labflow_events::{AuditLogger, EventBus, EventBusAuditSink};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "labflow_api=debug,labflow_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let logger_handle = tokio::spawn(AuditLogger::run(event_bus.subscribe()));
    tracing::info!("Audit logger started");

    // --- Engine ---
    let reports = Arc::new(MemoryReportStore::new());
    let directory = Arc::new(MemoryIdentityDirectory::new());
    let engine = WorkflowEngine::new(
        reports.clone(),
        Arc::new(MemoryWorkflowRepository::new()),
        Arc::new(MemoryCredentialValidator::new()),
        directory.clone(),
        Arc::new(EventBusAuditSink::new(Arc::clone(&event_bus))),
        config.engine.clone(),
    );
    tracing::info!(bots = engine.bots().len(), "Workflow engine ready");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
        reports,
        directory,
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // The router (and its clones of the bus) is gone; dropping ours closes
    // the channel so the logger drains and exits.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), logger_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
