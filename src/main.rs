//! fanout-gateway server entry point.
//!
//! Connects to the bus, starts the subscription supervisor, and serves the
//! WebSocket and REST endpoints until shutdown or until the supervisor
//! gives up on the subscription.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use fanout_gateway::api;
use fanout_gateway::app_state::{AppState, ConnectionSettings};
use fanout_gateway::bus::{DistributionBus, InMemoryBroker, RedisBus};
use fanout_gateway::config::{BusBackend, GatewayConfig, LogFormat};
use fanout_gateway::domain::ConnectionRegistry;
use fanout_gateway::service::{SubscriptionStatus, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    let instance_id = uuid::Uuid::new_v4();
    tracing::info!(
        addr = %config.listen_addr,
        instance = %instance_id,
        topic = %config.topic,
        backend = ?config.bus_backend,
        "starting fanout-gateway"
    );

    // Connect the bus
    let bus: Arc<dyn DistributionBus> = match config.bus_backend {
        BusBackend::Redis => {
            Arc::new(RedisBus::connect(&config.redis_url, config.topic.clone()).await?)
        }
        BusBackend::Memory => {
            tracing::warn!("in-memory bus selected; messages do not leave this process");
            let broker = InMemoryBroker::new(config.topic.clone(), config.memory_bus_capacity);
            Arc::new(broker.connect())
        }
    };

    // Build domain layer and start the subscription loop
    let registry = Arc::new(ConnectionRegistry::new());
    let status = Arc::new(SubscriptionStatus::new());
    let supervisor = Supervisor::new(
        Arc::clone(&bus),
        Arc::clone(&registry),
        Arc::clone(&status),
        config.resubscribe,
    );
    let supervisor_task = tokio::spawn(supervisor.run());

    // Build application state
    let app_state = AppState {
        instance_id,
        registry,
        bus,
        status,
        connection: ConnectionSettings {
            outbound_queue_capacity: config.outbound_queue_capacity,
            write_timeout: config.write_timeout,
        },
    };
    let app = api::build_app(app_state, config.http_request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        served = async { server.await } => served?,
        supervised = supervisor_task => match supervised {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, "fan-out lost; shutting down instance");
                return Err(err.into());
            }
            Err(join_err) => {
                tracing::error!(error = %join_err, "supervisor task failed");
                return Err(join_err.into());
            }
        },
    }

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
