//! DML Gate API - two-step approval for production data changes
//!
//! A requestor submits a DML statement for a registered environment. A manager
//! and then production support sign off, and support runs it exactly once.
//! The outcome, success or the database error verbatim, is kept on the request.

mod auth;
mod config;
mod db;
mod environments;
mod error;
mod execution;
mod models;
mod routes;
mod setup;
mod state;
mod store;
mod users;
mod workflow;

use crate::auth::Authenticator;
use crate::config::{Settings, StorageBackend};
use crate::execution::PostgresExecutor;
use crate::routes::create_router;
use crate::state::AppState;
use crate::store::memory::{MemoryConnectionRegistry, MemoryCredentialStore, MemoryRequestStore};
use crate::store::postgres::PostgresStore;
use crate::store::{ConnectionRegistry, CredentialStore, RequestStore};
use crate::workflow::WorkflowEngine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The three stores behind the workflow, whichever backend provides them
struct Stores {
    requests: Arc<dyn RequestStore>,
    credentials: Arc<dyn CredentialStore>,
    registry: Arc<dyn ConnectionRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting DML Gate...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let jwt_secret = settings.auth.jwt_secret.clone().unwrap_or_else(|| {
        warn!("⚠️  JWT_SECRET not set, using a random per-process secret (sessions end on restart)");
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect()
    });

    let stores = init_stores(&settings).await?;

    if settings.seed_demo_data {
        setup::seed_demo_data(stores.credentials.as_ref(), stores.registry.as_ref()).await?;
    }

    let engine = WorkflowEngine::new(
        stores.requests,
        stores.registry,
        Arc::new(PostgresExecutor::new()),
    );
    let state = Arc::new(AppState::new(
        engine,
        Authenticator::new(stores.credentials),
        jwt_secret,
        settings.auth.token_ttl_minutes,
    ));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   POST /api/auth/login                     - Login with username/password");
    info!("   GET  /api/auth/me                        - Current session");
    info!("   GET  /api/environments                   - Target environments");
    info!("   POST /api/requests                       - Submit a DML request");
    info!("   GET  /api/requests?status=|mine=true     - List requests");
    info!("   GET  /api/requests/:id                   - Request details");
    info!("   POST /api/requests/:id/manager-decision  - Manager approve/reject");
    info!("   POST /api/requests/:id/support-decision  - Support approve/reject");
    info!("   POST /api/requests/:id/execute           - Execute an approved request");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dmlgate_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

async fn init_stores(settings: &Settings) -> anyhow::Result<Stores> {
    match (settings.storage, &settings.database) {
        (StorageBackend::Postgres, Some(database)) => {
            let pool = db::create_pool(database).await?;
            let store = Arc::new(PostgresStore::new(pool));
            store.init_schema().await?;
            Ok(Stores {
                requests: store.clone(),
                credentials: store.clone(),
                registry: store,
            })
        }
        (StorageBackend::Postgres, None) => Err(anyhow::anyhow!(
            "DATABASE_URL must be set for the postgres storage backend"
        )),
        (StorageBackend::Memory, _) => {
            warn!("⚠️  Using in-memory storage: requests are lost on restart");
            Ok(Stores {
                requests: Arc::new(MemoryRequestStore::new()),
                credentials: Arc::new(MemoryCredentialStore::new()),
                registry: Arc::new(MemoryConnectionRegistry::new()),
            })
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
