//! Database connection management
//!
//! Builds the application store pool and the TLS connector shared with the
//! execution gateway.

use crate::config::DatabaseConfig;
use crate::error::AppError;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{info, warn};

/// rustls connector trusting the platform's native roots
pub fn make_tls_connector() -> MakeRustlsConnect {
    let certs = rustls_native_certs::load_native_certs();
    for error in &certs.errors {
        warn!("Skipping unreadable native certificate: {}", error);
    }

    let mut root_store = rustls::RootCertStore::empty();
    for cert in certs.certs {
        root_store.add(cert).ok();
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(tls_config)
}

/// Create and verify the application store pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));

    let pool = if config.require_tls {
        cfg.create_pool(Some(Runtime::Tokio1), make_tls_connector())
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    }
    .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))?;

    // Test connection
    let client = pool.get().await?;
    client.query_one("SELECT 1", &[]).await?;
    drop(client);

    info!(
        "✅ Approval store connected: {}@{}:{}/{} (TLS: {})",
        config.user, config.host, config.port, config.database, config.require_tls
    );
    Ok(pool)
}
