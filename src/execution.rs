//! Execution gateway
//!
//! Applies an approved DML statement to its target environment. The
//! statement text is trusted as submitted: no parsing, no dry run, no
//! transaction wrapping. Sign-off by two people is the only safeguard.
//!
//! The target schema is matched exactly as submitted (`Sales` and `sales` are
//! different schemas) and must already exist in the environment.

use crate::db::make_tls_connector;
use crate::environments::{ConnectionParams, EnvironmentConnection};
use crate::error::AppError;
use crate::store::ConnectionRegistry;
use crate::workflow::{DmlRequest, EXECUTION_SUCCESS};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why an execution attempt failed. Recorded, never propagated.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No connection configuration found for {0}")]
    UnknownEnvironment(String),

    #[error("Schema \"{schema}\" does not exist in {environment}")]
    UnknownSchema { schema: String, environment: String },

    /// Connect, schema selection or statement failure, message verbatim
    #[error("{0}")]
    Target(String),
}

impl From<tokio_postgres::Error> for ExecutionError {
    fn from(e: tokio_postgres::Error) -> Self {
        ExecutionError::Target(e.as_db_error().map_or_else(|| e.to_string(), |db| db.to_string()))
    }
}

/// Outcome of the single execution attempt for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub message: String,
}

/// Runs one statement against one environment
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(
        &self,
        environment: &EnvironmentConnection,
        schema: Option<&str>,
        statement: &str,
    ) -> Result<u64, ExecutionError>;
}

/// Quote `name` as a PostgreSQL identifier
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// tokio-postgres executor; opens a fresh connection per attempt
#[derive(Default)]
pub struct PostgresExecutor;

impl PostgresExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn connect(environment: &EnvironmentConnection) -> Result<Client, ExecutionError> {
        let params = ConnectionParams::from_connection_string(&environment.connection_string)
            .map_err(|e| ExecutionError::Target(e.to_string()))?;

        let mut config = tokio_postgres::Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .user(&params.user)
            .password(&params.password)
            .dbname(&params.database)
            .application_name("dmlgate");

        let client = if params.require_tls {
            let (client, connection) = config.connect(make_tls_connector()).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Target connection error: {}", e);
                }
            });
            client
        } else {
            let (client, connection) = config.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Target connection error: {}", e);
                }
            });
            client
        };

        debug!("Connected to environment {} ({})", environment.env_name, params.to_display_string());
        Ok(client)
    }
}

#[async_trait]
impl StatementExecutor for PostgresExecutor {
    async fn execute(
        &self,
        environment: &EnvironmentConnection,
        schema: Option<&str>,
        statement: &str,
    ) -> Result<u64, ExecutionError> {
        let client = Self::connect(environment).await?;

        if let Some(schema) = schema {
            // search_path accepts missing schemas silently
            if client
                .query_opt("SELECT 1 FROM pg_namespace WHERE nspname = $1", &[&schema])
                .await?
                .is_none()
            {
                return Err(ExecutionError::UnknownSchema {
                    schema: schema.to_string(),
                    environment: environment.env_name.clone(),
                });
            }
            client
                .batch_execute(&format!("SET search_path TO {}", quote_identifier(schema)))
                .await?;
        }

        Ok(client.execute(statement, &[]).await?)
    }
}

/// Resolves environments and runs approved statements, one attempt each
pub struct ExecutionGateway {
    registry: Arc<dyn ConnectionRegistry>,
    executor: Arc<dyn StatementExecutor>,
    in_flight: Mutex<HashSet<Uuid>>,
    /// Ran, but the outcome never reached the request store. Never retried.
    unrecorded: Mutex<HashSet<Uuid>>,
}

/// Exclusive right to execute one request in this process.
///
/// Dropping a claim after [`ExecutionGateway::run`] without calling
/// [`InFlightClaim::recorded`] (store error, cancelled caller) blocks the
/// request id for the life of the process.
pub struct InFlightClaim<'a> {
    gateway: &'a ExecutionGateway,
    request_id: Uuid,
    attempted: AtomicBool,
    recorded: bool,
}

impl InFlightClaim<'_> {
    /// The outcome is stored; release the claim normally
    pub fn recorded(mut self) {
        self.recorded = true;
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if self.attempted.load(Ordering::SeqCst) && !self.recorded {
            error!(
                "Request {} ran but its outcome was not recorded; refusing further executions until reconciled",
                self.request_id
            );
            self.gateway
                .unrecorded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(self.request_id);
        }

        self.gateway
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

impl ExecutionGateway {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            registry,
            executor,
            in_flight: Mutex::new(HashSet::new()),
            unrecorded: Mutex::new(HashSet::new()),
        }
    }

    /// Run the statement of an approved request and capture the outcome.
    ///
    /// The caller must hold the request's [`InFlightClaim`]. An error means
    /// no attempt was made because the registry itself could not be read;
    /// everything that goes wrong on the target side is a failed outcome.
    pub async fn run(&self, request: &DmlRequest, claim: &InFlightClaim<'_>) -> Result<ExecutionOutcome, AppError> {
        debug_assert_eq!(claim.request_id, request.request_id);

        let environment = self.registry.find_environment(&request.target_db).await?;
        let schema = Some(request.target_schema.trim()).filter(|s| !s.is_empty());

        claim.attempted.store(true, Ordering::SeqCst);
        let result = match environment {
            Some(environment) => {
                self.executor
                    .execute(&environment, schema, &request.dml_statement)
                    .await
            }
            None => Err(ExecutionError::UnknownEnvironment(request.target_db.clone())),
        };

        let outcome = match result {
            Ok(rows) => {
                info!(
                    "Executed request {} on {} ({} rows affected)",
                    request.request_id, request.target_db, rows
                );
                ExecutionOutcome {
                    succeeded: true,
                    message: EXECUTION_SUCCESS.to_string(),
                }
            }
            Err(e) => {
                warn!("Execution of request {} failed: {}", request.request_id, e);
                ExecutionOutcome {
                    succeeded: false,
                    message: e.to_string(),
                }
            }
        };

        Ok(outcome)
    }

    /// Claim `request_id` for execution; fails if another task holds it or
    /// an earlier run's outcome was lost
    pub fn claim(&self, request_id: Uuid) -> Result<InFlightClaim<'_>, AppError> {
        if self
            .unrecorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&request_id)
        {
            return Err(AppError::Conflict(format!(
                "Request {} was already executed but its outcome was not recorded",
                request_id
            )));
        }

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(request_id) {
            return Err(AppError::Conflict(format!(
                "Request {} is already being executed",
                request_id
            )));
        }
        Ok(InFlightClaim {
            gateway: self,
            request_id,
            attempted: AtomicBool::new(false),
            recorded: false,
        })
    }
}
