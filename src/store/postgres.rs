//! PostgreSQL stores
//!
//! One pool backs all three tables.

use crate::auth::Role;
use crate::environments::EnvironmentConnection;
use crate::error::AppError;
use crate::store::queries;
use crate::store::{ConnectionRegistry, CredentialStore, RequestFilter, RequestStore};
use crate::users::User;
use crate::workflow::{DmlRequest, RequestStatus};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the tables and indexes if they don't exist
    pub async fn init_schema(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        for statement in queries::CREATE_TABLES {
            client.execute(*statement, &[]).await?;
        }
        info!("✅ Approval store tables initialized");
        Ok(())
    }
}

fn request_from_row(row: &Row) -> Result<DmlRequest, AppError> {
    Ok(DmlRequest {
        request_id: row.try_get("request_id")?,
        requestor: row.try_get("requestor")?,
        dml_statement: row.try_get("dml_statement")?,
        target_db: row.try_get("target_db")?,
        target_schema: row.try_get("target_schema")?,
        status: row.try_get("status")?,
        created_date: row.try_get("created_date")?,
        manager_username: row.try_get("manager_username")?,
        manager_comments: row.try_get("manager_comments")?,
        manager_action_date: row.try_get("manager_action_date")?,
        support_username: row.try_get("support_username")?,
        support_comments: row.try_get("support_comments")?,
        support_action_date: row.try_get("support_action_date")?,
        execution_date: row.try_get("execution_date")?,
        execution_result: row.try_get("execution_result")?,
    })
}

fn environment_from_row(row: &Row) -> Result<EnvironmentConnection, AppError> {
    Ok(EnvironmentConnection {
        env_name: row.try_get("env_name")?,
        connection_string: row.try_get("connection_string")?,
        description: row.try_get("description")?,
    })
}

#[async_trait]
impl RequestStore for PostgresStore {
    async fn insert(&self, request: &DmlRequest) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                queries::INSERT_REQUEST,
                &[
                    &request.request_id,
                    &request.requestor,
                    &request.dml_statement,
                    &request.target_db,
                    &request.target_schema,
                    &request.status,
                    &request.created_date,
                ],
            )
            .await
            .map_err(|e| {
                if e.to_string().contains("unique constraint") {
                    AppError::Conflict(format!("Request {} already exists", request.request_id))
                } else {
                    AppError::Database(e)
                }
            })?;
        debug!("Stored request {}", request.request_id);
        Ok(())
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<DmlRequest>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::SELECT_REQUEST_BY_ID, &[&request_id])
            .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<DmlRequest>, AppError> {
        let client = self.pool.get().await?;
        let rows = match filter {
            RequestFilter::Status(status) => {
                client.query(queries::SELECT_REQUESTS_BY_STATUS, &[status]).await?
            }
            RequestFilter::Requestor(user) => {
                client.query(queries::SELECT_REQUESTS_BY_REQUESTOR, &[user]).await?
            }
            RequestFilter::Manager(user) => {
                client.query(queries::SELECT_REQUESTS_BY_MANAGER, &[user]).await?
            }
            RequestFilter::Support(user) => {
                client.query(queries::SELECT_REQUESTS_BY_SUPPORT, &[user]).await?
            }
        };
        rows.iter().map(request_from_row).collect()
    }

    async fn update(&self, request: &DmlRequest, expected: RequestStatus) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                queries::UPDATE_REQUEST,
                &[
                    &request.request_id,
                    &request.status,
                    &request.manager_username,
                    &request.manager_comments,
                    &request.manager_action_date,
                    &request.support_username,
                    &request.support_comments,
                    &request.support_action_date,
                    &request.execution_date,
                    &request.execution_result,
                    &expected,
                ],
            )
            .await?;

        if updated == 1 {
            return Ok(());
        }

        // Nothing matched: either the row is gone or its status moved on
        match self.get(request.request_id).await? {
            None => Err(AppError::NotFound(format!(
                "Request {} not found",
                request.request_id
            ))),
            Some(current) => Err(AppError::Conflict(format!(
                "Request {} is now '{}', expected '{}'",
                request.request_id, current.status, expected
            ))),
        }
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let Some(row) = client.query_opt(queries::SELECT_USER, &[&username]).await? else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        Ok(Some(User {
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: role
                .parse::<Role>()
                .map_err(|e| AppError::Internal(format!("Corrupt user record '{}': {}", username, e)))?,
            email: row.try_get("email")?,
        }))
    }

    async fn upsert_user(&self, user: User) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                queries::UPSERT_USER,
                &[&user.username, &user.password_hash, &user.role.as_str(), &user.email],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConnectionRegistry for PostgresStore {
    async fn find_environment(&self, env_name: &str) -> Result<Option<EnvironmentConnection>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::SELECT_ENVIRONMENT, &[&env_name])
            .await?;
        row.as_ref().map(environment_from_row).transpose()
    }

    async fn list_environments(&self) -> Result<Vec<EnvironmentConnection>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(queries::LIST_ENVIRONMENTS, &[]).await?;
        rows.iter().map(environment_from_row).collect()
    }

    async fn upsert_environment(&self, environment: EnvironmentConnection) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                queries::UPSERT_ENVIRONMENT,
                &[
                    &environment.env_name,
                    &environment.connection_string,
                    &environment.description,
                ],
            )
            .await?;
        Ok(())
    }
}
