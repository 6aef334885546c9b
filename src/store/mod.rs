//! Storage layer
//!
//! Three keyed tables back the workflow: users, DML requests and environment
//! connections. Each has an in-memory implementation for development and
//! tests, and a PostgreSQL implementation for durable deployments.

pub mod memory;
pub mod postgres;
mod queries;

use crate::environments::EnvironmentConnection;
use crate::error::AppError;
use crate::users::User;
use crate::workflow::{DmlRequest, RequestStatus};
use async_trait::async_trait;
use uuid::Uuid;

/// Equality filters supported by request listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestFilter {
    /// Oldest first, so pending queues are worked in submission order
    Status(RequestStatus),
    /// Newest submission first
    Requestor(String),
    /// Most recent manager action first
    Manager(String),
    /// Most recent support action first
    Support(String),
}

impl RequestFilter {
    pub fn matches(&self, request: &DmlRequest) -> bool {
        match self {
            RequestFilter::Status(status) => request.status == *status,
            RequestFilter::Requestor(user) => request.requestor == *user,
            RequestFilter::Manager(user) => request.manager_username.as_deref() == Some(user),
            RequestFilter::Support(user) => request.support_username.as_deref() == Some(user),
        }
    }
}

/// Durable keyed storage for DML requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: &DmlRequest) -> Result<(), AppError>;

    async fn get(&self, request_id: Uuid) -> Result<Option<DmlRequest>, AppError>;

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<DmlRequest>, AppError>;

    /// Whole-record update, applied only while the stored status is still
    /// `expected`. Fails with `Conflict` otherwise.
    async fn update(&self, request: &DmlRequest, expected: RequestStatus) -> Result<(), AppError>;
}

/// username -> password hash -> role
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Insert or replace a user (administrative setup only)
    async fn upsert_user(&self, user: User) -> Result<(), AppError>;
}

/// env name -> connection descriptor
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn find_environment(&self, env_name: &str) -> Result<Option<EnvironmentConnection>, AppError>;

    /// All environments, ordered by name
    async fn list_environments(&self) -> Result<Vec<EnvironmentConnection>, AppError>;

    /// Insert or replace an environment (administrative setup only)
    async fn upsert_environment(&self, environment: EnvironmentConnection) -> Result<(), AppError>;
}
