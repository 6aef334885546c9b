//! Authentication and authorization module
//!
//! Provides password verification, JWT sessions and role-based access control.

mod jwt;
mod middleware;
mod password;

pub use jwt::{create_token, decode_token, SessionToken};
pub use middleware::auth_middleware;
pub use password::{hash_password, verify_password};

use crate::error::AppError;
use crate::store::CredentialStore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// User roles in the approval chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Submits DML requests
    Requestor,
    /// First sign-off
    Manager,
    /// Production support: second sign-off and execution
    Support,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requestor => "requestor",
            Role::Manager => "manager",
            Role::Support => "support",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requestor" => Ok(Role::Requestor),
            "manager" => Ok(Role::Manager),
            "support" => Ok(Role::Support),
            other => Err(AppError::Validation(format!("Unknown role '{}'", other))),
        }
    }
}

/// Caller identity passed explicitly into every core operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
}

impl Session {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// Reject the caller unless it holds one of `accepted`
    pub fn require_role(&self, accepted: &[Role], operation: &str) -> Result<(), AppError> {
        if accepted.contains(&self.role) {
            return Ok(());
        }

        let expected = accepted
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(" or ");

        Err(AppError::Forbidden(format!(
            "{} requires the {} role, {} has {}",
            operation, expected, self.username, self.role
        )))
    }
}

/// Checks credentials against the credential store
pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
}

impl Authenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    /// Returns the session for valid credentials, `None` otherwise
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Session>, AppError> {
        let Some(user) = self.credentials.find_user(username).await? else {
            debug!("Login attempt for unknown user '{}'", username);
            return Ok(None);
        };

        if !verify_password(password, &user.password_hash)? {
            debug!("Login attempt with wrong password for '{}'", username);
            return Ok(None);
        }

        info!("User '{}' authenticated as {}", user.username, user.role);
        Ok(Some(Session::new(user.username, user.role)))
    }
}
