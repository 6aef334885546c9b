//! Provisioning of users and target environments
//!
//! Neither is created through the workflow API. Operators call these at
//! startup (demo fixtures) or from their own tooling.

use crate::auth::{hash_password, Role};
use crate::environments::{ConnectionParams, EnvironmentConnection};
use crate::error::{validation_error, AppError};
use crate::store::{ConnectionRegistry, CredentialStore};
use crate::users::User;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

static ENV_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("environment name pattern is valid"));

const DEMO_PASSWORD: &str = "password123";

/// User to create or replace
#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 64, message = "Username must be between 1 and 64 characters"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    pub role: Role,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

/// Environment to register or replace
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEnvironment {
    #[validate(custom(function = "validate_env_name"))]
    pub env_name: String,

    #[validate(custom(function = "validate_connection_string"))]
    pub connection_string: String,

    pub description: Option<String>,
}

fn validate_env_name(name: &str) -> Result<(), ValidationError> {
    if !ENV_NAME_RE.is_match(name) {
        let mut err = ValidationError::new("invalid_env_name");
        err.message = Some(
            "Environment name must start with a letter and contain only letters, digits, '-' or '_'".into(),
        );
        return Err(err);
    }
    Ok(())
}

fn validate_connection_string(conn_str: &str) -> Result<(), ValidationError> {
    ConnectionParams::from_connection_string(conn_str)
        .map(|_| ())
        .map_err(|e| {
            let mut err = ValidationError::new("invalid_connection_string");
            err.message = Some(e.to_string().into());
            err
        })
}

/// Hash the password and upsert the user
pub async fn create_user(credentials: &dyn CredentialStore, user: NewUser) -> Result<(), AppError> {
    user.validate().map_err(|e| validation_error(e.to_string()))?;

    let password_hash = hash_password(&user.password)?;
    credentials
        .upsert_user(User {
            username: user.username.clone(),
            password_hash,
            role: user.role,
            email: user.email,
        })
        .await?;

    info!("Provisioned user {} ({})", user.username, user.role);
    Ok(())
}

/// Register a target environment, replacing any existing one of that name
pub async fn add_environment(registry: &dyn ConnectionRegistry, environment: NewEnvironment) -> Result<(), AppError> {
    environment.validate().map_err(|e| validation_error(e.to_string()))?;

    let env_name = environment.env_name.clone();
    registry
        .upsert_environment(EnvironmentConnection {
            env_name: environment.env_name,
            connection_string: environment.connection_string,
            description: environment.description,
        })
        .await?;

    info!("Registered environment {}", env_name);
    Ok(())
}

/// Demo users for every role plus DEV, UAT and PROD environments
pub async fn seed_demo_data(
    credentials: &dyn CredentialStore,
    registry: &dyn ConnectionRegistry,
) -> Result<(), AppError> {
    for (username, role) in [
        ("requestor1", Role::Requestor),
        ("manager1", Role::Manager),
        ("support1", Role::Support),
    ] {
        create_user(
            credentials,
            NewUser {
                username: username.to_string(),
                password: DEMO_PASSWORD.to_string(),
                role,
                email: format!("{}@example.com", username),
            },
        )
        .await?;
    }

    for (env_name, host, description) in [
        ("DEV", "dev-server", "Development Database"),
        ("UAT", "uat-server", "User Acceptance Testing"),
        ("PROD", "prod-server", "Production Database"),
    ] {
        add_environment(
            registry,
            NewEnvironment {
                env_name: env_name.to_string(),
                connection_string: format!("postgresql://user:password@{}:5432/database", host),
                description: Some(description.to_string()),
            },
        )
        .await?;
    }

    info!("🌱 Demo users and environments provisioned");
    Ok(())
}
