//! User model
//!
//! Users are provisioned by the setup step and never modified by the workflow.

use crate::auth::Role;
use serde::{Deserialize, Serialize};

/// User model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub email: String,
}
