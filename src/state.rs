//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::auth::Authenticator;
use crate::workflow::WorkflowEngine;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub engine: WorkflowEngine,

    pub authenticator: Authenticator,

    /// JWT secret key for token signing
    pub jwt_secret: String,

    pub token_ttl_minutes: i64,
}

impl AppState {
    pub fn new(
        engine: WorkflowEngine,
        authenticator: Authenticator,
        jwt_secret: String,
        token_ttl_minutes: i64,
    ) -> Self {
        Self {
            engine,
            authenticator,
            jwt_secret,
            token_ttl_minutes,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
