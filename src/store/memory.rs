//! In-memory stores
//!
//! Same contracts as the PostgreSQL stores, held in process memory. Used for
//! local development (`STORAGE_BACKEND=memory`) and by the unit tests.

use crate::environments::EnvironmentConnection;
use crate::error::AppError;
use crate::store::{ConnectionRegistry, CredentialStore, RequestFilter, RequestStore};
use crate::users::User;
use crate::workflow::{DmlRequest, RequestStatus};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Thread-safe request store
#[derive(Default)]
pub struct MemoryRequestStore {
    requests: RwLock<HashMap<Uuid, DmlRequest>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert(&self, request: &DmlRequest) -> Result<(), AppError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.request_id) {
            return Err(AppError::Conflict(format!(
                "Request {} already exists",
                request.request_id
            )));
        }
        requests.insert(request.request_id, request.clone());
        debug!("Stored request {}", request.request_id);
        Ok(())
    }

    async fn get(&self, request_id: Uuid) -> Result<Option<DmlRequest>, AppError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&request_id).cloned())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<DmlRequest>, AppError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<DmlRequest> = requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        match filter {
            RequestFilter::Status(_) => matching.sort_by_key(|r| r.created_date),
            RequestFilter::Requestor(_) => matching.sort_by_key(|r| Reverse(r.created_date)),
            RequestFilter::Manager(_) => matching.sort_by_key(|r| Reverse(r.manager_action_date)),
            RequestFilter::Support(_) => matching.sort_by_key(|r| Reverse(r.support_action_date)),
        }

        Ok(matching)
    }

    async fn update(&self, request: &DmlRequest, expected: RequestStatus) -> Result<(), AppError> {
        let mut requests = self.requests.write().await;
        let stored = requests
            .get_mut(&request.request_id)
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request.request_id)))?;

        if stored.status != expected {
            return Err(AppError::Conflict(format!(
                "Request {} is now '{}', expected '{}'",
                request.request_id, stored.status, expected
            )));
        }

        *stored = request.clone();
        Ok(())
    }
}

/// In-memory user store
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, AppError> {
        let users = self.users.read().await;
        Ok(users.get(username).cloned())
    }

    async fn upsert_user(&self, user: User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        users.insert(user.username.clone(), user);
        Ok(())
    }
}

/// In-memory environment registry
#[derive(Default)]
pub struct MemoryConnectionRegistry {
    environments: RwLock<HashMap<String, EnvironmentConnection>>,
}

impl MemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn remove_environment(&self, env_name: &str) -> Option<EnvironmentConnection> {
        self.environments.write().await.remove(env_name)
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryConnectionRegistry {
    async fn find_environment(&self, env_name: &str) -> Result<Option<EnvironmentConnection>, AppError> {
        let environments = self.environments.read().await;
        Ok(environments.get(env_name).cloned())
    }

    async fn list_environments(&self) -> Result<Vec<EnvironmentConnection>, AppError> {
        let environments = self.environments.read().await;
        let mut all: Vec<EnvironmentConnection> = environments.values().cloned().collect();
        all.sort_by(|a, b| a.env_name.cmp(&b.env_name));
        Ok(all)
    }

    async fn upsert_environment(&self, environment: EnvironmentConnection) -> Result<(), AppError> {
        let mut environments = self.environments.write().await;
        environments.insert(environment.env_name.clone(), environment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::NewDmlRequest;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn request_by(requestor: &str) -> DmlRequest {
        DmlRequest::new(
            requestor,
            NewDmlRequest {
                dml_statement: "DELETE FROM audit WHERE id = 7".to_string(),
                target_db: "UAT".to_string(),
                target_schema: "public".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_guarded_update_rejects_stale_expectation() {
        let store = MemoryRequestStore::new();
        let original = request_by("requestor1");
        assert_ok!(store.insert(&original).await);

        let mut first = original.clone();
        first.record_manager_decision("manager1", true, "first".into()).unwrap();
        let mut second = original.clone();
        second.record_manager_decision("manager2", false, "second".into()).unwrap();

        assert_ok!(store.update(&first, RequestStatus::PendingManagerApproval).await);
        let err = store
            .update(&second, RequestStatus::PendingManagerApproval)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = store.get(original.request_id).await.unwrap().unwrap();
        assert_eq!(stored.manager_username.as_deref(), Some("manager1"));
        assert_eq!(stored.manager_comments.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryRequestStore::new();
        let request = request_by("requestor1");
        assert_ok!(store.insert(&request).await);
        assert_err!(store.insert(&request).await);
    }

    #[tokio::test]
    async fn test_list_orders() {
        let store = MemoryRequestStore::new();
        let mut older = request_by("requestor1");
        older.created_date = older.created_date - chrono::Duration::minutes(5);
        let newer = request_by("requestor1");
        let other = request_by("requestor2");
        for r in [&older, &newer, &other] {
            store.insert(r).await.unwrap();
        }

        let mine = store
            .list(&RequestFilter::Requestor("requestor1".into()))
            .await
            .unwrap();
        let ids: Vec<Uuid> = mine.iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![newer.request_id, older.request_id]);

        let pending = store
            .list(&RequestFilter::Status(RequestStatus::PendingManagerApproval))
            .await
            .unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].request_id, older.request_id);

        let none = store
            .list(&RequestFilter::Manager("manager1".into()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_registry_lists_sorted() {
        let registry = MemoryConnectionRegistry::new();
        for name in ["UAT", "DEV", "PROD"] {
            registry
                .upsert_environment(EnvironmentConnection {
                    env_name: name.to_string(),
                    connection_string: format!("postgres://u:p@{}-server/db", name.to_lowercase()),
                    description: None,
                })
                .await
                .unwrap();
        }

        let names: Vec<String> = registry
            .list_environments()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.env_name)
            .collect();
        assert_eq!(names, vec!["DEV", "PROD", "UAT"]);

        assert!(registry.remove_environment("DEV").await.is_some());
        assert!(registry.find_environment("DEV").await.unwrap().is_none());
    }
}
