//! API client with a file-persisted session cache.
//!
//! The session survives process restarts. [`SessionCache::hydrate`] restores
//! it with a bounded wait, so a storage path that never answers cannot block a
//! caller indefinitely. Every request waits for hydration before attaching a
//! token. A 401 from the server unconditionally clears the cache and surfaces
//! [`ClientError::SessionExpired`], the caller's cue to return to the login
//! flow; there is no silent token refresh.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use crate::middleware::{CLIENT_ID_HEADER, CLIENT_SECRET_HEADER};
use crate::models::{CreateTask, Task, UpdateTask, UserProfile};

pub const DEFAULT_HYDRATE_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("session storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("session rejected or expired, login required")]
    SessionExpired,
    #[error("{0}")]
    Api(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSession {
    pub token: String,
    pub user: UserProfile,
    pub is_authenticated: bool,
}

/// Durable storage for the session state: a single named JSON file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    /// Unreadable or corrupt state reads as "no session".
    pub async fn read(&self) -> Option<CachedSession> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let raw = std::fs::read_to_string(path).ok()?;
            serde_json::from_str(&raw).ok()
        })
        .await
        .ok()
        .flatten()
    }

    pub fn write(&self, session: &CachedSession) -> std::io::Result<()> {
        let raw = serde_json::to_string(session).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, raw)
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// In-memory session state plus the hydration flag, which distinguishes "not
/// yet known" from "known to be unauthenticated".
#[derive(Debug)]
pub struct SessionCache {
    store: SessionStore,
    session: Option<CachedSession>,
    hydrated: bool,
}

impl SessionCache {
    pub fn new(store: SessionStore) -> Self {
        SessionCache {
            store,
            session: None,
            hydrated: false,
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn session(&self) -> Option<&CachedSession> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .filter(|s| s.is_authenticated)
            .map(|s| s.token.as_str())
    }

    /// Restore persisted state, racing the storage read against `max_wait`.
    /// Hydration completes either way; a storage that never answers leaves
    /// the cache known-unauthenticated. Idempotent after the first call.
    pub async fn hydrate(&mut self, max_wait: Duration) {
        let store = self.store.clone();
        self.hydrate_with(async move { store.read().await }, max_wait)
            .await;
    }

    pub async fn hydrate_with<F>(&mut self, load: F, max_wait: Duration)
    where
        F: Future<Output = Option<CachedSession>>,
    {
        if self.hydrated {
            return;
        }
        tokio::select! {
            session = load => {
                self.session = session;
            }
            _ = tokio::time::sleep(max_wait) => {
                warn!("session storage did not answer within {max_wait:?}, continuing unauthenticated");
            }
        }
        self.hydrated = true;
    }

    pub fn set(&mut self, session: CachedSession) -> std::io::Result<()> {
        self.store.write(&session)?;
        self.session = Some(session);
        self.hydrated = true;
        Ok(())
    }

    pub fn clear(&mut self) -> std::io::Result<()> {
        self.session = None;
        self.store.clear()
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    hydrate_wait: Duration,
    session: SessionCache,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        store: SessionStore,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        ApiClient {
            http: reqwest::Client::new(),
            base_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            hydrate_wait: DEFAULT_HYDRATE_WAIT,
            session: SessionCache::new(store),
        }
    }

    pub fn with_hydrate_wait(mut self, wait: Duration) -> Self {
        self.hydrate_wait = wait;
        self
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        self.session.session().map(|s| &s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.token().is_some()
    }

    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        let value = self
            .request(Method::POST, "/api/auth/register", Some(body))
            .await?;
        self.store_auth(&value)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let body = json!({ "email": email, "password": password });
        let value = self
            .request(Method::POST, "/api/auth/login", Some(body))
            .await?;
        self.store_auth(&value)
    }

    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.session.clear()?;
        Ok(())
    }

    pub async fn me(&mut self) -> Result<UserProfile, ClientError> {
        let value = self.request(Method::GET, "/api/auth/me", None).await?;
        data_field(&value, "user")
    }

    pub async fn list_tasks(&mut self) -> Result<Vec<Task>, ClientError> {
        let value = self.request(Method::GET, "/api/tasks", None).await?;
        data_field(&value, "tasks")
    }

    pub async fn create_task(&mut self, task: &CreateTask) -> Result<Task, ClientError> {
        let body = serde_json::to_value(task)?;
        let value = self.request(Method::POST, "/api/tasks", Some(body)).await?;
        data_field(&value, "task")
    }

    pub async fn get_task(&mut self, id: i64) -> Result<Task, ClientError> {
        let value = self
            .request(Method::GET, &format!("/api/tasks/{id}"), None)
            .await?;
        data_field(&value, "task")
    }

    pub async fn update_task(&mut self, id: i64, patch: &UpdateTask) -> Result<Task, ClientError> {
        let body = serde_json::to_value(patch)?;
        let value = self
            .request(Method::PUT, &format!("/api/tasks/{id}"), Some(body))
            .await?;
        data_field(&value, "task")
    }

    pub async fn delete_task(&mut self, id: i64) -> Result<(), ClientError> {
        self.request(Method::DELETE, &format!("/api/tasks/{id}"), None)
            .await?;
        Ok(())
    }

    async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        // Never race an unauthenticated request against in-flight restoration.
        self.session.hydrate(self.hydrate_wait).await;

        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(CLIENT_SECRET_HEADER, &self.client_secret);
        if let Some(token) = self.session.token() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.session.clear()?;
            return Err(ClientError::SessionExpired);
        }

        let value: Value = resp.json().await?;
        if !status.is_success() {
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("request rejected")
                .to_string();
            return Err(ClientError::Api(message));
        }
        Ok(value)
    }

    fn store_auth(&mut self, value: &Value) -> Result<UserProfile, ClientError> {
        let token = value
            .pointer("/data/token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ClientError::Api("malformed auth response".to_string()))?
            .to_string();
        let user: UserProfile = data_field(value, "user")?;
        self.session.set(CachedSession {
            token,
            user: user.clone(),
            is_authenticated: true,
        })?;
        Ok(user)
    }
}

fn data_field<T: DeserializeOwned>(value: &Value, key: &str) -> Result<T, ClientError> {
    let field = value
        .pointer(&format!("/data/{key}"))
        .cloned()
        .ok_or_else(|| ClientError::Api(format!("response missing data.{key}")))?;
    Ok(serde_json::from_value(field)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
        }
    }

    fn session() -> CachedSession {
        CachedSession {
            token: "token-value".to_string(),
            user: profile(),
            is_authenticated: true,
        }
    }

    #[tokio::test]
    async fn hydrate_restores_persisted_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.write(&session()).unwrap();

        let mut cache = SessionCache::new(store);
        assert!(!cache.is_hydrated());
        cache.hydrate(Duration::from_secs(1)).await;

        assert!(cache.is_hydrated());
        assert_eq!(cache.token(), Some("token-value"));
        assert_eq!(cache.session().unwrap().user.email, "ana@x.com");
    }

    #[tokio::test]
    async fn hydrate_deadline_fires_when_storage_never_answers() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        let mut cache = SessionCache::new(store);
        cache
            .hydrate_with(std::future::pending(), Duration::from_millis(20))
            .await;

        // Hydration completed anyway, in the known-unauthenticated state.
        assert!(cache.is_hydrated());
        assert!(cache.session().is_none());
    }

    #[tokio::test]
    async fn corrupt_state_reads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::new(path);
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        let mut cache = SessionCache::new(store.clone());
        cache.set(session()).unwrap();
        assert!(store.read().await.is_some());

        cache.clear().unwrap();
        assert!(store.read().await.is_none());
        cache.clear().unwrap();
    }

    #[tokio::test]
    async fn unauthenticated_session_exposes_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        let mut cache = SessionCache::new(store);
        let mut stale = session();
        stale.is_authenticated = false;
        cache.set(stale).unwrap();

        assert!(cache.token().is_none());
    }
}
