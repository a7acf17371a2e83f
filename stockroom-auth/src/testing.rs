//! In-crate test doubles

use crate::api::{AuthApi, LoginRequest, LoginResponse, MeResponse};
use crate::error::{AuthError, AuthResult};
use crate::identity::UserProfile;
use crate::storage::{KeyValueStore, MemoryStore, StorageScope};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stockroom_core::{storage_error, StockroomResult};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    None,
    Server,
    Unauthorized,
}

/// Pauses `me` until released
#[derive(Debug, Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Auth API double that records calls
#[derive(Debug)]
pub struct RecordingApi {
    permissions: Vec<String>,
    login_user: UserProfile,
    failure: Mutex<Failure>,
    gate: Option<Gate>,
    me_calls: AtomicUsize,
    login_calls: AtomicUsize,
    get_paths: Mutex<Vec<String>>,
}

impl RecordingApi {
    pub fn with_permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            login_user: UserProfile::new("op@example.com", "operator").with_id(7),
            failure: Mutex::new(Failure::None),
            gate: None,
            me_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            get_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let api = Self::with_permissions(Vec::<String>::new());
        api.fail_with(Failure::Server);
        api
    }

    pub fn gated<I, S>(permissions: I) -> (Self, Gate)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gate = Gate::default();
        let mut api = Self::with_permissions(permissions);
        api.gate = Some(gate.clone());
        (api, gate)
    }

    pub fn logging_in_as(mut self, user: UserProfile) -> Self {
        self.login_user = user;
        self
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn get_paths(&self) -> Vec<String> {
        self.get_paths.lock().unwrap().clone()
    }

    fn check(&self) -> AuthResult<()> {
        match *self.failure.lock().unwrap() {
            Failure::None => Ok(()),
            Failure::Server => Err(AuthError::Http {
                status: 500,
                endpoint: "/auth/me".to_string(),
                message: "boom".to_string(),
            }),
            Failure::Unauthorized => Err(AuthError::Unauthorized),
        }
    }
}

#[async_trait]
impl AuthApi for RecordingApi {
    async fn login(&self, request: &LoginRequest) -> AuthResult<LoginResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if request.password != "secret" {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(LoginResponse {
            token: format!("token-for-{}", request.email),
            user: self.login_user.clone(),
        })
    }

    async fn me(&self, _token: &str) -> AuthResult<MeResponse> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.check()?;
        Ok(MeResponse {
            permissions: self.permissions.clone(),
            user: self.login_user.clone(),
        })
    }

    async fn get_json(&self, path: &str, _token: &str) -> AuthResult<serde_json::Value> {
        self.get_paths.lock().unwrap().push(path.to_string());
        self.check()?;
        Ok(serde_json::json!({ "path": path }))
    }
}

/// Durable store double whose writes can be switched off
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_set: AtomicBool,
    fail_remove: AtomicBool,
}

impl FlakyStore {
    pub fn durable() -> Self {
        Self {
            inner: MemoryStore::durable(),
            fail_set: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
        }
    }

    pub fn fail_sets(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn scope(&self) -> StorageScope {
        self.inner.scope()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StockroomResult<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(storage_error!("quota exceeded", key));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StockroomResult<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(storage_error!("store locked", key));
        }
        self.inner.remove(key)
    }
}
