//! Auth context
//!
//! One [`AuthContext`] per tab (or per test, or per account). It owns the
//! session store, permission cache, admin policy and API client, and is
//! passed explicitly to whatever needs an authorization decision.

use crate::api::{AuthApi, HttpAuthApi, LoginRequest};
use crate::bus::{ContextId, SessionBus, SessionEnvelope, SessionEvents, Subscription};
use crate::error::{AuthError, AuthResult};
use crate::guard::{AuthGuard, GuardPaths, PermissionGuard};
use crate::identity::{AuthState, Session};
use crate::permissions::{PermissionCache, PermissionState};
use crate::policy::AdminPolicy;
use crate::session::SessionStore;
use crate::storage::{KeyValueStore, MemoryStore};
use std::sync::Arc;
use stockroom_core::StockroomConfig;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AuthContext {
    sessions: SessionStore,
    permissions: Arc<PermissionCache>,
    policy: AdminPolicy,
    api: Arc<dyn AuthApi>,
    paths: GuardPaths,
}

impl AuthContext {
    pub fn builder(api: Arc<dyn AuthApi>) -> AuthContextBuilder {
        AuthContextBuilder::new(api)
    }

    /// Context talking HTTP to the configured backend
    pub fn from_config(
        config: &StockroomConfig,
        durable: Arc<dyn KeyValueStore>,
        bus: SessionBus,
    ) -> AuthResult<Self> {
        let api = HttpAuthApi::new((&config.api).into())?;

        Ok(Self::builder(Arc::new(api))
            .durable(durable)
            .bus(bus)
            .policy(AdminPolicy::from_config(&config.auth))
            .paths(GuardPaths {
                sign_in: config.auth.sign_in_path.clone(),
                home: config.auth.home_path.clone(),
            })
            .build())
    }

    pub fn id(&self) -> ContextId {
        self.sessions.id()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn policy(&self) -> &AdminPolicy {
        &self.policy
    }

    pub fn paths(&self) -> &GuardPaths {
        &self.paths
    }

    pub fn state(&self) -> AuthState {
        self.sessions.state()
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.get()
    }

    /// Sign in and store the session
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> AuthResult<Session> {
        let request = LoginRequest::new(email, password);

        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Login failed for {}: {}", email, e);
                return Err(e);
            }
        };

        let session = self.sessions.set(response.token, response.user, remember)?;
        info!("Signed in as {}", session.user.display_string());
        Ok(session)
    }

    pub fn logout(&self) -> AuthResult<()> {
        self.sessions.clear()
    }

    pub fn is_ready(&self) -> bool {
        self.permissions.is_ready()
    }

    pub fn permission_state(&self) -> PermissionState {
        self.permissions.state()
    }

    pub fn subscribe_permissions(&self) -> watch::Receiver<PermissionState> {
        self.permissions.subscribe()
    }

    /// Load the permission set for the current session
    pub async fn refresh(&self) -> AuthResult<()> {
        let session = self.session().ok_or(AuthError::NotAuthenticated)?;

        let result = self
            .permissions
            .refresh(&session, &self.policy, self.api.as_ref())
            .await;
        self.on_unauthorized(result)
    }

    /// Does the signed-in user hold any of `required`?
    pub fn has_any<S: AsRef<str>>(&self, required: &[S]) -> bool {
        let session = self.session();
        self.permissions
            .has_any(session.as_ref().map(|s| &s.user), &self.policy, required)
    }

    pub fn reset_permissions(&self) {
        self.permissions.reset();
    }

    /// Authenticated GET; a 401 ends the session
    pub async fn authorized_get(&self, path: &str) -> AuthResult<serde_json::Value> {
        let session = self.session().ok_or(AuthError::NotAuthenticated)?;
        let result = self.api.get_json(path, &session.token).await;
        self.on_unauthorized(result)
    }

    /// Session changes made by other contexts
    pub fn session_events(&self) -> SessionEvents {
        self.sessions.events()
    }

    pub fn subscribe_session<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SessionEnvelope) + Send + 'static,
    {
        self.sessions.subscribe(callback)
    }

    /// Reset this context's permissions whenever another context changes
    /// the session
    ///
    /// Must be called from within a Tokio runtime. Keep the handle alive.
    pub fn spawn_session_sync(&self) -> Subscription {
        let permissions = self.permissions.clone();
        let id = self.id();

        self.sessions.subscribe(move |envelope| {
            info!(
                context = %id,
                origin = %envelope.origin,
                event = %envelope.event,
                "Session changed elsewhere, dropping cached permissions"
            );
            permissions.reset();
        })
    }

    pub fn auth_guard(&self) -> AuthGuard<'_> {
        AuthGuard::new(self)
    }

    pub fn permission_guard<I, S>(&self, required: I) -> PermissionGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PermissionGuard::new(self, required)
    }

    fn on_unauthorized<T>(&self, result: AuthResult<T>) -> AuthResult<T> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                warn!("Server rejected the session, signing out");
                if let Err(clear_err) = self.sessions.clear() {
                    warn!("Failed to clear rejected session: {}", clear_err);
                }
            }
        }
        result
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("sessions", &self.sessions)
            .field("permissions", &self.permissions)
            .field("paths", &self.paths)
            .finish()
    }
}

pub struct AuthContextBuilder {
    api: Arc<dyn AuthApi>,
    id: Option<ContextId>,
    durable: Option<Arc<dyn KeyValueStore>>,
    tab: Option<Arc<dyn KeyValueStore>>,
    bus: Option<SessionBus>,
    policy: Option<AdminPolicy>,
    paths: Option<GuardPaths>,
}

impl AuthContextBuilder {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            id: None,
            durable: None,
            tab: None,
            bus: None,
            policy: None,
            paths: None,
        }
    }

    pub fn id(mut self, id: ContextId) -> Self {
        self.id = Some(id);
        self
    }

    /// Durable store; share it between contexts that share a login
    pub fn durable(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = Some(store);
        self
    }

    pub fn tab(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.tab = Some(store);
        self
    }

    pub fn bus(mut self, bus: SessionBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn policy(mut self, policy: AdminPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn paths(mut self, paths: GuardPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn build(self) -> AuthContext {
        let durable = self
            .durable
            .unwrap_or_else(|| Arc::new(MemoryStore::durable()));
        let tab = self.tab.unwrap_or_else(|| Arc::new(MemoryStore::tab()));
        let permissions = Arc::new(PermissionCache::new(tab.clone()));

        let sessions = SessionStore::new(
            self.id.unwrap_or_else(Uuid::new_v4),
            durable,
            tab,
            permissions.clone(),
            self.bus.unwrap_or_default(),
        );

        AuthContext {
            sessions,
            permissions,
            policy: self.policy.unwrap_or_default(),
            api: self.api,
            paths: self.paths.unwrap_or_default(),
        }
    }
}
