//! Session store
//!
//! Persists the signed-in session in exactly one of the two scopes and tells
//! other contexts when it changes. Every mutation resets the permission cache
//! before touching storage, so a new user can never see the previous user's
//! permissions.

use crate::bus::{ContextId, SessionBus, SessionEnvelope, SessionEvent, SessionEvents, Subscription};
use crate::error::AuthResult;
use crate::identity::{AuthState, Session, UserProfile};
use crate::permissions::PermissionCache;
use crate::storage::{KeyValueStore, SESSION_KEY, USER_ID_KEY};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionStore {
    id: ContextId,
    durable: Arc<dyn KeyValueStore>,
    tab: Arc<dyn KeyValueStore>,
    permissions: Arc<PermissionCache>,
    bus: SessionBus,
}

impl SessionStore {
    pub fn new(
        id: ContextId,
        durable: Arc<dyn KeyValueStore>,
        tab: Arc<dyn KeyValueStore>,
        permissions: Arc<PermissionCache>,
        bus: SessionBus,
    ) -> Self {
        Self {
            id,
            durable,
            tab,
            permissions,
            bus,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Current session, durable scope first
    ///
    /// Unreadable records count as no session.
    pub fn get(&self) -> Option<Session> {
        let raw = self
            .durable
            .get(SESSION_KEY)
            .or_else(|| self.tab.get(SESSION_KEY))?;

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Ignoring malformed session record: {}", e);
                None
            }
        }
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.get())
    }

    /// Store a new session
    ///
    /// `remember` selects the durable scope; the other scope is cleared.
    pub fn set(
        &self,
        token: impl Into<String>,
        user: UserProfile,
        remember: bool,
    ) -> AuthResult<Session> {
        self.permissions.reset();

        let session = Session::new(token, user);
        let json = serde_json::to_string(&session)?;

        let (target, other) = if remember {
            (&self.durable, &self.tab)
        } else {
            (&self.tab, &self.durable)
        };
        // clear the other scope first so a failed write never leaves two sessions
        other.remove(SESSION_KEY)?;
        target.set(SESSION_KEY, &json)?;

        match session.user.id_string() {
            Some(uid) => self.tab.set(USER_ID_KEY, &uid)?,
            None => self.tab.remove(USER_ID_KEY)?,
        }

        info!(
            scope = %target.scope(),
            "Session stored for {}",
            session.user.display_string()
        );
        self.bus.publish(self.id, SessionEvent::Updated);

        Ok(session)
    }

    /// Remove the session from both scopes
    pub fn clear(&self) -> AuthResult<()> {
        self.permissions.reset();

        // attempt every removal even if one fails
        let results = [
            self.durable.remove(SESSION_KEY),
            self.tab.remove(SESSION_KEY),
            self.tab.remove(USER_ID_KEY),
        ];

        info!("Session cleared");
        self.bus.publish(self.id, SessionEvent::LoggedOut);

        for result in results {
            result?;
        }
        Ok(())
    }

    /// Call `callback` for every session change made by another context
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SessionEnvelope) + Send + 'static,
    {
        debug!(context = %self.id, "Session subscription added");
        Subscription::spawn(self.events(), callback)
    }

    /// Raw stream of session changes made by other contexts
    pub fn events(&self) -> SessionEvents {
        self.bus.listen(self.id)
    }

    /// Last user id recorded in this context's tab scope
    pub fn last_user_id(&self) -> Option<String> {
        self.tab.get(USER_ID_KEY)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("id", &self.id)
            .field("authenticated", &self.get().is_some())
            .finish()
    }
}
