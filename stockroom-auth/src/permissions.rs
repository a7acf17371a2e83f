//! Permission cache
//!
//! Answers "may the current user do X" synchronously. The set is fetched from
//! `/auth/me` once per session and mirrored into the tab-scoped store so a
//! context rebuilt over the same tab store starts out ready.
//!
//! Until a fetch completes the state is [`PermissionState::Unknown`] and every
//! non-empty check is denied.

use crate::api::AuthApi;
use crate::error::AuthResult;
use crate::identity::{Session, UserProfile};
use crate::policy::AdminPolicy;
use crate::storage::{KeyValueStore, PERMISSIONS_KEY};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionState {
    /// No fetch has completed since the last reset
    Unknown,
    /// Fetch completed; the set may legitimately be empty
    Loaded(HashSet<String>),
}

impl PermissionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PermissionState::Loaded(_))
    }

    pub fn keys(&self) -> Option<&HashSet<String>> {
        match self {
            PermissionState::Loaded(keys) => Some(keys),
            PermissionState::Unknown => None,
        }
    }
}

pub struct PermissionCache {
    tab: Arc<dyn KeyValueStore>,
    state: watch::Sender<PermissionState>,
    // bumped by every reset; a refresh started under an older value is dropped
    generation: AtomicU64,
}

impl PermissionCache {
    pub fn new(tab: Arc<dyn KeyValueStore>) -> Self {
        let initial = hydrate(tab.as_ref());
        if let PermissionState::Loaded(keys) = &initial {
            debug!("Hydrated {} cached permissions from tab store", keys.len());
        }

        let (state, _) = watch::channel(initial);
        Self {
            tab,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    pub fn state(&self) -> PermissionState {
        self.state.borrow().clone()
    }

    /// Watch for changes; the receiver starts at the current state
    pub fn subscribe(&self) -> watch::Receiver<PermissionState> {
        self.state.subscribe()
    }

    /// Fetch the permission set for `session`
    ///
    /// Administrators resolve to an empty, ready set without a request. On
    /// failure the state is left as it was.
    pub async fn refresh(
        &self,
        session: &Session,
        policy: &AdminPolicy,
        api: &dyn AuthApi,
    ) -> AuthResult<()> {
        let generation = self.generation.load(Ordering::SeqCst);

        if policy.is_admin(&session.user) {
            debug!(
                "{} is an administrator, skipping permission fetch",
                session.user.display_string()
            );
            self.store(generation, HashSet::new());
            return Ok(());
        }

        let me = match api.me(&session.token).await {
            Ok(me) => me,
            Err(e) => {
                warn!("Permission fetch failed: {}", e);
                return Err(e);
            }
        };

        let count = me.permissions.len();
        if self.store(generation, me.permissions.into_iter().collect()) {
            info!(
                "Loaded {} permissions for {}",
                count,
                session.user.display_string()
            );
        }

        Ok(())
    }

    /// Does `user` hold any of `required`?
    ///
    /// Empty `required` means unrestricted.
    pub fn has_any<S: AsRef<str>>(
        &self,
        user: Option<&UserProfile>,
        policy: &AdminPolicy,
        required: &[S],
    ) -> bool {
        if user.is_some_and(|u| policy.is_admin(u)) {
            return true;
        }

        if required.is_empty() {
            return true;
        }

        match &*self.state.borrow() {
            PermissionState::Unknown => false,
            PermissionState::Loaded(keys) => required.iter().any(|k| keys.contains(k.as_ref())),
        }
    }

    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(PermissionState::Unknown);

        if let Err(e) = self.tab.remove(PERMISSIONS_KEY) {
            warn!("Failed to drop cached permissions: {}", e);
        }
        debug!("Permission cache reset");
    }

    fn store(&self, generation: u64, keys: HashSet<String>) -> bool {
        let tab = &self.tab;
        let current = &self.generation;

        self.state.send_if_modified(|state| {
            if current.load(Ordering::SeqCst) != generation {
                debug!("Discarding permissions fetched for a previous session");
                return false;
            }

            let mut sorted: Vec<&String> = keys.iter().collect();
            sorted.sort();
            match serde_json::to_string(&sorted) {
                Ok(json) => {
                    if let Err(e) = tab.set(PERMISSIONS_KEY, &json) {
                        warn!("Failed to cache permissions in tab store: {}", e);
                    }
                }
                Err(e) => warn!("Failed to encode permissions: {}", e),
            }

            *state = PermissionState::Loaded(keys);
            true
        })
    }
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("state", &*self.state.borrow())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

fn hydrate(tab: &dyn KeyValueStore) -> PermissionState {
    let Some(raw) = tab.get(PERMISSIONS_KEY) else {
        return PermissionState::Unknown;
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(keys) => PermissionState::Loaded(keys.into_iter().collect()),
        Err(e) => {
            warn!("Ignoring malformed cached permissions: {}", e);
            PermissionState::Unknown
        }
    }
}
