//! Stockroom Auth - client-side session and permission cache
//!
//! Keeps the signed-in session of the warehouse backend and the user's
//! permission keys, and answers authorization questions without a request
//! per check:
//!
//! - **Storage** ([`storage`]): durable and tab-scoped key-value stores
//! - **Sessions** ([`SessionStore`]): one session, in exactly one scope
//! - **Permissions** ([`PermissionCache`]): fetched once per session, denied
//!   while unknown
//! - **Guards** ([`AuthGuard`], [`PermissionGuard`]): route-level gates
//! - **Bus** ([`SessionBus`]): tells other contexts that the session changed
//!
//! [`AuthContext`] ties these together for one tab.

pub mod api;
pub mod bus;
pub mod context;
pub mod error;
pub mod guard;
pub mod identity;
pub mod permissions;
pub mod policy;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

pub use api::{ApiClientConfig, AuthApi, HttpAuthApi, LoginRequest, LoginResponse, MeResponse};
pub use bus::{ContextId, SessionBus, SessionEnvelope, SessionEvent, SessionEvents, Subscription};
pub use context::{AuthContext, AuthContextBuilder};
pub use error::{AuthError, AuthResult};
pub use guard::{AuthGuard, GuardOutcome, GuardPaths, PermissionGuard};
pub use identity::{AuthState, Session, UserProfile};
pub use permissions::{PermissionCache, PermissionState};
pub use policy::AdminPolicy;
pub use session::SessionStore;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageScope};
