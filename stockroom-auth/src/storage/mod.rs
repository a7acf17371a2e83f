//! Key-value storage scopes
//!
//! Sessions live in one of two scopes: a durable store that outlives the
//! process, and a tab-scoped store that lives as long as one [`AuthContext`].
//!
//! [`AuthContext`]: crate::AuthContext

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use stockroom_core::StockroomResult;

/// Session record `{token, user, ts}`, durable or tab scope
pub const SESSION_KEY: &str = "auth";
/// Cached permission keys, tab scope
pub const PERMISSIONS_KEY: &str = "perms";
/// Last known user id, tab scope, diagnostic only
pub const USER_ID_KEY: &str = "__auth_uid__";

/// Lifetime of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Survives restarts and is shared by every context using the same backing
    Durable,
    /// Private to one context
    Tab,
}

impl std::fmt::Display for StorageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageScope::Durable => write!(f, "durable"),
            StorageScope::Tab => write!(f, "tab"),
        }
    }
}

/// String key-value store with synchronous access
///
/// Reads never fail: an unreadable backing is reported as missing data.
pub trait KeyValueStore: Send + Sync {
    /// Which scope this store represents
    fn scope(&self) -> StorageScope;

    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StockroomResult<()>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> StockroomResult<()>;
}
