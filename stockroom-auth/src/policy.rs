//! Administrator detection
//!
//! Administrators pass every permission check without a permission fetch.
//! Which roles count is configuration, and must match the backend's role
//! table; nothing here can detect drift.

use crate::identity::UserProfile;
use std::collections::HashSet;
use stockroom_core::AuthConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPolicy {
    role_names: HashSet<String>,
    role_ids: HashSet<i64>,
}

impl AdminPolicy {
    pub fn new<I, S>(role_names: I, role_ids: impl IntoIterator<Item = i64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            role_names: role_names
                .into_iter()
                .map(|name| normalize(name.as_ref()))
                .filter(|name| !name.is_empty())
                .collect(),
            role_ids: role_ids.into_iter().collect(),
        }
    }

    /// Policy that never grants the bypass
    pub fn none() -> Self {
        Self::new(Vec::<String>::new(), Vec::new())
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.admin_role_names, config.admin_role_ids.iter().copied())
    }

    pub fn is_admin(&self, user: &UserProfile) -> bool {
        let by_name = user
            .role_name()
            .map(|name| self.role_names.contains(&normalize(name)))
            .unwrap_or(false);

        by_name
            || user
                .effective_role_id()
                .map(|id| self.role_ids.contains(&id))
                .unwrap_or(false)
    }
}

impl Default for AdminPolicy {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
