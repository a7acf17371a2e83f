//! Signed-in user and session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User object returned by `/auth/login` and `/auth/me`
///
/// The fields the client reasons about are kept as raw JSON and read through
/// accessors, so an unexpected shape in one of them never makes the whole
/// record unreadable. Everything else the backend sends is kept in `extra`.
/// Both are written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    /// A bare name, or an object carrying `id` and `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            email: Some(Value::String(email.into())),
            role: Some(Value::String(role.into())),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_role_id(mut self, role_id: i64) -> Self {
        self.role_id = Some(Value::from(role_id));
        self
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_ref().and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Value::as_str)
    }

    pub fn role_name(&self) -> Option<&str> {
        match self.role.as_ref()? {
            Value::String(name) => Some(name.as_str()),
            Value::Object(role) => role.get("name").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Integer `roleId` if present, otherwise the id nested in a role object
    ///
    /// Ids sent in any other shape, such as `"4"`, are not treated as ids.
    pub fn effective_role_id(&self) -> Option<i64> {
        self.role_id.as_ref().and_then(Value::as_i64).or_else(|| {
            self.role
                .as_ref()
                .and_then(|role| role.get("id"))
                .and_then(Value::as_i64)
        })
    }

    /// User id rendered as plain text, for logs and the diagnostic uid key
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn display_string(&self) -> String {
        let who = self
            .name()
            .or_else(|| self.email())
            .map(str::to_string)
            .or_else(|| self.id_string())
            .unwrap_or_else(|| "unknown user".to_string());

        match self.role_name() {
            Some(role) => format!("{} ({})", who, role),
            None => who,
        }
    }
}

/// Persisted session record, stored as `{token, user, ts}`
///
/// `ts` is epoch milliseconds so records written by the web client load too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            token: token.into(),
            user,
            ts: Utc::now(),
        }
    }
}

/// Whether a session exists
///
/// A missing or unreadable session is `Unauthenticated`; callers never see a
/// storage error here.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Session),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn into_session(self) -> Option<Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Unauthenticated => None,
        }
    }
}

impl From<Option<Session>> for AuthState {
    fn from(session: Option<Session>) -> Self {
        session.map_or(AuthState::Unauthenticated, AuthState::Authenticated)
    }
}
