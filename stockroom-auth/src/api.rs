//! Backend auth API
//!
//! `POST /auth/login`, `GET /auth/me`, and bearer-authenticated JSON reads.

use crate::error::{AuthError, AuthResult};
use crate::identity::UserProfile;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stockroom_core::{ApiConfig, ErrorContext, StockroomError};
use tracing::debug;

const LOGIN_PATH: &str = "/auth/login";
const ME_PATH: &str = "/auth/me";

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// `/auth/me` body: the permission keys plus the user's own fields
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token and user
    async fn login(&self, request: &LoginRequest) -> AuthResult<LoginResponse>;

    /// Current user's permissions
    async fn me(&self, token: &str) -> AuthResult<MeResponse>;

    /// Authenticated GET returning raw JSON
    async fn get_json(&self, path: &str, token: &str) -> AuthResult<serde_json::Value>;
}

/// Configuration for [`HttpAuthApi`]
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl From<&ApiConfig> for ApiClientConfig {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self::from(&ApiConfig::default())
    }
}

pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(config: ApiClientConfig) -> AuthResult<Self> {
        let client = create_http_client(&config)?;
        debug!("Created auth API client for {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn authorized_get(&self, path: &str, token: &str) -> AuthResult<reqwest::Response> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self.client.get(&url).bearer_auth(token).send().await?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, path).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> AuthResult<LoginResponse> {
        let url = self.url(LOGIN_PATH);
        debug!("POST {} as {}", url, request.email);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return decode_body(response).await;
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = response.text().await.unwrap_or_default();
            return Err(login_rejection(&body).unwrap_or(AuthError::InvalidCredentials));
        }

        Err(handle_response_error(response, LOGIN_PATH).await)
    }

    async fn me(&self, token: &str) -> AuthResult<MeResponse> {
        let response = self.authorized_get(ME_PATH, token).await?;
        decode_body(response).await
    }

    async fn get_json(&self, path: &str, token: &str) -> AuthResult<serde_json::Value> {
        let response = self.authorized_get(path, token).await?;
        decode_body(response).await
    }
}

/// Read a success body and parse it
///
/// Transport failures stay `Network`; a body that arrives but does not parse
/// is `Serialization`.
async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> AuthResult<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Map a login rejection body to its specific error, if it names one
fn login_rejection(body: &str) -> Option<AuthError> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.message.as_deref()? {
        "INVALID_CREDENTIALS" => Some(AuthError::InvalidCredentials),
        "USER_INACTIVE" => Some(AuthError::UserInactive),
        _ => None,
    }
}

fn create_http_client(config: &ApiClientConfig) -> AuthResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| StockroomError::Network {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?;

    Ok(client)
}

async fn handle_response_error(response: reqwest::Response, endpoint: &str) -> AuthError {
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AuthError::Unauthorized;
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);

    AuthError::Http {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
        message,
    }
}
