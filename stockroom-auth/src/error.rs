use stockroom_core::StockroomError;

/// Errors raised by the auth client
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User account is inactive")]
    UserInactive,

    /// The backend answered 401 to an authenticated request
    #[error("Session rejected by the server (401)")]
    Unauthorized,

    #[error("No active session")]
    NotAuthenticated,

    #[error("HTTP {status} from {endpoint}: {message}")]
    Http {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Core error: {0}")]
    Core(#[from] StockroomError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Unauthorized)
    }

    /// Might the same request succeed if retried?
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) => true,
            AuthError::Http { status, .. } => *status >= 500,
            AuthError::Core(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Text shown to the signed-in operator (the UI is Turkish)
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "E-posta veya şifre hatalı.",
            AuthError::UserInactive => {
                "Hesabınız pasif durumda. Lütfen sistem yöneticinizle iletişime geçin."
            }
            AuthError::Unauthorized | AuthError::NotAuthenticated => {
                "Oturumunuz sona erdi. Lütfen tekrar giriş yapın."
            }
            AuthError::Network(_) => "Sunucuya ulaşılamadı. Bağlantınızı kontrol edin.",
            AuthError::Serialization(_) => "Sunucudan beklenmeyen bir yanıt alındı.",
            _ => "Beklenmeyen bir hata oluştu. Lütfen tekrar deneyin.",
        }
    }
}
