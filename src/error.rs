//! Error taxonomy at the remote boundary
//!
//! Provider and data-store failures arrive as loosely shaped payloads
//! (`code`, `error_code`, `msg`, `message`, HTTP status). They are translated
//! into [`AuthError`] exactly once, at the edge, and everything above the
//! HTTP layer matches on the closed enum.

use serde::Deserialize;
use thiserror::Error;

/// Data-store code for a write rejected by row-level access policy.
/// A freshly created identity hits this until its permissions propagate.
pub const POLICY_VIOLATION_CODE: &str = "42501";

/// Provider codes that indicate bad user input rather than a system fault
const VALIDATION_CODES: &[&str] = &[
    "invalid_credentials",
    "invalid_grant",
    "email_address_invalid",
    "email_exists",
    "user_already_exists",
    "weak_password",
    "validation_failed",
    "email_not_confirmed",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Permission not yet granted: {0}")]
    Policy(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Discriminant of [`AuthError`], handy for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Validation,
    Policy,
    Network,
    Unknown,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Validation(_) => AuthErrorKind::Validation,
            AuthError::Policy(_) => AuthErrorKind::Policy,
            AuthError::Network(_) => AuthErrorKind::Network,
            AuthError::Unknown(_) => AuthErrorKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::Validation(m)
            | AuthError::Policy(m)
            | AuthError::Network(m)
            | AuthError::Unknown(m) => m,
        }
    }

    /// Only policy propagation failures are worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Policy(_))
    }

    /// Translate a provider/data-store failure into the closed taxonomy.
    pub fn from_provider(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();

        if code == Some(POLICY_VIOLATION_CODE) {
            return AuthError::Policy(message);
        }
        if code.is_some_and(|c| VALIDATION_CODES.contains(&c)) {
            return AuthError::Validation(message);
        }

        match status {
            400 | 422 => AuthError::Validation(message),
            408 | 429 | 502 | 503 | 504 => AuthError::Network(message),
            _ => AuthError::Unknown(message),
        }
    }

    /// Translate a raw error body. Unparseable bodies keep the raw text.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => {
                let message = parsed
                    .message()
                    .unwrap_or_else(|| format!("request failed with status {status}"));
                Self::from_provider(status, parsed.code(), message)
            }
            Err(_) => {
                let message = if body.trim().is_empty() {
                    format!("request failed with status {status}")
                } else {
                    body.trim().to_string()
                };
                Self::from_provider(status, None, message)
            }
        }
    }
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthErrorKind::Validation => write!(f, "validation"),
            AuthErrorKind::Policy => write!(f, "policy"),
            AuthErrorKind::Network => write!(f, "network"),
            AuthErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Unknown(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

/// Union of the error body shapes the backend emits
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    error_code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<&str> {
        self.error_code
            .as_deref()
            .or_else(|| self.code.as_ref().and_then(|c| c.as_str()))
            .or(self.error.as_deref())
    }

    fn message(&self) -> Option<String> {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error_description.clone())
    }
}
