use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::sync::FetchError;

/// Error `reason` codes that mean the credentials themselves are no good.
const AUTH_REASONS: &[&str] = &["authError", "invalidCredentials", "insufficientPermissions"];

/// OAuth error codes that mean the refresh token is revoked, expired or
/// belongs to a different client.
const REVOKED_GRANT_ERRORS: &[&str] = &["invalid_grant", "invalid_client", "unauthorized_client"];

/// Errors from the YouTube Data API and Google's OAuth endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} from {endpoint}: {message}")]
    Status {
        status: u16,
        endpoint: String,
        reason: Option<String>,
        message: String,
    },

    #[error("OAuth token request rejected ({error}): {}", description.as_deref().unwrap_or("no description"))]
    OAuth {
        error: String,
        description: Option<String>,
    },

    #[error("Unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("The authenticated channel has no liked videos playlist")]
    NoLikesPlaylist,

    #[error("Cannot read token file {path}: {reason}. Run `likesync auth` to create it")]
    TokenFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Google API error envelope: `{"error": {"code", "message", "errors": [{"reason"}]}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

/// OAuth error body: `{"error": "invalid_grant", "error_description": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorBody {
    pub(crate) error: String,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}

impl ApiError {
    /// Build a status error from a non-success API response body.
    pub(crate) fn from_status(status: u16, endpoint: &str, body: &str) -> Self {
        let (reason, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (
                envelope.error.errors.into_iter().find_map(|e| e.reason),
                envelope.error.message.unwrap_or_default(),
            ),
            Err(_) => (None, body.chars().take(200).collect()),
        };
        ApiError::Status {
            status,
            endpoint: endpoint.to_string(),
            reason,
            message,
        }
    }

    /// Build an error from a non-success OAuth token endpoint response.
    pub(crate) fn from_oauth_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<OAuthErrorBody>(body) {
            Ok(parsed) => ApiError::OAuth {
                error: parsed.error,
                description: parsed.error_description,
            },
            Err(_) => ApiError::from_status(status, "oauth2/token", body),
        }
    }

    /// Whether the stored credentials need to be re-acquired.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ApiError::Status { status: 401, .. } => true,
            ApiError::Status {
                status: 403,
                reason: Some(reason),
                ..
            } => AUTH_REASONS.contains(&reason.as_str()),
            ApiError::OAuth { error, .. } => REVOKED_GRANT_ERRORS.contains(&error.as_str()),
            ApiError::TokenFile { .. } => true,
            _ => false,
        }
    }
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        if err.is_auth_failure() {
            return FetchError::AuthExpired(err.to_string());
        }
        match err {
            ApiError::Decode { .. } | ApiError::NoLikesPlaylist => {
                FetchError::MalformedPage(err.to_string())
            }
            other => FetchError::Transient(other.to_string()),
        }
    }
}
