//! OAuth 2.0 credentials for the YouTube Data API.
//!
//! A one-time `likesync auth` run walks the user through Google's consent
//! screen and stores a refresh token in the token file. Sync runs exchange
//! that refresh token for short-lived access tokens as needed.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use url::Url;

use super::error::ApiError;

pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/";

/// Refresh a cached access token this long before Google says it expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Long-lived credentials persisted between runs.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenFile {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenFile")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl TokenFile {
    pub async fn load(path: &Path) -> Result<Self, ApiError> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| ApiError::TokenFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let token: TokenFile =
            serde_json::from_str(&contents).map_err(|e| ApiError::TokenFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if token.refresh_token.is_empty() {
            return Err(ApiError::TokenFile {
                path: path.to_path_buf(),
                reason: "refresh_token is empty".to_string(),
            });
        }
        Ok(token)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ApiError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ApiError::Decode {
            endpoint: "token file".to_string(),
            source,
        })?;
        fs::write(path, json).await?;
        #[cfg(unix)]
        {
            // Holds a refresh token; owner-only.
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }
        tracing::debug!("Saved OAuth credentials to {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn from_response(response: &TokenResponse, now: DateTime<Utc>) -> Self {
        let lifetime = response.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        Self {
            value: response.access_token.clone(),
            expires_at: now + Duration::seconds(lifetime),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Hands out access tokens, refreshing them from the stored refresh token.
pub struct Authenticator {
    client: Client,
    credentials: TokenFile,
    token_uri: String,
    cached: Mutex<Option<AccessToken>>,
}

impl Authenticator {
    pub fn new(client: Client, credentials: TokenFile) -> Self {
        Self {
            client,
            credentials,
            token_uri: TOKEN_URI.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// A valid access token, refreshing it when missing or about to expire.
    ///
    /// A revoked or expired refresh token surfaces as an
    /// [`ApiError::OAuth`] that classifies as an authorization failure.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Refreshing OAuth access token");
        let response = request_token(
            &self.client,
            &self.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.credentials.client_id),
                ("client_secret", &self.credentials.client_secret),
                ("refresh_token", &self.credentials.refresh_token),
            ],
        )
        .await?;
        let token = AccessToken::from_response(&response, Utc::now());
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

async fn request_token(
    client: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, ApiError> {
    let response = client.post(token_uri).form(params).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_oauth_response(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: "oauth2/token".to_string(),
        source,
    })
}

/// Consent screen URL for an offline-access grant.
pub fn authorization_url(client_id: &str, redirect_uri: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        AUTH_URI,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
}

/// Pull the authorization code out of the URL the browser was redirected to.
///
/// Accepts a bare code as well, for users who copy only the parameter.
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) if !input.contains(['?', '&', '=', ' ']) => Some(input.to_string()),
        Err(_) => None,
    }
}

/// Exchange an authorization code for long-lived credentials.
pub async fn exchange_code(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenFile, ApiError> {
    let response = request_token(
        client,
        TOKEN_URI,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ],
    )
    .await?;
    let refresh_token = response
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::OAuth {
            error: "missing_refresh_token".to_string(),
            description: Some(
                "Google did not return a refresh token; revoke the app's access and retry"
                    .to_string(),
            ),
        })?;
    Ok(TokenFile {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("likesync")
            .join("youtube_auth_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn credentials() -> TokenFile {
        TokenFile {
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "s3cret".to_string(),
            refresh_token: "1//refresh".to_string(),
        }
    }

    #[tokio::test]
    async fn test_token_file_save_then_load() {
        let path = test_dir("save_load").join("nested").join("token.json");
        credentials().save(&path).await.unwrap();
        let loaded = TokenFile::load(&path).await.unwrap();
        assert_eq!(loaded, credentials());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_token_file_missing() {
        let path = test_dir("missing").join("token.json");
        let err = TokenFile::load(&path).await.unwrap_err();
        assert!(matches!(err, ApiError::TokenFile { .. }));
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_token_file_empty_refresh_token() {
        let path = test_dir("empty_refresh").join("token.json");
        std::fs::write(
            &path,
            r#"{"client_id": "a", "client_secret": "b", "refresh_token": ""}"#,
        )
        .unwrap();
        let err = TokenFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("refresh_token is empty"));
    }

    #[tokio::test]
    async fn test_token_file_garbage() {
        let path = test_dir("garbage").join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            TokenFile::load(&path).await,
            Err(ApiError::TokenFile { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", credentials());
        assert!(debug.contains("client.apps.googleusercontent.com"));
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("1//refresh"));
    }

    #[test]
    fn test_authorization_url_params() {
        let url = authorization_url("my-client", DEFAULT_REDIRECT_URI).unwrap();
        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert!(url.as_str().starts_with(AUTH_URI));
        assert_eq!(get("client_id"), Some("my-client"));
        assert_eq!(get("redirect_uri"), Some(DEFAULT_REDIRECT_URI));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("scope"), Some(SCOPE));
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("prompt"), Some("consent"));
    }

    #[test]
    fn test_extract_code_from_redirect() {
        let redirected = "http://localhost:8080/?state=x&code=4%2F0Abc&scope=https://www.googleapis.com/auth/youtube.force-ssl";
        assert_eq!(extract_code(redirected).as_deref(), Some("4/0Abc"));
    }

    #[test]
    fn test_extract_code_bare() {
        assert_eq!(extract_code("  4/0Abc-xyz\n").as_deref(), Some("4/0Abc-xyz"));
    }

    #[test]
    fn test_extract_code_rejects_missing_or_denied() {
        assert!(extract_code("").is_none());
        assert!(extract_code("http://localhost:8080/?error=access_denied").is_none());
        assert!(extract_code("http://localhost:8080/?code=").is_none());
    }

    #[test]
    fn test_access_token_freshness() {
        let now = Utc::now();
        let response = TokenResponse {
            access_token: "ya29.token".to_string(),
            expires_in: Some(3599),
            refresh_token: None,
        };
        let token = AccessToken::from_response(&response, now);
        assert_eq!(token.value, "ya29.token");
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(3599 - EXPIRY_MARGIN_SECS)));
    }

    #[test]
    fn test_access_token_default_lifetime() {
        let now = Utc::now();
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "t", "token_type": "Bearer"}"#).unwrap();
        let token = AccessToken::from_response(&response, now);
        assert_eq!(token.expires_at, now + Duration::seconds(DEFAULT_LIFETIME_SECS));
    }
}
