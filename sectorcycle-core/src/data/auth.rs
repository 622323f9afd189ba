//! Access-token sources.
//!
//! The brokerage login happens in a separate local web app that stores the
//! session token and serves it from `GET /get_token`. This module only reads
//! that token; it never performs the login itself.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

use super::provider::{CredentialSource, DataError};

/// Brokerage session token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} chars>)", self.0.len())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Reads the token from the local login service.
pub struct TokenService {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl TokenService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/get_token", self.base_url)
    }

    fn parse_body(status: u16, body: &str) -> Result<AccessToken, DataError> {
        let parsed = serde_json::from_str::<TokenResponse>(body);

        if status != 200 {
            let detail = parsed
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(DataError::AuthenticationRequired(format!(
                "token service returned HTTP {status}: {detail}"
            )));
        }

        let parsed = parsed.map_err(|e| {
            DataError::ResponseFormatChanged(format!("token service returned non-JSON body ({e}): {body}"))
        })?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(DataError::AuthenticationRequired(format!(
                "token service returned HTTP {status}: {}",
                parsed
                    .error
                    .unwrap_or_else(|| "no access token in response".to_string())
            ))),
        }
    }
}

impl CredentialSource for TokenService {
    fn current_access_token(&self) -> Result<AccessToken, DataError> {
        let url = self.token_url();
        debug!(%url, "requesting access token");

        let resp = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                error!(%url, "token service is not running");
                DataError::AuthenticationRequired(format!(
                    "login service is not running at {}; start it and visit {}/login",
                    self.base_url, self.base_url
                ))
            } else {
                DataError::NetworkUnreachable(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        Self::parse_body(status, &body)
    }
}

/// A token supplied up front (environment variable, test fixture).
pub struct StaticToken(Option<AccessToken>);

impl StaticToken {
    pub fn new(token: Option<AccessToken>) -> Self {
        Self(token)
    }

    /// Read the token from an environment variable; unset or empty is absent.
    pub fn from_env(var: &str) -> Self {
        Self(
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(AccessToken::new),
        )
    }
}

impl CredentialSource for StaticToken {
    fn current_access_token(&self) -> Result<AccessToken, DataError> {
        self.0.clone().ok_or_else(|| {
            DataError::AuthenticationRequired("no access token configured".to_string())
        })
    }
}
