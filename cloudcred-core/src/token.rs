//! Access tokens and token service responses.
//!
//! This module provides:
//! - [`Token`] - An access token with its refresh deadline
//! - [`TokenError`] - Failures while issuing a token
//! - [`IamTokenResponse`] / [`Cp4dTokenResponse`] - Token service bodies
//! - [`refresh_deadline_millis`] - The 80%-of-TTL refresh rule

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

use crate::secret::Secret;

/// Percentage of a token's lifetime after which it is treated as expired.
///
/// Refreshing early keeps in-flight requests clear of the server-side expiry.
pub const REFRESH_PERCENT: i64 = 80;

/// Error type for token issuance.
///
/// These errors are logged and recovered by retrying on the next validity
/// check; they are never raised from an authenticator's constructor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token request could not be sent or no response arrived.
    #[error("network error: {message}")]
    Transport { message: String },

    /// The token service answered with a non-success status.
    #[error("token service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("failed to parse token response: {message}")]
    Parse { message: String },

    /// The response carried no access token.
    #[error("token response did not contain an access token")]
    MissingAccessToken,

    /// The access token is not a decodable JWT.
    #[error("access token is not a valid JWT: {message}")]
    InvalidJwt { message: String },

    /// A required expiry field or claim is absent.
    #[error("token response is missing '{field}'")]
    MissingExpiry { field: &'static str },

    /// No async runtime was available to issue the request.
    #[error("no async runtime available to issue a token request")]
    NoRuntime,
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Compute when a token should be refreshed.
///
/// Returns `issued_at + 0.8 * ttl`, converted from epoch seconds to epoch
/// milliseconds, or `None` if the result does not fit in an `i64`.
pub fn refresh_deadline_millis(issued_at_secs: i64, ttl_secs: i64) -> Option<i64> {
    let issued_at = issued_at_secs.checked_mul(1000)?;
    let margin = ttl_secs.checked_mul(1000)?.checked_mul(REFRESH_PERCENT)? / 100;
    issued_at.checked_add(margin)
}

fn deadline_or_error(issued_at_secs: i64, ttl_secs: i64) -> Result<i64, TokenError> {
    refresh_deadline_millis(issued_at_secs, ttl_secs).ok_or_else(|| TokenError::Parse {
        message: format!("token lifetime out of range (issued at {}, ttl {})", issued_at_secs, ttl_secs),
    })
}

/// An access token with its refresh deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token value attached to requests.
    pub access_token: Secret,

    /// Epoch millis after which the token is no longer used.
    ///
    /// `None` for caller-supplied tokens that never expire.
    pub expires_at_millis: Option<i64>,
}

impl Token {
    /// Create a token that never expires.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            expires_at_millis: None,
        }
    }

    /// Set the expiry in epoch millis. A negative value means "never".
    pub fn with_expiry_millis(mut self, expires_at_millis: i64) -> Self {
        self.expires_at_millis = (expires_at_millis >= 0).then_some(expires_at_millis);
        self
    }

    /// Check validity at the given time.
    ///
    /// A token is valid if its value is non-empty and it either has no
    /// expiry or `now_millis` has not passed the expiry.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        !self.access_token.is_empty()
            && self
                .expires_at_millis
                .map(|expiry| now_millis <= expiry)
                .unwrap_or(true)
    }

    /// Check validity against the system clock.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }
}

/// Body returned by the IAM token service.
#[derive(Debug, Clone, Deserialize)]
pub struct IamTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Expiry as epoch seconds.
    #[serde(default)]
    pub expiration: Option<i64>,
}

impl IamTokenResponse {
    pub fn parse(body: &str) -> Result<Self, TokenError> {
        serde_json::from_str(body).map_err(|e| TokenError::Parse {
            message: e.to_string(),
        })
    }

    /// Convert into a [`Token`] that refreshes at 80% of its lifetime.
    ///
    /// The issue time is `expiration - expires_in` when the server supplies
    /// `expiration`, otherwise `now_secs`.
    pub fn into_token(self, now_secs: i64) -> Result<Token, TokenError> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingAccessToken)?;
        let ttl = self
            .expires_in
            .ok_or(TokenError::MissingExpiry { field: "expires_in" })?;
        let issued_at = match self.expiration {
            Some(exp) => exp.checked_sub(ttl).ok_or(TokenError::Parse {
                message: "expiration is out of range".to_string(),
            })?,
            None => now_secs,
        };

        Ok(Token::new(access_token).with_expiry_millis(deadline_or_error(issued_at, ttl)?))
    }
}

/// Body returned by the Cloud Pak for Data authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Cp4dTokenResponse {
    #[serde(default, rename = "accessToken")]
    pub access_token: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default, rename = "_messageCode_")]
    pub message_code: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

impl Cp4dTokenResponse {
    pub fn parse(body: &str) -> Result<Self, TokenError> {
        serde_json::from_str(body).map_err(|e| TokenError::Parse {
            message: e.to_string(),
        })
    }

    /// Convert into a [`Token`] using the JWT's `iat` and `exp` claims.
    pub fn into_token(self) -> Result<Token, TokenError> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingAccessToken)?;
        let claims = JwtClaims::decode(&access_token)?;
        let iat = claims.iat.ok_or(TokenError::MissingExpiry { field: "iat" })?;
        let exp = claims.exp.ok_or(TokenError::MissingExpiry { field: "exp" })?;

        let ttl = exp.checked_sub(iat).ok_or(TokenError::Parse {
            message: "exp is out of range".to_string(),
        })?;

        Ok(Token::new(access_token).with_expiry_millis(deadline_or_error(iat, ttl)?))
    }
}

/// The timing claims of a JWT payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub exp: Option<i64>,
}

impl JwtClaims {
    /// Decode the claims of a JWT.
    ///
    /// The header and payload must be well-formed and a signature segment
    /// must be present. The signature itself is not verified.
    pub fn decode(jwt: &str) -> Result<Self, TokenError> {
        let invalid = |message: String| TokenError::InvalidJwt { message };

        if jwt.rsplit('.').next().is_none_or(str::is_empty) {
            return Err(invalid("missing signature segment".to_string()));
        }

        jsonwebtoken::dangerous::insecure_decode::<JwtClaims>(jwt)
            .map(|data| data.claims)
            .map_err(|e| invalid(e.to_string()))
    }
}
