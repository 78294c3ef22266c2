//! Error types for cloudcred.
//!
//! Configuration errors are raised synchronously while an authenticator is
//! built and are never retried. Token issuance errors live in
//! [`crate::token::TokenError`] and are recovered by a lazy retry.

use thiserror::Error;

use crate::model::AuthType;
use crate::token::TokenError;

/// A missing or malformed authenticator property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required property is absent or empty.
    #[error("the {field} property is required but was not specified")]
    MissingProperty { field: &'static str },

    /// A property value starts or ends with a brace or quote.
    #[error("the {field} property is invalid: remove any surrounding {{, }}, or \" characters")]
    InvalidProperty { field: &'static str },

    /// Only one of client id / client secret was supplied.
    #[error("client id and client secret must both be provided, or neither")]
    ClientCredentialsMismatch,

    /// A URL property could not be parsed.
    #[error("the {field} property is not a valid URL: {message}")]
    InvalidUrl { field: &'static str, message: String },

    /// `AUTH_TYPE` names a scheme this crate does not know.
    #[error("unrecognized authentication type: {auth_type}")]
    UnknownAuthType { auth_type: String },
}

/// Error attaching credentials to an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The authenticator has no valid token yet; a request has been issued.
    #[error("no valid {auth_type} token is available yet")]
    TokenUnavailable { auth_type: AuthType },
}

/// Top-level error type encompassing all cloudcred errors.
#[derive(Debug, Error)]
pub enum CloudCredError {
    /// Invalid authenticator configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Token issuance failed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Credentials could not be attached to a request.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
}

/// Returns true if the value begins with `{` or `"`, or ends with `}` or `"`.
///
/// These are typical leftovers of credentials copied out of a JSON snippet.
pub fn has_bad_start_or_end_char(value: &str) -> bool {
    value.starts_with('{') || value.starts_with('"') || value.ends_with('}') || value.ends_with('"')
}

/// Require a non-empty property value free of surrounding braces or quotes.
pub(crate) fn require(field: &'static str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        None | Some("") => Err(ConfigError::MissingProperty { field }),
        Some(v) => check_chars(field, Some(v)),
    }
}

/// Reject a value with surrounding braces or quotes; `None` passes.
pub(crate) fn check_chars(field: &'static str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        Some(v) if has_bad_start_or_end_char(v) => Err(ConfigError::InvalidProperty { field }),
        _ => Ok(()),
    }
}
