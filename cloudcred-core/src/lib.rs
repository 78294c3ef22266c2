//! # cloudcred Core
//!
//! Credential resolution and request authentication for cloud service
//! clients.
//!
//! This crate provides:
//! - Readers for a credential file, `<SERVICE>_<PROPERTY>` environment
//!   variables and a JSON service catalog
//! - A resolver that consults those sources in a fixed order
//! - Authenticators for no auth, basic auth, static bearer tokens, IAM api
//!   keys and Cloud Pak for Data, with field validation
//! - Lazily refreshed access tokens for the token-issuing schemes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cloudcred_core::CredentialResolver;
//!
//! async fn bearer_token() -> Result<Option<String>, cloudcred_core::CloudCredError> {
//!     let authenticator = CredentialResolver::from_env().authenticator("assistant")?;
//!     let token = authenticator.access_token().await?;
//!     Ok(token.map(|t| t.access_token.expose().to_string()))
//! }
//! ```

pub mod authenticator;
pub mod error;
pub mod model;
pub mod resolve;
pub mod secret;
pub mod sources;
pub mod token;
pub mod token_manager;
pub mod transport;

// Re-export commonly used types at crate root
pub use model::{
    AuthType,
    CredentialSource,
    PropertyMap,
    ServiceName,
};

pub use secret::Secret;

pub use error::{
    AuthError,
    CloudCredError,
    ConfigError,
};

pub use sources::EnvSnapshot;

pub use resolve::{
    CredentialResolver,
    ResolvedCredentials,
    default_search_paths,
};

pub use authenticator::{
    Authenticator,
    BasicAuthenticator,
    BearerTokenAuthenticator,
    CloudPakForDataAuthenticator,
    Connector,
    IamAuthenticator,
    NoAuthAuthenticator,
};

pub use token::{
    Token,
    TokenError,
};

pub use token_manager::{
    TokenManager,
    TokenSource,
    TokenStatus,
};

pub use transport::{
    ReqwestTransport,
    SharedTransport,
    TokenTransport,
};
