//! Authenticators.
//!
//! [`Authenticator`] is a single enum over every supported scheme:
//!
//! | Variant | `AUTH_TYPE` | Attaches |
//! |---------|-------------|----------|
//! | [`NoAuthAuthenticator`] | `noAuth` | nothing |
//! | [`BasicAuthenticator`] | `basic` | username and password |
//! | [`BearerTokenAuthenticator`] | `bearerToken` | a caller-supplied token |
//! | [`IamAuthenticator`] | `iam` | a token issued for an api key |
//! | [`CloudPakForDataAuthenticator`] | `cp4d` | a token issued for a username/password |
//!
//! Every variant validates its configuration when constructed. The two
//! token-issuing variants request their first token on construction
//! without blocking; until it arrives [`Authenticator::can_authenticate`]
//! returns `false`.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use cloudcred_core::{Authenticator, PropertyMap};
//!
//! let props = PropertyMap::new()
//!     .with("AUTH_TYPE", "basic")
//!     .with("USERNAME", "admin")
//!     .with("PASSWORD", "hunter2");
//! let authenticator = Authenticator::from_properties(&props)?;
//!
//! let request = reqwest::Client::new().get("https://example.com/v1/status");
//! let response = authenticator.authorize(request)?.send().await?;
//! # Ok(())
//! # }
//! ```

mod basic;
mod bearer;
mod cp4d;
mod iam;

pub use basic::BasicAuthenticator;
pub use bearer::BearerTokenAuthenticator;
pub use cp4d::{CP4D_URL_SUFFIX, CloudPakForDataAuthenticator, CloudPakForDataAuthenticatorBuilder};
pub use iam::{DEFAULT_IAM_URL, IamAuthenticator, IamAuthenticatorBuilder};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{AuthError, ConfigError};
use crate::model::{AuthType, PropertyMap};
use crate::token::{Token, TokenError};
use crate::token_manager::TokenStatus;
use crate::transport::{ReqwestTransport, SharedTransport};

/// Something credentials can be attached to before it is sent.
pub trait Connector {
    /// Attach `Authorization: Bearer <token>`.
    fn with_bearer_token(&mut self, token: &str);

    /// Attach a username/password pair.
    fn with_basic_auth(&mut self, username: &str, password: &str);
}

impl Connector for HeaderMap {
    fn with_bearer_token(&mut self, token: &str) {
        set_authorization(self, format!("Bearer {}", token));
    }

    fn with_basic_auth(&mut self, username: &str, password: &str) {
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        set_authorization(self, format!("Basic {}", encoded));
    }
}

fn set_authorization(headers: &mut HeaderMap, value: String) {
    match HeaderValue::from_str(&value) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Err(_) => {
            tracing::warn!("Credential contains characters not allowed in a header; not attached");
        }
    }
}

/// Authenticator that attaches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoAuthAuthenticator;

impl NoAuthAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

/// The credential an authenticator attaches to one request.
enum Credential<'a> {
    None,
    Basic { username: &'a str, password: &'a str },
    Bearer(Token),
}

/// One authenticator per service client.
#[derive(Debug)]
pub enum Authenticator {
    NoAuth(NoAuthAuthenticator),
    Basic(BasicAuthenticator),
    Bearer(BearerTokenAuthenticator),
    Iam(IamAuthenticator),
    Cp4d(CloudPakForDataAuthenticator),
}

impl Authenticator {
    /// Build the authenticator described by `props`.
    ///
    /// The scheme comes from `AUTH_TYPE` (default `iam`). Token-issuing
    /// schemes use the default `reqwest` transport.
    pub fn from_properties(props: &PropertyMap) -> Result<Self, ConfigError> {
        Self::build(props, ReqwestTransport::shared)
    }

    /// Like [`from_properties`](Authenticator::from_properties) with an
    /// explicit transport for token requests.
    pub fn from_properties_with_transport(
        props: &PropertyMap,
        transport: SharedTransport,
    ) -> Result<Self, ConfigError> {
        Self::build(props, move || transport)
    }

    fn build(
        props: &PropertyMap,
        transport: impl FnOnce() -> SharedTransport,
    ) -> Result<Self, ConfigError> {
        let authenticator = match AuthType::from_properties(props)? {
            AuthType::NoAuth => Self::NoAuth(NoAuthAuthenticator),
            AuthType::Basic => Self::Basic(BasicAuthenticator::from_properties(props)?),
            AuthType::BearerToken => Self::Bearer(BearerTokenAuthenticator::from_properties(props)?),
            AuthType::Iam => Self::Iam(
                IamAuthenticatorBuilder::from_properties(props)
                    .transport(transport())
                    .build()?,
            ),
            AuthType::Cp4d => Self::Cp4d(
                CloudPakForDataAuthenticatorBuilder::from_properties(props)
                    .transport(transport())
                    .build()?,
            ),
        };

        tracing::debug!("Created {} authenticator", authenticator.auth_type());
        Ok(authenticator)
    }

    pub fn auth_type(&self) -> AuthType {
        match self {
            Self::NoAuth(_) => AuthType::NoAuth,
            Self::Basic(_) => AuthType::Basic,
            Self::Bearer(_) => AuthType::BearerToken,
            Self::Iam(_) => AuthType::Iam,
            Self::Cp4d(_) => AuthType::Cp4d,
        }
    }

    /// Re-check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::NoAuth(_) => Ok(()),
            Self::Basic(a) => a.validate(),
            Self::Bearer(a) => a.validate(),
            Self::Iam(a) => a.validate(),
            Self::Cp4d(a) => a.validate(),
        }
    }

    /// Whether credentials can be attached right now.
    ///
    /// For token-issuing schemes this checks the token's deadline on every
    /// call and starts a new request when the token is absent or expired.
    pub fn can_authenticate(&self) -> bool {
        match self {
            Self::NoAuth(_) | Self::Basic(_) | Self::Bearer(_) => true,
            Self::Iam(a) => a.can_authenticate(),
            Self::Cp4d(a) => a.can_authenticate(),
        }
    }

    /// Token lifecycle state, for token-issuing schemes.
    pub fn token_status(&self) -> Option<TokenStatus> {
        match self {
            Self::Iam(a) => Some(a.status()),
            Self::Cp4d(a) => Some(a.status()),
            _ => None,
        }
    }

    /// Wait until credentials can be attached.
    ///
    /// Resolves immediately for schemes that do not issue tokens.
    pub async fn ready(&self) -> Result<(), TokenError> {
        self.access_token().await.map(|_| ())
    }

    /// The token this authenticator attaches, waiting for issuance if needed.
    ///
    /// `None` for schemes that do not use a token.
    pub async fn access_token(&self) -> Result<Option<Token>, TokenError> {
        match self {
            Self::NoAuth(_) | Self::Basic(_) => Ok(None),
            Self::Bearer(a) => Ok(Some(Token::new(a.bearer_token().expose()))),
            Self::Iam(a) => a.ready().await.map(Some),
            Self::Cp4d(a) => a.ready().await.map(Some),
        }
    }

    /// Attach credentials to `connector`.
    pub fn authenticate<C: Connector + ?Sized>(&self, connector: &mut C) -> Result<(), AuthError> {
        match self.credential()? {
            Credential::None => {}
            Credential::Basic { username, password } => connector.with_basic_auth(username, password),
            Credential::Bearer(token) => connector.with_bearer_token(token.access_token.expose()),
        }
        Ok(())
    }

    /// Attach credentials to a `reqwest` request.
    pub fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, AuthError> {
        Ok(match self.credential()? {
            Credential::None => builder,
            Credential::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credential::Bearer(token) => builder.bearer_auth(token.access_token.expose()),
        })
    }

    fn credential(&self) -> Result<Credential<'_>, AuthError> {
        let unavailable = || AuthError::TokenUnavailable {
            auth_type: self.auth_type(),
        };

        Ok(match self {
            Self::NoAuth(_) => Credential::None,
            Self::Basic(a) => Credential::Basic {
                username: a.username(),
                password: a.password().expose(),
            },
            Self::Bearer(a) => Credential::Bearer(Token::new(a.bearer_token().expose())),
            Self::Iam(a) => Credential::Bearer(a.token().ok_or_else(unavailable)?),
            Self::Cp4d(a) => Credential::Bearer(a.token().ok_or_else(unavailable)?),
        })
    }
}

impl From<NoAuthAuthenticator> for Authenticator {
    fn from(a: NoAuthAuthenticator) -> Self {
        Self::NoAuth(a)
    }
}

impl From<BasicAuthenticator> for Authenticator {
    fn from(a: BasicAuthenticator) -> Self {
        Self::Basic(a)
    }
}

impl From<BearerTokenAuthenticator> for Authenticator {
    fn from(a: BearerTokenAuthenticator) -> Self {
        Self::Bearer(a)
    }
}

impl From<IamAuthenticator> for Authenticator {
    fn from(a: IamAuthenticator) -> Self {
        Self::Iam(a)
    }
}

impl From<CloudPakForDataAuthenticator> for Authenticator {
    fn from(a: CloudPakForDataAuthenticator) -> Self {
        Self::Cp4d(a)
    }
}
