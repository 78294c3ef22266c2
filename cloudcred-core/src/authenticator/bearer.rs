use crate::error::{ConfigError, require};
use crate::model::{PropertyMap, props};
use crate::secret::Secret;

/// Attaches a caller-managed bearer token.
///
/// The token is never refreshed here; callers replace it with
/// [`set_bearer_token`](BearerTokenAuthenticator::set_bearer_token).
#[derive(Debug, Clone)]
pub struct BearerTokenAuthenticator {
    bearer_token: Secret,
}

impl BearerTokenAuthenticator {
    pub fn new(bearer_token: impl Into<Secret>) -> Result<Self, ConfigError> {
        let authenticator = Self {
            bearer_token: bearer_token.into(),
        };
        authenticator.validate()?;
        Ok(authenticator)
    }

    /// Build from the `BEARER_TOKEN` property.
    pub fn from_properties(properties: &PropertyMap) -> Result<Self, ConfigError> {
        Self::new(properties.get(props::BEARER_TOKEN).unwrap_or_default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require("bearer_token", Some(self.bearer_token.expose()))
    }

    pub fn bearer_token(&self) -> &Secret {
        &self.bearer_token
    }

    /// Replace the token. The new value is validated before it is stored.
    pub fn set_bearer_token(&mut self, bearer_token: impl Into<Secret>) -> Result<(), ConfigError> {
        let bearer_token = bearer_token.into();
        require("bearer_token", Some(bearer_token.expose()))?;
        self.bearer_token = bearer_token;
        Ok(())
    }
}
