use crate::error::{ConfigError, check_chars};
use crate::model::{PropertyMap, props};
use crate::secret::Secret;

/// Username/password authentication.
#[derive(Debug, Clone)]
pub struct BasicAuthenticator {
    username: String,
    password: Secret,
}

impl BasicAuthenticator {
    /// Create and validate a basic authenticator.
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Result<Self, ConfigError> {
        let authenticator = Self {
            username: username.into(),
            password: password.into(),
        };
        authenticator.validate()?;
        Ok(authenticator)
    }

    /// Build from the `USERNAME` and `PASSWORD` properties.
    pub fn from_properties(properties: &PropertyMap) -> Result<Self, ConfigError> {
        Self::new(
            properties.get(props::USERNAME).unwrap_or_default(),
            properties.get(props::PASSWORD).unwrap_or_default(),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::MissingProperty { field: "username" });
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingProperty { field: "password" });
        }
        check_chars("username", Some(&self.username))?;
        check_chars("password", Some(self.password.expose()))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }
}
