use async_trait::async_trait;
use url::Url;

use crate::error::{ConfigError, check_chars};
use crate::model::{PropertyMap, props};
use crate::secret::Secret;
use crate::token::{Cp4dTokenResponse, Token, TokenError};
use crate::token_manager::{TokenManager, TokenSource, TokenStatus};
use crate::transport::{ReqwestTransport, SharedTransport, TokenMethod, TokenRequest};

/// Path appended to the configured URL for the token exchange.
pub const CP4D_URL_SUFFIX: &str = "/v1/preauth/validateAuth";

/// Builder for [`CloudPakForDataAuthenticator`].
#[derive(Default)]
pub struct CloudPakForDataAuthenticatorBuilder {
    url: Option<String>,
    username: Option<String>,
    password: Option<Secret>,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
    transport: Option<SharedTransport>,
}

impl CloudPakForDataAuthenticatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from `AUTH_URL` (or `URL` when absent), `USERNAME`,
    /// `PASSWORD` and `AUTH_DISABLE_SSL`.
    pub fn from_properties(properties: &PropertyMap) -> Self {
        let url = properties
            .get(props::AUTH_URL)
            .or_else(|| properties.get(props::URL));

        Self {
            url: url.map(str::to_string),
            username: properties.get(props::USERNAME).map(str::to_string),
            password: properties.get(props::PASSWORD).map(Secret::from),
            disable_ssl_verification: properties.get_flag(props::AUTH_DISABLE_SSL),
            headers: Vec::new(),
            transport: None,
        }
    }

    /// Base URL of the Cloud Pak for Data cluster.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and start the first token request.
    pub fn build(self) -> Result<CloudPakForDataAuthenticator, ConfigError> {
        let config = Cp4dConfig {
            url: self.url.unwrap_or_default(),
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        };
        config.validate()?;

        let source = Cp4dTokenSource {
            url: config.token_url()?,
            username: config.username.clone(),
            password: config.password.clone(),
            disable_ssl_verification: self.disable_ssl_verification,
            headers: self.headers,
            transport: self.transport.unwrap_or_else(ReqwestTransport::shared),
        };

        let authenticator = CloudPakForDataAuthenticator {
            config,
            manager: TokenManager::new(source),
        };
        let _ = authenticator.manager.poll();
        Ok(authenticator)
    }
}

#[derive(Debug, Clone)]
struct Cp4dConfig {
    url: String,
    username: String,
    password: Secret,
}

impl Cp4dConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingProperty { field: "url" });
        }
        if self.username.is_empty() {
            return Err(ConfigError::MissingProperty { field: "username" });
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingProperty { field: "password" });
        }
        check_chars("url", Some(&self.url))?;
        check_chars("username", Some(&self.username))?;
        check_chars("password", Some(self.password.expose()))?;
        self.token_url().map(|_| ())
    }

    fn token_url(&self) -> Result<Url, ConfigError> {
        let url = format!("{}{}", self.url.trim_end_matches('/'), CP4D_URL_SUFFIX);
        Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
            field: "url",
            message: e.to_string(),
        })
    }
}

pub(crate) struct Cp4dTokenSource {
    url: Url,
    username: String,
    password: Secret,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
    transport: SharedTransport,
}

#[async_trait]
impl TokenSource for Cp4dTokenSource {
    fn name(&self) -> &'static str {
        "CP4D"
    }

    async fn request_token(&self) -> Result<Token, TokenError> {
        let mut request = TokenRequest::new(TokenMethod::Get, self.url.clone())
            .basic_auth(self.username.clone(), self.password.clone());
        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }
        request.disable_ssl_verification = self.disable_ssl_verification;

        let body = self.transport.send(request).await?.into_success_body()?;
        Cp4dTokenResponse::parse(&body)?.into_token()
    }
}

/// Authenticates against a Cloud Pak for Data cluster with a username and
/// password exchanged for a JWT.
#[derive(Debug)]
pub struct CloudPakForDataAuthenticator {
    config: Cp4dConfig,
    manager: TokenManager<Cp4dTokenSource>,
}

impl CloudPakForDataAuthenticator {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<Secret>,
    ) -> Result<Self, ConfigError> {
        CloudPakForDataAuthenticatorBuilder::new()
            .url(url)
            .username(username)
            .password(password)
            .build()
    }

    pub fn builder() -> CloudPakForDataAuthenticatorBuilder {
        CloudPakForDataAuthenticatorBuilder::new()
    }

    pub fn from_properties(properties: &PropertyMap) -> Result<Self, ConfigError> {
        CloudPakForDataAuthenticatorBuilder::from_properties(properties).build()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// The full token exchange URL, suffix included.
    pub fn token_url(&self) -> &Url {
        &self.manager.source().url
    }

    pub fn can_authenticate(&self) -> bool {
        self.manager.poll().is_some()
    }

    pub fn token(&self) -> Option<Token> {
        self.manager.poll()
    }

    pub fn status(&self) -> TokenStatus {
        self.manager.status()
    }

    pub fn last_error(&self) -> Option<TokenError> {
        self.manager.last_error()
    }

    pub async fn ready(&self) -> Result<Token, TokenError> {
        self.manager.ready().await
    }
}
