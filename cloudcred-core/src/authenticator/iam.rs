//! IAM api-key authentication.
//!
//! The api key is exchanged for a short-lived access token at the IAM token
//! service. The exchange is a form-encoded POST:
//!
//! ```text
//! POST /identity/token
//! Accept: application/json
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=urn:ibm:params:oauth:grant-type:apikey&apikey=...&response_type=cloud_iam
//! ```

use async_trait::async_trait;
use url::Url;

use crate::error::{ConfigError, check_chars, require};
use crate::model::{PropertyMap, props};
use crate::secret::Secret;
use crate::token::{IamTokenResponse, Token, TokenError, now_millis};
use crate::token_manager::{TokenManager, TokenSource, TokenStatus};
use crate::transport::{ReqwestTransport, SharedTransport, TokenMethod, TokenRequest};

/// Default IAM token service endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const RESPONSE_TYPE: &str = "cloud_iam";

/// Builder for [`IamAuthenticator`].
#[derive(Default)]
pub struct IamAuthenticatorBuilder {
    apikey: Option<Secret>,
    url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<Secret>,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
    transport: Option<SharedTransport>,
}

impl IamAuthenticatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from `APIKEY`, `AUTH_URL`, `CLIENT_ID`,
    /// `CLIENT_SECRET` and `AUTH_DISABLE_SSL`.
    pub fn from_properties(properties: &PropertyMap) -> Self {
        Self {
            apikey: properties.get(props::APIKEY).map(Secret::from),
            url: properties.get(props::AUTH_URL).map(str::to_string),
            client_id: properties.get(props::CLIENT_ID).map(str::to_string),
            client_secret: properties.get(props::CLIENT_SECRET).map(Secret::from),
            disable_ssl_verification: properties.get_flag(props::AUTH_DISABLE_SSL),
            headers: Vec::new(),
            transport: None,
        }
    }

    pub fn apikey(mut self, apikey: impl Into<Secret>) -> Self {
        self.apikey = Some(apikey.into());
        self
    }

    /// Token service URL. Defaults to [`DEFAULT_IAM_URL`].
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<Secret>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    /// Extra header sent with every token request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and start the first token request.
    pub fn build(self) -> Result<IamAuthenticator, ConfigError> {
        let config = IamConfig {
            apikey: self.apikey.unwrap_or_default(),
            url: self.url.filter(|u| !u.is_empty()),
            client_id: self.client_id.filter(|c| !c.is_empty()),
            client_secret: self.client_secret.filter(|c| !c.is_empty()),
        };
        config.validate()?;

        let source = IamTokenSource {
            url: config.token_url()?,
            apikey: config.apikey.clone(),
            client: config
                .client_id
                .clone()
                .zip(config.client_secret.clone()),
            disable_ssl_verification: self.disable_ssl_verification,
            headers: self.headers,
            transport: self.transport.unwrap_or_else(ReqwestTransport::shared),
        };

        let authenticator = IamAuthenticator {
            config,
            manager: TokenManager::new(source),
        };
        let _ = authenticator.manager.poll();
        Ok(authenticator)
    }
}

#[derive(Debug, Clone)]
struct IamConfig {
    apikey: Secret,
    url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<Secret>,
}

impl IamConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require("apikey", Some(self.apikey.expose()))?;
        check_chars("url", self.url.as_deref())?;
        if self.client_id.is_some() != self.client_secret.is_some() {
            return Err(ConfigError::ClientCredentialsMismatch);
        }
        self.token_url().map(|_| ())
    }

    fn token_url(&self) -> Result<Url, ConfigError> {
        let url = self.url.as_deref().unwrap_or(DEFAULT_IAM_URL);
        Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            field: "url",
            message: e.to_string(),
        })
    }
}

/// Issues IAM tokens for an api key.
pub(crate) struct IamTokenSource {
    url: Url,
    apikey: Secret,
    client: Option<(String, Secret)>,
    disable_ssl_verification: bool,
    headers: Vec<(String, String)>,
    transport: SharedTransport,
}

impl IamTokenSource {
    fn request(&self) -> TokenRequest {
        let mut request = TokenRequest::new(TokenMethod::Post, self.url.clone())
            .header("Accept", "application/json")
            .form_param("grant_type", GRANT_TYPE)
            .form_param("apikey", self.apikey.clone())
            .form_param("response_type", RESPONSE_TYPE);

        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some((client_id, client_secret)) = &self.client {
            request = request.basic_auth(client_id.clone(), client_secret.clone());
        }
        request.disable_ssl_verification = self.disable_ssl_verification;
        request
    }
}

#[async_trait]
impl TokenSource for IamTokenSource {
    fn name(&self) -> &'static str {
        "IAM"
    }

    async fn request_token(&self) -> Result<Token, TokenError> {
        let body = self.transport.send(self.request()).await?.into_success_body()?;
        IamTokenResponse::parse(&body)?.into_token(now_millis() / 1000)
    }
}

/// Authenticates with an IAM api key.
#[derive(Debug)]
pub struct IamAuthenticator {
    config: IamConfig,
    manager: TokenManager<IamTokenSource>,
}

impl IamAuthenticator {
    /// Authenticator for `apikey` against the default token service.
    pub fn new(apikey: impl Into<Secret>) -> Result<Self, ConfigError> {
        IamAuthenticatorBuilder::new().apikey(apikey).build()
    }

    pub fn builder() -> IamAuthenticatorBuilder {
        IamAuthenticatorBuilder::new()
    }

    pub fn from_properties(properties: &PropertyMap) -> Result<Self, ConfigError> {
        IamAuthenticatorBuilder::from_properties(properties).build()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()
    }

    pub fn apikey(&self) -> &Secret {
        &self.config.apikey
    }

    /// The token service URL requests are sent to.
    pub fn url(&self) -> &Url {
        &self.manager.source().url
    }

    pub fn client_id(&self) -> Option<&str> {
        self.config.client_id.as_deref()
    }

    pub fn disable_ssl_verification(&self) -> bool {
        self.manager.source().disable_ssl_verification
    }

    /// Whether a valid token is held. Starts a request if not.
    pub fn can_authenticate(&self) -> bool {
        self.manager.poll().is_some()
    }

    /// The valid token, starting a request if there is none.
    pub fn token(&self) -> Option<Token> {
        self.manager.poll()
    }

    pub fn status(&self) -> TokenStatus {
        self.manager.status()
    }

    /// Error of the last token request, if it failed.
    pub fn last_error(&self) -> Option<TokenError> {
        self.manager.last_error()
    }

    /// Wait for a valid token.
    pub async fn ready(&self) -> Result<Token, TokenError> {
        self.manager.ready().await
    }
}
