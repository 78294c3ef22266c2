//! Transport seam for token service calls.
//!
//! Authenticators describe their token call as a [`TokenRequest`] and hand
//! it to a [`TokenTransport`]. [`ReqwestTransport`] is the default; tests
//! and embedders can substitute their own implementation.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::secret::Secret;
use crate::token::TokenError;

/// HTTP method of a token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMethod {
    Get,
    Post,
}

/// A token service call.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub method: TokenMethod,
    pub url: Url,

    /// Non-secret headers, sent verbatim.
    pub headers: Vec<(String, String)>,

    /// Credentials sent as `Authorization: Basic ...`.
    pub basic_auth: Option<(String, Secret)>,

    /// Form-encoded body parameters.
    pub form: Vec<(String, Secret)>,

    /// Skip TLS certificate verification for this call.
    pub disable_ssl_verification: bool,
}

impl TokenRequest {
    pub fn new(method: TokenMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            basic_auth: None,
            form: Vec::new(),
            disable_ssl_verification: false,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Secret) -> Self {
        self.basic_auth = Some((username.into(), password));
        self
    }

    pub fn form_param(mut self, name: impl Into<String>, value: impl Into<Secret>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }
}

/// A raw token service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub status: u16,
    pub body: String,
}

impl TokenResponse {
    /// Return the body of a 2xx response, or a [`TokenError::Status`].
    pub fn into_success_body(self) -> Result<String, TokenError> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            Err(TokenError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Sends token requests.
#[async_trait]
pub trait TokenTransport: Send + Sync {
    /// Send the request and return the status and body.
    ///
    /// Only failures to obtain a response are errors; non-2xx statuses are
    /// returned as responses.
    async fn send(&self, request: TokenRequest) -> Result<TokenResponse, TokenError>;
}

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn TokenTransport>;

/// [`TokenTransport`] backed by `reqwest`.
///
/// Holds a verifying client and a second client that accepts invalid
/// certificates for requests with `disable_ssl_verification` set.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TokenError> {
        let insecure_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| TokenError::Transport {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            insecure_client,
        })
    }

    /// Shared default transport.
    ///
    /// Falls back to a transport that reports every request as failed if the
    /// HTTP client cannot be built.
    pub fn shared() -> SharedTransport {
        match Self::new() {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                tracing::error!("Failed to create HTTP transport: {}", e);
                Arc::new(UnavailableTransport { error: e })
            }
        }
    }
}

#[async_trait]
impl TokenTransport for ReqwestTransport {
    async fn send(&self, request: TokenRequest) -> Result<TokenResponse, TokenError> {
        let client = if request.disable_ssl_verification {
            &self.insecure_client
        } else {
            &self.client
        };

        let mut builder = match request.method {
            TokenMethod::Get => client.get(request.url.clone()),
            TokenMethod::Post => client.post(request.url.clone()),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username, Some(password.expose()));
        }

        if !request.form.is_empty() {
            let form: Vec<(&str, &str)> = request
                .form
                .iter()
                .map(|(name, value)| (name.as_str(), value.expose()))
                .collect();
            builder = builder.form(&form);
        }

        tracing::debug!("Requesting token from {}", request.url);

        let response = builder.send().await.map_err(|e| TokenError::Transport {
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TokenError::Transport {
            message: format!("failed to read response body: {}", e),
        })?;

        Ok(TokenResponse { status, body })
    }
}

#[derive(Debug)]
struct UnavailableTransport {
    error: TokenError,
}

#[async_trait]
impl TokenTransport for UnavailableTransport {
    async fn send(&self, _request: TokenRequest) -> Result<TokenResponse, TokenError> {
        Err(self.error.clone())
    }
}
