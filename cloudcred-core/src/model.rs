//! Domain model types for cloudcred.
//!
//! This module defines the core types shared by the credential readers and
//! the authenticators:
//! - [`ServiceName`] - Namespacing prefix for a service's properties
//! - [`PropertyMap`] - Resolved key/value configuration for one service
//! - [`AuthType`] - The authentication scheme a service is configured for
//! - [`CredentialSource`] - Where a [`PropertyMap`] was read from
//! - [`props`] - Well-known property names

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Well-known property names, as they appear after the `<SERVICE>_` prefix
/// has been stripped.
pub mod props {
    pub const AUTH_TYPE: &str = "AUTH_TYPE";
    pub const USERNAME: &str = "USERNAME";
    pub const PASSWORD: &str = "PASSWORD";
    pub const BEARER_TOKEN: &str = "BEARER_TOKEN";
    pub const APIKEY: &str = "APIKEY";
    pub const CLIENT_ID: &str = "CLIENT_ID";
    pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
    /// Token service URL used by the IAM and CP4D authenticators.
    pub const AUTH_URL: &str = "AUTH_URL";
    pub const AUTH_DISABLE_SSL: &str = "AUTH_DISABLE_SSL";
    /// Service endpoint URL.
    pub const URL: &str = "URL";
    pub const DISABLE_SSL: &str = "DISABLE_SSL";

    /// Properties whose values must never be printed.
    pub const SECRET_KEYS: &[&str] = &[APIKEY, PASSWORD, BEARER_TOKEN, CLIENT_SECRET];

    /// Returns true if `key` names a secret-bearing property.
    pub fn is_secret(key: &str) -> bool {
        SECRET_KEYS.contains(&key)
    }
}

/// Identifier for a cloud service (e.g., "assistant", "text_to_speech").
///
/// The original spelling is kept because catalog entries are matched on
/// their `name` field case-sensitively. File and environment lookups use
/// the upper-cased [`prefix`](ServiceName::prefix).
///
/// # Examples
///
/// ```
/// use cloudcred_core::ServiceName;
///
/// let service = ServiceName::new("assistant");
/// assert_eq!(service.prefix(), "ASSISTANT_");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a new service name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the service name as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key prefix used by the credential file and environment readers.
    pub fn prefix(&self) -> String {
        format!("{}_", self.0.to_uppercase())
    }

    /// Strip this service's prefix from `key`, returning the property name.
    ///
    /// Returns `None` if the key belongs to another service or the
    /// remaining property name is empty.
    pub fn property_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix().as_str())
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Resolved configuration properties for a single service.
///
/// Keys are unique and values are never empty: an absent key means
/// "not configured". `Debug` output redacts secret-bearing values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<String, String>);

impl PropertyMap {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, skipping empty keys and values.
    ///
    /// Returns the previous value for the key, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || value.is_empty() {
            return None;
        }
        self.0.insert(key, value)
    }

    /// Builder-style variant of [`insert`](PropertyMap::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Look up a property and interpret it as a boolean flag.
    ///
    /// Only a case-insensitive `true` enables the flag.
    pub fn get_flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Property names in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Debug for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| {
                let shown = if props::is_secret(k) { "[REDACTED]" } else { v.as_str() };
                (k, shown)
            }))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Authentication scheme configured for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthType {
    NoAuth,
    Basic,
    BearerToken,
    Iam,
    Cp4d,
}

impl AuthType {
    /// The scheme's configuration value, as accepted in `AUTH_TYPE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAuth => "noAuth",
            Self::Basic => "basic",
            Self::BearerToken => "bearerToken",
            Self::Iam => "iam",
            Self::Cp4d => "cp4d",
        }
    }

    /// Determine the scheme from a property map.
    ///
    /// A missing `AUTH_TYPE` defaults to [`AuthType::Iam`].
    pub fn from_properties(properties: &PropertyMap) -> Result<Self, ConfigError> {
        match properties.get(props::AUTH_TYPE) {
            Some(value) => value.parse(),
            None => Ok(Self::Iam),
        }
    }
}

impl FromStr for AuthType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::NoAuth, Self::Basic, Self::BearerToken, Self::Iam, Self::Cp4d]
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownAuthType {
                auth_type: s.to_string(),
            })
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The source a [`PropertyMap`] was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A credential file at the given path.
    File(PathBuf),

    /// `<SERVICE>_<PROPERTY>` process environment variables.
    Environment,

    /// The service catalog environment variable.
    Catalog,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "credential file {}", path.display()),
            Self::Environment => write!(f, "environment"),
            Self::Catalog => write!(f, "service catalog"),
        }
    }
}
