//! Credential resolution across the file, environment and catalog sources.
//!
//! Sources are consulted in a strict waterfall:
//! 1. The first existing credential file in the search list
//! 2. `<SERVICE>_<PROPERTY>` environment variables
//! 3. The service catalog variable
//!
//! The first source that yields any property wins; lower-precedence sources
//! are not consulted and nothing is merged.
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudcred_core::CredentialResolver;
//!
//! let resolver = CredentialResolver::from_env();
//! let props = resolver.resolve("assistant");
//! if let Some(apikey) = props.get("APIKEY") {
//!     println!("found an api key ({} chars)", apikey.len());
//! }
//! ```

use std::path::PathBuf;

use crate::authenticator::Authenticator;
use crate::error::ConfigError;
use crate::model::{CredentialSource, PropertyMap, ServiceName};
use crate::sources::catalog::DEFAULT_CATALOG_VARIABLE;
use crate::sources::file::DEFAULT_CREDENTIAL_FILE_NAME;
use crate::sources::{
    EnvSnapshot, first_existing_file, read_catalog_properties, read_env_properties,
    read_file_properties,
};

/// Environment variable naming an explicit credential file.
pub const CREDENTIALS_FILE_VARIABLE: &str = "IBM_CREDENTIALS_FILE";

/// Properties resolved for a service together with where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub source: CredentialSource,
    pub properties: PropertyMap,
}

/// Resolves per-service properties from explicit inputs.
///
/// The credential file search list and the environment are held by value so
/// resolution never reads ambient global state after construction.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    search_paths: Vec<PathBuf>,
    env: EnvSnapshot,
    catalog_variable: String,
}

impl CredentialResolver {
    /// Create a resolver over an explicit search list and environment.
    pub fn new(search_paths: Vec<PathBuf>, env: EnvSnapshot) -> Self {
        Self {
            search_paths,
            env,
            catalog_variable: DEFAULT_CATALOG_VARIABLE.to_string(),
        }
    }

    /// Create a resolver from the current process environment.
    ///
    /// Uses [`default_search_paths`] with the current working directory.
    pub fn from_env() -> Self {
        let env = EnvSnapshot::capture();
        let cwd = std::env::current_dir().ok();
        let search_paths = default_search_paths(&env, cwd);
        Self::new(search_paths, env)
    }

    /// Use a different catalog variable name.
    pub fn with_catalog_variable(mut self, name: impl Into<String>) -> Self {
        self.catalog_variable = name.into();
        self
    }

    /// Put extra credential files ahead of the current search list.
    pub fn with_priority_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut search_paths: Vec<PathBuf> = paths.into_iter().collect();
        search_paths.append(&mut self.search_paths);
        self.search_paths = search_paths;
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn catalog_variable(&self) -> &str {
        &self.catalog_variable
    }

    /// Resolve the properties for `service`.
    ///
    /// Returns an empty map when no source knows the service.
    pub fn resolve(&self, service: impl Into<ServiceName>) -> PropertyMap {
        self.resolve_with_source(service)
            .map(|resolved| resolved.properties)
            .unwrap_or_default()
    }

    /// Resolve the properties for `service` and report which source they
    /// came from.
    pub fn resolve_with_source(&self, service: impl Into<ServiceName>) -> Option<ResolvedCredentials> {
        let service = service.into();

        if let Some(path) = first_existing_file(&self.search_paths) {
            let properties = read_file_properties(&service, path);
            if !properties.is_empty() {
                tracing::debug!(
                    "Resolved {} properties for {} from {}",
                    properties.len(),
                    service,
                    path.display()
                );
                return Some(ResolvedCredentials {
                    source: CredentialSource::File(path.to_path_buf()),
                    properties,
                });
            }
        }

        let properties = read_env_properties(&service, &self.env);
        if !properties.is_empty() {
            tracing::debug!(
                "Resolved {} properties for {} from the environment",
                properties.len(),
                service
            );
            return Some(ResolvedCredentials {
                source: CredentialSource::Environment,
                properties,
            });
        }

        let properties =
            read_catalog_properties(&service, self.env.get(&self.catalog_variable));
        if !properties.is_empty() {
            tracing::debug!(
                "Resolved {} properties for {} from {}",
                properties.len(),
                service,
                self.catalog_variable
            );
            return Some(ResolvedCredentials {
                source: CredentialSource::Catalog,
                properties,
            });
        }

        tracing::debug!("No credentials found for {}", service);
        None
    }

    /// Resolve `service` and build its authenticator.
    ///
    /// An unknown service resolves to an empty map, which fails validation
    /// for the default `iam` scheme's missing api key.
    pub fn authenticator(&self, service: impl Into<ServiceName>) -> Result<Authenticator, ConfigError> {
        Authenticator::from_properties(&self.resolve(service))
    }
}

/// Build the default credential file search list.
///
/// In order: the file named by `IBM_CREDENTIALS_FILE`, then
/// `ibm-credentials.env` in the working directory, `$HOME`,
/// `$HOMEDRIVE$HOMEPATH`, and `$USERPROFILE`.
pub fn default_search_paths(env: &EnvSnapshot, cwd: Option<PathBuf>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env.get(CREDENTIALS_FILE_VARIABLE) {
        paths.push(PathBuf::from(explicit));
    }

    let windows_home = match (env.get("HOMEDRIVE"), env.get("HOMEPATH")) {
        (Some(drive), Some(path)) => Some(format!("{}{}", drive, path)),
        (Some(drive), None) => Some(drive.to_string()),
        (None, Some(path)) => Some(path.to_string()),
        (None, None) => None,
    };

    let dirs = [
        cwd,
        env.get("HOME").map(PathBuf::from),
        windows_home.map(PathBuf::from),
        env.get("USERPROFILE").map(PathBuf::from),
    ];
    paths.extend(
        dirs.into_iter()
            .flatten()
            .map(|dir| dir.join(DEFAULT_CREDENTIAL_FILE_NAME)),
    );

    paths
}
