//! Raw credential sources.
//!
//! Each reader returns the properties it finds for one service, or an empty
//! [`PropertyMap`](crate::PropertyMap) when its source is absent or
//! unreadable. Readers never fail.
//!
//! - [`file`] - `KEY=VALUE` credential files
//! - [`env`] - `<SERVICE>_<PROPERTY>` environment variables
//! - [`catalog`] - the structured service catalog variable

pub mod catalog;
pub mod env;
pub mod file;

pub use catalog::{CatalogCredentials, CatalogEntry, read_catalog_properties};
pub use env::{EnvSnapshot, read_env_properties};
pub use file::{first_existing_file, parse_credential_lines, read_file_properties};
