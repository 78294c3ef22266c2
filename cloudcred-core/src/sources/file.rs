//! Credential file source.
//!
//! A credential file holds one `<SERVICE>_<PROPERTY>=<value>` pair per line.
//! Blank lines and lines starting with `#` are ignored, and each line is
//! split on its first `=` only so values may themselves contain `=`.

use std::path::{Path, PathBuf};

use crate::model::{PropertyMap, ServiceName};

/// Default credential file name looked up in each search directory.
pub const DEFAULT_CREDENTIAL_FILE_NAME: &str = "ibm-credentials.env";

/// Return the first path in `candidates` that exists as a file.
pub fn first_existing_file(candidates: &[PathBuf]) -> Option<&Path> {
    candidates
        .iter()
        .map(PathBuf::as_path)
        .find(|path| path.is_file())
}

/// Read the properties for `service` from the credential file at `path`.
///
/// An unreadable file is logged and yields an empty map.
pub fn read_file_properties(service: &ServiceName, path: &Path) -> PropertyMap {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_credential_lines(service, &contents),
        Err(e) => {
            tracing::warn!(
                "Failed to read credential file {}: {}",
                path.display(),
                e
            );
            PropertyMap::new()
        }
    }
}

/// Parse credential file contents, keeping only `service`'s properties.
///
/// When a key repeats, the last occurrence wins.
pub fn parse_credential_lines(service: &ServiceName, contents: &str) -> PropertyMap {
    let mut props = PropertyMap::new();

    for line in contents.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        if let Some(name) = service.property_key(key) {
            props.insert(name, value);
        }
    }

    props
}
