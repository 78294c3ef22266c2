//! Service catalog (`VCAP_SERVICES`-style) credential source.
//!
//! The catalog is a JSON object mapping a category name to a list of
//! provisioned service entries:
//!
//! ```json
//! {
//!   "assistant": [
//!     { "name": "my-assistant", "label": "assistant", "plan": "lite",
//!       "credentials": { "apikey": "...", "url": "https://..." } }
//!   ]
//! }
//! ```
//!
//! An entry is selected by its `name` first, then by treating the service
//! name as a category key.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{PropertyMap, ServiceName, props};

/// Default name of the catalog environment variable.
pub const DEFAULT_CATALOG_VARIABLE: &str = "VCAP_SERVICES";

/// A single provisioned service in the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub plan: Option<String>,

    #[serde(default)]
    pub credentials: Option<CatalogCredentials>,
}

/// The credential bundle nested in a [`CatalogEntry`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogCredentials {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Dedicated api key field. Takes precedence over the legacy fields.
    #[serde(default)]
    pub apikey: Option<String>,

    /// Legacy api key field.
    #[serde(default)]
    pub iam_apikey: Option<String>,

    /// Legacy api key field.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl CatalogEntry {
    /// Convert this entry's credentials into a property map.
    ///
    /// `AUTH_TYPE` is inferred: `iam` when an api key is present, otherwise
    /// `basic` when a username or password is present.
    pub fn to_properties(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        let Some(creds) = &self.credentials else {
            return map;
        };

        let fields = [
            (props::USERNAME, &creds.username),
            (props::PASSWORD, &creds.password),
            (props::URL, &creds.url),
            (props::APIKEY, &creds.api_key),
            (props::APIKEY, &creds.iam_apikey),
            (props::APIKEY, &creds.apikey),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                map.insert(key, value.as_str());
            }
        }

        if map.contains_key(props::APIKEY) {
            map.insert(props::AUTH_TYPE, "iam");
        } else if map.contains_key(props::USERNAME) || map.contains_key(props::PASSWORD) {
            map.insert(props::AUTH_TYPE, "basic");
        }

        map
    }
}

/// A parsed service catalog, preserving category order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<(String, Vec<CatalogEntry>)>,
}

impl Catalog {
    /// Parse a catalog document.
    ///
    /// A category whose value is not a list of entries is skipped.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let root: serde_json::Map<String, Value> = serde_json::from_str(json)?;

        let categories = root
            .into_iter()
            .filter_map(|(category, value)| {
                if value.is_null() {
                    return Some((category, Vec::new()));
                }
                match serde_json::from_value::<Vec<CatalogEntry>>(value) {
                    Ok(entries) => Some((category, entries)),
                    Err(e) => {
                        tracing::warn!("Skipping malformed catalog category {}: {}", category, e);
                        None
                    }
                }
            })
            .collect();

        Ok(Self { categories })
    }

    /// Find the entry for `service`.
    ///
    /// Entries whose `name` equals the service name (case-sensitively) win,
    /// scanning categories and entries in document order. Otherwise the
    /// first entry of the category keyed by the service name is used.
    pub fn find(&self, service: &ServiceName) -> Option<&CatalogEntry> {
        let wanted = service.as_str();

        self.categories
            .iter()
            .flat_map(|(_, entries)| entries.iter())
            .find(|entry| entry.name.as_deref() == Some(wanted))
            .or_else(|| {
                self.categories
                    .iter()
                    .find(|(category, _)| category == wanted)
                    .and_then(|(_, entries)| entries.first())
            })
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Read the properties for `service` from a catalog document.
///
/// A missing or malformed document yields an empty map.
pub fn read_catalog_properties(service: &ServiceName, document: Option<&str>) -> PropertyMap {
    let Some(document) = document.filter(|d| !d.trim().is_empty()) else {
        return PropertyMap::new();
    };

    let catalog = match Catalog::parse(document) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!("Failed to parse service catalog: {}", e);
            return PropertyMap::new();
        }
    };

    catalog
        .find(service)
        .map(CatalogEntry::to_properties)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: Option<&str>, apikey: &str) -> Value {
        let mut value = json!({ "credentials": { "apikey": apikey } });
        if let Some(name) = name {
            value["name"] = json!(name);
        }
        value
    }

    fn props_for(service: &str, catalog: &Value) -> PropertyMap {
        read_catalog_properties(&ServiceName::new(service), Some(&catalog.to_string()))
    }

    #[test]
    fn test_category_key_fallback() {
        let catalog = json!({
            "assistant": [entry(None, "bogus-apikey")],
            "equals_sign_test": [entry(Some("equals_sign_test"), "V4HX=KotN")],
        });

        assert_eq!(props_for("assistant", &catalog).get(props::APIKEY), Some("bogus-apikey"));
        assert_eq!(props_for("equals_sign_test", &catalog).get(props::APIKEY), Some("V4HX=KotN"));
    }

    #[test]
    fn test_inner_entry_matched_by_name() {
        let catalog = json!({
            "assistant": [
                entry(Some("assistant1"), "fakeapikey"),
                entry(Some("assistant2"), "fakeapikey2"),
                entry(Some("assistant3"), "fakeapikey3"),
            ],
        });
        assert_eq!(props_for("assistant2", &catalog).get(props::APIKEY), Some("fakeapikey2"));
    }

    #[test]
    fn test_name_match_preferred_over_category_key() {
        let catalog = json!({
            "assistant": [
                entry(Some("assistantV1"), "assistantV1apikey"),
                entry(Some("assistantV1Copy"), "assistantV1apikeyCopy"),
            ],
            "assistantV1": [
                entry(Some("assistantV2"), "assistantV2apikey"),
                entry(Some("assistantV2Copy"), "assistantV2apikeyCopy"),
            ],
        });
        assert_eq!(
            props_for("assistantV1", &catalog).get(props::APIKEY),
            Some("assistantV1apikey")
        );
    }

    #[test]
    fn test_category_fallback_takes_first_entry() {
        let catalog = json!({
            "no_matching_name": [
                entry(Some("assistantV1"), "assistantV1apikey"),
                entry(Some("assistantV1Copy"), "assistantV1apikeyCopy"),
            ],
            "assistant": [entry(Some("assistantV2"), "assistantV2apikey")],
        });
        assert_eq!(
            props_for("no_matching_name", &catalog).get(props::APIKEY),
            Some("assistantV1apikey")
        );
    }

    #[test]
    fn test_name_match_is_case_sensitive() {
        let catalog = json!({ "other": [entry(Some("Assistant"), "key")] });
        assert!(props_for("assistant", &catalog).is_empty());
    }

    #[test]
    fn test_entry_not_found() {
        let catalog = json!({ "assistant": [entry(Some("assistantV1"), "key")] });
        assert!(props_for("fake_service", &catalog).is_empty());
    }

    #[test]
    fn test_dedicated_apikey_wins_over_legacy() {
        let catalog = json!({
            "assistant": [{
                "credentials": { "iam_apikey": "legacy", "apikey": "dedicated" }
            }],
        });
        let props = props_for("assistant", &catalog);
        assert_eq!(props.get(props::APIKEY), Some("dedicated"));
        assert_eq!(props.get(props::AUTH_TYPE), Some("iam"));
    }

    #[test]
    fn test_legacy_apikey_used_alone() {
        let catalog = json!({ "assistant": [{ "credentials": { "api_key": "legacy" } }] });
        assert_eq!(props_for("assistant", &catalog).get(props::APIKEY), Some("legacy"));
    }

    #[test]
    fn test_both_legacy_apikeys_present() {
        let catalog = json!({
            "assistant": [{ "credentials": { "api_key": "older", "iam_apikey": "legacy" } }]
        });
        assert_eq!(props_for("assistant", &catalog).get(props::APIKEY), Some("legacy"));
    }

    #[test]
    fn test_basic_auth_type_inferred() {
        let catalog = json!({
            "discovery": [{
                "credentials": {
                    "username": "user",
                    "password": "pass",
                    "url": "https://example.com/api"
                }
            }],
        });
        let props = props_for("discovery", &catalog);
        assert_eq!(props.get(props::AUTH_TYPE), Some("basic"));
        assert_eq!(props.get(props::USERNAME), Some("user"));
        assert_eq!(props.get(props::URL), Some("https://example.com/api"));
    }

    #[test]
    fn test_no_credentials_infers_nothing() {
        let catalog = json!({ "assistant": [{ "name": "assistant", "plan": "lite" }] });
        assert!(props_for("assistant", &catalog).is_empty());
    }

    #[test]
    fn test_malformed_document_yields_empty_map() {
        let service = ServiceName::new("assistant");
        assert!(read_catalog_properties(&service, Some("not json")).is_empty());
        assert!(read_catalog_properties(&service, Some("")).is_empty());
        assert!(read_catalog_properties(&service, None).is_empty());
    }

    #[test]
    fn test_category_order_preserved() {
        let document = r#"{
            "zeta": [{ "name": "shared", "credentials": { "apikey": "from-zeta" } }],
            "alpha": [{ "name": "shared", "credentials": { "apikey": "from-alpha" } }]
        }"#;
        let props = read_catalog_properties(&ServiceName::new("shared"), Some(document));
        assert_eq!(props.get(props::APIKEY), Some("from-zeta"));
    }
}
