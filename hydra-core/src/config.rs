use serde::Deserialize;
use std::path::Path;

use crate::error::ClientError;

/// Client-wide settings.
///
/// ```toml
/// warm_up_on_first_use = false
/// page_limit = 50
///
/// [collections]
/// execution_cache = true
/// auto_hydrate = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Run the cache warm-up on the first lookup instead of waiting for an
    /// explicit call.
    pub warm_up_on_first_use: bool,
    /// Maximum number of pages a single collection may fetch.
    pub page_limit: Option<usize>,
    pub collections: CollectionDefaults,
}

/// Collection options handed out by [`Client::collection_options`](crate::Client::collection_options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionDefaults {
    pub execution_cache: bool,
    pub auto_hydrate: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            warm_up_on_first_use: true,
            page_limit: None,
            collections: CollectionDefaults::default(),
        }
    }
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        CollectionDefaults {
            execution_cache: true,
            auto_hydrate: true,
        }
    }
}

impl ClientConfig {
    pub fn from_toml(content: &str) -> Result<Self, ClientError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
