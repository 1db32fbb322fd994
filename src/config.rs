use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path, time::Duration};

use crate::error::FacetError;

/// Tunables for the dashboard controllers.
///
/// ```toml
/// search_debounce_ms = 500
/// scroll_threshold = 700.0
/// website_search_param = "website_search"
/// topic_search_param = "tags_search"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FacetConfig {
    /// Quiet period before a facet search is sent.
    pub search_debounce_ms: u64,
    /// Distance from the bottom of the document at which the next result page is requested.
    pub scroll_threshold: f64,
    pub website_search_param: String,
    pub topic_search_param: String,
}

impl Default for FacetConfig {
    fn default() -> Self {
        FacetConfig {
            search_debounce_ms: 500,
            scroll_threshold: 700.0,
            website_search_param: "website_search".to_string(),
            topic_search_param: "tags_search".to_string(),
        }
    }
}

impl FacetConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, FacetError> {
        let config: FacetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to the defaults when the file does not exist.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FacetError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read facet config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(FacetConfig::default());
        }
        let content = read_to_string(path)?;
        FacetConfig::from_toml_str(&content)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    fn validate(&self) -> Result<(), FacetError> {
        if !self.scroll_threshold.is_finite() || self.scroll_threshold < 0.0 {
            return Err(FacetError::Config(format!(
                "scroll_threshold must be a non-negative number, got {}",
                self.scroll_threshold
            )));
        }
        if self.website_search_param.is_empty() || self.topic_search_param.is_empty() {
            return Err(FacetError::Config(
                "search parameter names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
