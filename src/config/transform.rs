//! Transform pipeline configuration.
//!
//! Controls which hosts source images may come from, which inbound headers
//! are forwarded to source fetches, and the safety limits applied to them.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_MAX_AGE_SECS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_FORWARD_HEADERS,
    DEFAULT_MAX_SOURCE_BYTES, DEFAULT_MAX_SOURCE_PIXELS,
};

fn default_forward_headers() -> Vec<String> {
    DEFAULT_FORWARD_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect()
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_max_source_bytes() -> usize {
    DEFAULT_MAX_SOURCE_BYTES
}

fn default_max_source_pixels() -> u64 {
    DEFAULT_MAX_SOURCE_PIXELS
}

fn default_cache_max_age() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Hostname suffixes source images may be fetched from (empty = any host)
    #[serde(default)]
    pub allow_list: Vec<String>,

    /// Inbound request headers copied onto every source fetch
    #[serde(default = "default_forward_headers")]
    pub forward_headers: Vec<String>,

    /// Fail the request on the first step that cannot be applied
    #[serde(default)]
    pub strict_pipeline: bool,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,

    /// Decoded width * height limit (image bomb protection)
    #[serde(default = "default_max_source_pixels")]
    pub max_source_pixels: u64,

    /// `max-age` advertised on successful transform responses
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            forward_headers: default_forward_headers(),
            strict_pipeline: false,
            fetch_timeout_secs: default_fetch_timeout(),
            max_source_bytes: default_max_source_bytes(),
            max_source_pixels: default_max_source_pixels(),
            cache_max_age_secs: default_cache_max_age(),
        }
    }
}

impl TransformConfig {
    /// Trim allow-list entries and drop blank ones. A blank suffix would
    /// match every host, and a list made only of blanks would turn into an
    /// empty (allow all) list, so that case is an error.
    pub fn normalize_allow_list(&mut self) -> Result<(), String> {
        let configured = self.allow_list.len();
        self.allow_list = self
            .allow_list
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();
        if configured > 0 && self.allow_list.is_empty() {
            return Err("transform.allow_list only contains empty hostnames".to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_timeout_secs == 0 {
            return Err("transform.fetch_timeout_secs must be greater than 0".to_string());
        }
        if self.max_source_bytes == 0 {
            return Err("transform.max_source_bytes must be greater than 0".to_string());
        }
        if self.max_source_pixels == 0 {
            return Err("transform.max_source_pixels must be greater than 0".to_string());
        }
        if self.allow_list.iter().any(|entry| entry.trim().is_empty()) {
            return Err("transform.allow_list contains an empty hostname".to_string());
        }
        if let Some(header) = self.forward_headers.iter().find(|h| h.trim().is_empty()) {
            return Err(format!(
                "transform.forward_headers contains an empty header name: '{}'",
                header
            ));
        }
        Ok(())
    }
}
