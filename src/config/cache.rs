//! Response cache configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_MAX_ITEM_BYTES, DEFAULT_TTL_SECONDS};

fn default_enabled() -> bool {
    true
}

fn default_max_entries() -> u64 {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_max_item_bytes() -> usize {
    DEFAULT_MAX_ITEM_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Responses larger than this are served but never cached
    #[serde(default = "default_max_item_bytes")]
    pub max_item_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl_seconds(),
            max_item_bytes: default_max_item_bytes(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_entries == 0 {
            return Err("cache.max_entries must be greater than 0".to_string());
        }
        if self.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be greater than 0".to_string());
        }
        Ok(())
    }
}
