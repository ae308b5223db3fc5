//! Source host allow-list
//!
//! Guards every remote fetch (primary and secondary images) so the service
//! cannot be used to pull from arbitrary hosts. Entries are hostname
//! suffixes: `example.com` admits `example.com` and `cdn.example.com`.

use reqwest::Url;

/// Hostname suffix allow-list; an empty list admits every host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    suffixes: Vec<String>,
}

impl AllowList {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    /// Allow-list that admits every host
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Check a parsed URL's hostname against the configured suffixes.
    ///
    /// Matching is a case-sensitive `ends_with`. URLs without a host (e.g.
    /// `data:`) are only admitted by an empty list.
    pub fn is_allowed(&self, url: &Url) -> bool {
        if self.suffixes.is_empty() {
            return true;
        }

        let host = match url.host_str() {
            Some(host) => host,
            None => return false,
        };

        self.suffixes.iter().any(|suffix| host.ends_with(suffix.as_str()))
    }
}
