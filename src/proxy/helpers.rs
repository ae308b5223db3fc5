//! Proxy utility functions.
//!
//! This module contains helper functions for request processing:
//! - Header extraction from Pingora requests
//! - Query string parsing
//! - Response cache key construction

use std::collections::HashMap;

use pingora_http::RequestHeader;

/// Extract headers from Pingora RequestHeader into HashMap.
///
/// Header names come out lowercase. Headers with non-UTF8 values are skipped.
pub fn extract_headers(req: &RequestHeader) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (name, value) in req.headers.iter() {
        if let Ok(value_str) = value.to_str() {
            headers.insert(name.to_string(), value_str.to_string());
        }
    }
    headers
}

/// Extract query parameters from the request URI.
pub fn extract_query_params(req: &RequestHeader) -> HashMap<String, String> {
    req.uri.query().map(parse_query).unwrap_or_default()
}

/// Parse a raw query string into key-value pairs.
///
/// Keys and values are URL-decoded, `+` counts as a space. A key without `=`
/// maps to an empty value. When a key repeats, the first occurrence wins.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_insert_with(|| decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Response cache key: path plus the raw query string
pub fn cache_key(req: &RequestHeader) -> String {
    match req.uri.query() {
        Some(query) => format!("{}?{}", req.uri.path(), query),
        None => req.uri.path().to_string(),
    }
}

/// Extend a cache key with the values of the forwarded headers present on
/// the request, in configured order. Requests fetched under different
/// credentials never share an entry.
pub fn vary_cache_key(base: &str, headers: &HashMap<String, String>, forward: &[String]) -> String {
    let mut key = base.to_string();
    for name in forward {
        let wanted = name.to_lowercase();
        if let Some((_, value)) = headers.iter().find(|(k, _)| k.to_lowercase() == wanted) {
            key.push('\n');
            key.push_str(&wanted);
            key.push_str(": ");
            key.push_str(value);
        }
    }
    key
}
