// Request pipeline module - per-request context carried through the proxy hooks

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request context that holds everything the proxy hooks learn about a
/// request, from `request_filter` through `logging`
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    headers: HashMap<String, String>,
    query_params: HashMap<String, String>,
    started: Instant,
    cache_hit: bool,
}

impl RequestContext {
    /// Create a new RequestContext with a fresh request ID (UUID v4)
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            started: Instant::now(),
            cache_hit: false,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Fill in request details once the request header is available
    pub fn set_request(
        &mut self,
        method: String,
        path: String,
        headers: HashMap<String, String>,
        query_params: HashMap<String, String>,
    ) {
        self.method = method;
        self.path = path;
        self.headers = headers;
        self.query_params = query_params;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn mark_cache_hit(&mut self) {
        self.cache_hit = true;
    }

    pub fn cache_hit(&self) -> bool {
        self.cache_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_uuids() {
        let a = RequestContext::new("GET".to_string(), "/".to_string());
        let b = RequestContext::new("GET".to_string(), "/".to_string());
        assert_ne!(a.request_id(), b.request_id());
        assert!(Uuid::parse_str(a.request_id()).is_ok());
    }

    #[test]
    fn test_set_request_replaces_placeholders() {
        let mut ctx = RequestContext::new("GET".to_string(), "/".to_string());
        let mut query = HashMap::new();
        query.insert("url".to_string(), "https://a.example.com/x.png".to_string());

        ctx.set_request(
            "OPTIONS".to_string(),
            "/api/transform".to_string(),
            HashMap::new(),
            query,
        );

        assert_eq!(ctx.method(), "OPTIONS");
        assert_eq!(ctx.path(), "/api/transform");
        assert_eq!(ctx.query_params().len(), 1);
        assert!(!ctx.cache_hit());
    }
}
