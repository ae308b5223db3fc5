//! Built-in endpoints and request routing.
//!
//! This module provides:
//! - `route` - maps method + path to a `Route`
//! - `/health` - Health check endpoint
//! - `/metrics` - Prometheus metrics export
//! - `/openapi.json`, `/docs` - OpenAPI document for the transform endpoint
//!
//! Functions return `EndpointResponse` instead of writing directly to the
//! session, which keeps them testable. The caller writes the response.

use bytes::Bytes;
use std::time::Instant;

use crate::constants::{API_PREFIX, EXAMPLE_SOURCE_URL, TRANSFORM_PATH};
use crate::transform::EndpointResponse;

/// Where a request is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Transform,
    Preflight,
    Health,
    Metrics,
    OpenApi,
    MethodNotAllowed,
    NotFound,
}

impl Route {
    /// Label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Transform => "transform",
            Route::Preflight => "preflight",
            Route::Health => "health",
            Route::Metrics => "metrics",
            Route::OpenApi => "openapi",
            Route::MethodNotAllowed => "method_not_allowed",
            Route::NotFound => "not_found",
        }
    }
}

pub fn route(method: &str, path: &str) -> Route {
    if method == "OPTIONS" && path.starts_with(API_PREFIX) {
        return Route::Preflight;
    }
    if path == TRANSFORM_PATH {
        return if method == "GET" {
            Route::Transform
        } else {
            Route::MethodNotAllowed
        };
    }
    if method != "GET" {
        return Route::NotFound;
    }
    match path {
        "/health" => Route::Health,
        "/metrics" => Route::Metrics,
        "/openapi.json" | "/docs" => Route::OpenApi,
        _ => Route::NotFound,
    }
}

/// Whether responses on this path carry CORS headers
pub fn is_api_path(path: &str) -> bool {
    path.starts_with(API_PREFIX)
}

/// CORS headers attached to every `/api/*` response
pub const CORS_HEADERS: &[(&str, &str)] = &[
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Credentials", "true"),
    ("Access-Control-Allow-Methods", "GET, OPTIONS"),
    ("Access-Control-Allow-Headers", "*"),
];

fn json(status: u16, value: serde_json::Value) -> EndpointResponse {
    EndpointResponse {
        status,
        content_type: "application/json".to_string(),
        body: Bytes::from(value.to_string()),
        max_age: None,
    }
}

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    json(
        200,
        serde_json::json!({
            "status": "healthy",
            "uptime_seconds": start_time.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics() -> EndpointResponse {
    EndpointResponse {
        status: 200,
        content_type: "text/plain; version=0.0.4".to_string(),
        body: Bytes::from(crate::metrics::export()),
        max_age: None,
    }
}

pub fn handle_preflight() -> EndpointResponse {
    EndpointResponse {
        status: 204,
        content_type: "text/plain".to_string(),
        body: Bytes::new(),
        max_age: None,
    }
}

pub fn handle_not_found() -> EndpointResponse {
    EndpointResponse::json_error(404, "not found")
}

pub fn handle_method_not_allowed() -> EndpointResponse {
    EndpointResponse::json_error(405, "method not allowed")
}

/// Generate the OpenAPI 3 document describing `GET /api/transform`
pub fn handle_openapi() -> EndpointResponse {
    json(200, openapi_document())
}

pub fn openapi_document() -> serde_json::Value {
    let error_response = |description: &str| {
        serde_json::json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/Error" }
                }
            }
        })
    };

    serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Image Transform API",
            "version": env!("CARGO_PKG_VERSION")
        },
        "paths": {
            TRANSFORM_PATH: {
                "get": {
                    "summary": "Fetch a remote image, transform it and re-encode it",
                    "parameters": [
                        {
                            "name": "url",
                            "in": "query",
                            "required": true,
                            "schema": { "type": "string", "format": "uri", "example": EXAMPLE_SOURCE_URL }
                        },
                        {
                            "name": "format",
                            "in": "query",
                            "required": false,
                            "schema": { "type": "string", "enum": ["jpeg", "jpg", "png", "webp"], "default": "webp" }
                        },
                        {
                            "name": "action",
                            "in": "query",
                            "required": false,
                            "description": "Pipeline steps separated by '|', e.g. resize!100,100,1|grayscale",
                            "schema": { "type": "string" }
                        },
                        {
                            "name": "quality",
                            "in": "query",
                            "required": false,
                            "schema": { "type": "number" }
                        }
                    ],
                    "responses": {
                        "200": {
                            "description": "Transformed image",
                            "content": {
                                "image/jpeg": { "schema": { "type": "string", "format": "binary" } },
                                "image/png": { "schema": { "type": "string", "format": "binary" } },
                                "image/webp": { "schema": { "type": "string", "format": "binary" } }
                            }
                        },
                        "400": error_response("Invalid request or image"),
                        "403": error_response("Source host not in white list"),
                        "413": error_response("Source image too large"),
                        "502": error_response("Source image unreachable")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Error": {
                    "type": "object",
                    "properties": { "error": { "type": "string" } },
                    "required": ["error"]
                }
            }
        }
    })
}
