// Proxy module - Pingora ProxyHttp implementation
// Serves the transform API and the built-in endpoints locally; nothing is
// proxied to an upstream peer.

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CachedResponse, ResponseCache};
use crate::config::Config;
use crate::metrics::TransformMetrics;
use crate::pipeline::RequestContext;
use crate::transform::{format_label, EndpointResponse, FetchError, ImageFetcher, TransformService};

pub mod helpers;
pub mod special_endpoints;

use special_endpoints::{route, Route, CORS_HEADERS};

/// TransformProxy implements the Pingora ProxyHttp trait
pub struct TransformProxy {
    config: Arc<Config>,
    service: TransformService,
    cache: Option<ResponseCache>,
    /// Proxy start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl TransformProxy {
    /// Create a proxy that fetches source images over HTTP
    pub fn new(config: Config) -> std::result::Result<Self, FetchError> {
        let service = TransformService::from_config(&config.transform)?;
        Ok(Self::with_service(config, service))
    }

    /// Create a proxy around a custom image fetcher
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let service = TransformService::new(&config.transform, fetcher);
        Self::with_service(config, service)
    }

    fn with_service(config: Config, service: TransformService) -> Self {
        let cache = ResponseCache::from_config(&config.cache);
        Self {
            config: Arc::new(config),
            service,
            cache,
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Produce the response for a routed request. Transform results are
    /// served from and stored into the response cache when it is enabled,
    /// keyed by `cache_key` plus the forwarded header values.
    pub async fn respond(&self, route: Route, ctx: &mut RequestContext, cache_key: &str) -> EndpointResponse {
        match route {
            Route::Transform => {
                let cache_key = helpers::vary_cache_key(
                    cache_key,
                    ctx.headers(),
                    &self.config.transform.forward_headers,
                );
                if let Some(cache) = &self.cache {
                    if let Some(hit) = cache.get(&cache_key).await {
                        ctx.mark_cache_hit();
                        let metrics = TransformMetrics::global();
                        metrics.record_request(200);
                        metrics.observe_duration(
                            format_label(ctx.query_params()),
                            ctx.elapsed().as_secs_f64(),
                        );
                        return EndpointResponse {
                            status: 200,
                            content_type: hit.content_type,
                            body: hit.body,
                            max_age: Some(self.config.transform.cache_max_age_secs),
                        };
                    }
                }

                let response = self
                    .service
                    .handle(ctx.query_params(), ctx.headers())
                    .await;

                if let (Some(cache), true) = (&self.cache, response.is_success()) {
                    cache
                        .insert(
                            cache_key,
                            CachedResponse {
                                content_type: response.content_type.clone(),
                                body: response.body.clone(),
                            },
                        )
                        .await;
                }
                response
            }
            Route::Preflight => special_endpoints::handle_preflight(),
            Route::Health => special_endpoints::handle_health(self.start_time),
            Route::Metrics => special_endpoints::handle_metrics(),
            Route::OpenApi => special_endpoints::handle_openapi(),
            Route::MethodNotAllowed => special_endpoints::handle_method_not_allowed(),
            Route::NotFound => special_endpoints::handle_not_found(),
        }
    }
}

/// Write a complete response to the session
async fn write_response(
    session: &mut Session,
    response: EndpointResponse,
    cors: bool,
) -> Result<()> {
    let mut header = ResponseHeader::build(response.status, None)?;
    header.insert_header("Content-Type", response.content_type.as_str())?;
    header.insert_header("Content-Length", response.body.len().to_string())?;
    if let Some(cache_control) = response.cache_control() {
        header.insert_header("Cache-Control", cache_control)?;
    }
    if cors {
        for (name, value) in CORS_HEADERS {
            header.insert_header(*name, *value)?;
        }
    }

    session
        .write_response_header(Box::new(header), false)
        .await?;
    session
        .write_response_body(Some(response.body), true)
        .await?;
    Ok(())
}

#[async_trait]
impl ProxyHttp for TransformProxy {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("GET".to_string(), "/".to_string())
    }

    /// Every route is answered in `request_filter`, so reaching this hook is
    /// an internal error.
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "pixelrelay serves all requests locally",
        ))
    }

    /// Route the request and write the response
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.to_string();
        let path = req.uri.path().to_string();
        let cache_key = helpers::cache_key(req);
        ctx.set_request(
            method.clone(),
            path.clone(),
            helpers::extract_headers(req),
            helpers::extract_query_params(req),
        );

        let route = route(&method, &path);
        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %method,
            path = %path,
            route = route.as_str(),
            "Routing request"
        );

        let response = self.respond(route, ctx, &cache_key).await;
        write_response(session, response, special_endpoints::is_api_path(&path)).await?;

        Ok(true)
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = status_code,
            cache_hit = ctx.cache_hit(),
            duration_ms = ctx.elapsed().as_millis() as u64,
            "Request completed"
        );
    }
}
