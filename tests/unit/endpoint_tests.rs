// Transform endpoint tests
// Drive full requests through TransformService with an in-memory fetcher

use image::{DynamicImage, GenericImageView, ImageOutputFormat, Rgba, RgbaImage};
use pixelrelay::config::TransformConfig;
use pixelrelay::transform::{
    EndpointResponse, FetchedImage, HandleLedger, MemoryImageFetcher, TransformService,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

const SOURCE: &str = "https://img.example.com/photo.png";
const MARK: &str = "https://assets.example.com/mark.png";

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 3) as u8, (y * 3) as u8, 200, 255])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn fetcher() -> Arc<MemoryImageFetcher> {
    let fetcher = MemoryImageFetcher::new();
    fetcher.insert(SOURCE, FetchedImage::ok("image/png", png(64, 48)));
    fetcher.insert(MARK, FetchedImage::ok("image/png", png(8, 8)));
    Arc::new(fetcher)
}

fn service_with(config: TransformConfig, fetcher: Arc<MemoryImageFetcher>) -> TransformService {
    TransformService::new(&config, fetcher)
}

fn service() -> TransformService {
    service_with(TransformConfig::default(), fetcher())
}

fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Run a request and check that no image handle outlived it
async fn run(service: &TransformService, pairs: &[(&str, &str)]) -> EndpointResponse {
    let ledger = HandleLedger::new();
    let response = service
        .handle_with_ledger(&query(pairs), &HashMap::new(), &ledger)
        .await;
    assert_eq!(ledger.live(), 0, "handles leaked for {:?}", pairs);
    response
}

fn error_message(response: &EndpointResponse) -> String {
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_resize_then_grayscale_as_png() {
    let response = run(
        &service(),
        &[
            ("url", SOURCE),
            ("action", "resize!100,100,1|grayscale"),
            ("format", "png"),
        ],
    )
    .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/png");
    assert_eq!(response.cache_control().as_deref(), Some("max-age=15552000"));

    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!(decoded.dimensions(), (100, 100));
    let p = decoded.get_pixel(50, 50);
    assert_eq!(p[0], p[1]);
    assert_eq!(p[1], p[2]);
}

#[tokio::test]
async fn test_default_format_is_webp() {
    let response = run(&service(), &[("url", SOURCE)]).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/webp");
    assert_eq!(&response.body[..4], b"RIFF");
}

#[tokio::test]
async fn test_jpg_format_uses_jpeg_mime() {
    let response = run(
        &service(),
        &[("url", SOURCE), ("format", "jpg"), ("quality", "40")],
    )
    .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/jpeg");
    assert_eq!(&response.body[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_missing_url_is_400_json() {
    let response = run(&service(), &[("format", "png")]).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.content_type, "application/json");
    assert_eq!(error_message(&response), "url is required");
    assert!(response.cache_control().is_none());
}

#[tokio::test]
async fn test_invalid_format_and_quality_are_400() {
    let response = run(&service(), &[("url", SOURCE), ("format", "bmp")]).await;
    assert_eq!(response.status, 400);

    let response = run(&service(), &[("url", SOURCE), ("quality", "best")]).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_host_outside_allow_list_is_403() {
    let config = TransformConfig {
        allow_list: vec!["cdn.example.org".to_string()],
        ..Default::default()
    };
    let response = run(&service_with(config, fetcher()), &[("url", SOURCE)]).await;
    assert_eq!(response.status, 403);
    assert_eq!(error_message(&response), "url is not in white list");
}

#[tokio::test]
async fn test_allow_list_suffix_match_admits_subdomain() {
    let config = TransformConfig {
        allow_list: vec!["example.com".to_string()],
        ..Default::default()
    };
    let response = run(
        &service_with(config, fetcher()),
        &[("url", SOURCE), ("format", "png")],
    )
    .await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_unknown_operation_matches_omitting_it() {
    let service = service();
    let with_unknown = run(
        &service,
        &[("url", SOURCE), ("format", "png"), ("action", "invert|sparkle!3|fliph")],
    )
    .await;
    let without = run(
        &service,
        &[("url", SOURCE), ("format", "png"), ("action", "invert|fliph")],
    )
    .await;

    assert_eq!(with_unknown.status, 200);
    assert_eq!(with_unknown.body, without.body);
}

#[tokio::test]
async fn test_watermark_from_disallowed_host_matches_omitting_it() {
    let config = TransformConfig {
        allow_list: vec!["img.example.com".to_string()],
        ..Default::default()
    };
    let service = service_with(config, fetcher());
    let action = format!("grayscale|watermark!{},10,10", MARK);

    let with_mark = run(
        &service,
        &[("url", SOURCE), ("format", "png"), ("action", &action)],
    )
    .await;
    let without = run(
        &service,
        &[("url", SOURCE), ("format", "png"), ("action", "grayscale")],
    )
    .await;

    assert_eq!(with_mark.status, 200);
    assert_eq!(with_mark.body, without.body);
}

#[tokio::test]
async fn test_allowed_watermark_changes_output() {
    let service = service();
    let action = format!("watermark!{},10,10", MARK);

    let with_mark = run(
        &service,
        &[("url", SOURCE), ("format", "png"), ("action", &action)],
    )
    .await;
    let without = run(&service, &[("url", SOURCE), ("format", "png")]).await;

    assert_eq!(with_mark.status, 200);
    assert_ne!(with_mark.body, without.body);
    let decoded = image::load_from_memory(&with_mark.body).unwrap();
    assert_eq!(decoded.dimensions(), (64, 48));
}

#[tokio::test]
async fn test_upstream_error_status_is_passed_through() {
    let fetcher = fetcher();
    fetcher.insert(
        "https://img.example.com/gone.png",
        FetchedImage {
            status: 404,
            content_type: Some("text/html".to_string()),
            body: bytes::Bytes::from_static(b"<h1>Not Found</h1>"),
        },
    );
    let service = service_with(TransformConfig::default(), fetcher);

    let response = run(&service, &[("url", "https://img.example.com/gone.png")]).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.content_type, "text/html");
    assert_eq!(response.body.as_ref(), b"<h1>Not Found</h1>");
    assert!(response.cache_control().is_none());
}

#[tokio::test]
async fn test_unreachable_source_is_502() {
    let response = run(&service(), &[("url", "https://down.example.com/a.png")]).await;
    assert_eq!(response.status, 502);
}

#[tokio::test]
async fn test_oversized_source_is_413() {
    let fetcher = MemoryImageFetcher::new().with_max_bytes(16);
    fetcher.insert(SOURCE, FetchedImage::ok("image/png", png(64, 48)));
    let service = service_with(TransformConfig::default(), Arc::new(fetcher));

    let response = run(&service, &[("url", SOURCE)]).await;
    assert_eq!(response.status, 413);
}

#[tokio::test]
async fn test_undecodable_source_is_400() {
    let fetcher = fetcher();
    fetcher.insert(
        "https://img.example.com/text.png",
        FetchedImage::ok("image/png", b"definitely not an image".to_vec()),
    );
    let service = service_with(TransformConfig::default(), fetcher);

    let response = run(&service, &[("url", "https://img.example.com/text.png")]).await;
    assert_eq!(response.status, 400);
    assert!(!error_message(&response).is_empty());
}

#[tokio::test]
async fn test_image_bomb_is_rejected() {
    let config = TransformConfig {
        max_source_pixels: 100,
        ..Default::default()
    };
    let response = run(&service_with(config, fetcher()), &[("url", SOURCE)]).await;
    assert_eq!(response.status, 400);
    assert!(error_message(&response).contains("exceed limit"));
}

#[tokio::test]
async fn test_strict_pipeline_rejects_failing_step() {
    let config = TransformConfig {
        strict_pipeline: true,
        ..Default::default()
    };
    let service = service_with(config, fetcher());

    let response = run(&service, &[("url", SOURCE), ("action", "resize!0,10")]).await;
    assert_eq!(response.status, 400);
    assert!(error_message(&response).contains("resize!0,10"));

    let response = run(&service, &[("url", SOURCE), ("action", "resize!10,10")]).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_only_configured_headers_are_forwarded() {
    let fetcher = fetcher();
    let service = service_with(TransformConfig::default(), fetcher.clone());

    let mut headers = HashMap::new();
    headers.insert("authorization".to_string(), "Bearer token".to_string());
    headers.insert("x-internal".to_string(), "secret".to_string());

    let action = format!("blend!{},multiply", MARK);
    let response = service
        .handle(&query(&[("url", SOURCE), ("action", &action)]), &headers)
        .await;
    assert_eq!(response.status, 200);

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].0, SOURCE);
    assert_eq!(requests[1].0, MARK);
    for (_, forwarded) in &requests {
        assert_eq!(forwarded.get("authorization").unwrap(), "Bearer token");
        assert!(!forwarded.contains_key("x-internal"));
    }
}
