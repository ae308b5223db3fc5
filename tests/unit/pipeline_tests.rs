// Action parsing, allow-list and pipeline executor tests

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use pixelrelay::transform::codecs;
use pixelrelay::transform::{
    ActionChain, AllowList, ExecutorOptions, HandleLedger, ImageHandle, MemoryImageFetcher,
    PipelineExecutor, PipelineStep,
};
use reqwest::Url;
use rstest::rstest;
use std::collections::HashMap;
use std::sync::Arc;

fn executor() -> PipelineExecutor {
    PipelineExecutor::new(
        codecs::init(),
        Arc::new(MemoryImageFetcher::new()),
        Arc::new(AllowList::allow_all()),
        ExecutorOptions::default(),
    )
}

fn checkerboard(ledger: &Arc<HandleLedger>) -> ImageHandle {
    let img = RgbaImage::from_fn(6, 4, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    ImageHandle::from_image(DynamicImage::ImageRgba8(img), ledger)
}

#[rstest]
#[case(None)]
#[case(Some(""))]
#[case(Some("|"))]
#[case(Some("||"))]
fn test_parse_blank_action_is_empty_chain(#[case] action: Option<&str>) {
    assert!(ActionChain::parse(action).is_empty());
}

#[rstest]
#[case("resize!", "resize", &[])]
#[case("grayscale", "grayscale", &[])]
#[case("foo!!1,2", "foo", &["!1", "2"])]
#[case("crop!1,2,3,4", "crop", &["1", "2", "3", "4"])]
#[case("watermark!https://a.example.com/x.png?a=1,5,5", "watermark", &["https://a.example.com/x.png?a=1", "5", "5"])]
fn test_parse_single_step(#[case] action: &str, #[case] name: &str, #[case] params: &[&str]) {
    let chain = ActionChain::parse(Some(action));
    assert_eq!(chain.len(), 1);
    let expected = PipelineStep::new(name, params.iter().map(|p| p.to_string()).collect());
    assert_eq!(chain.steps()[0], expected);
}

#[test]
fn test_parse_keeps_step_order() {
    let chain = ActionChain::parse(Some("resize!10,10|grayscale||invert"));
    let names: Vec<_> = chain.steps().iter().map(|s| s.operation.as_str()).collect();
    assert_eq!(names, vec!["resize", "grayscale", "invert"]);
}

#[rstest]
#[case(&["example.com"], "https://cdn.example.com/a.png", true)]
#[case(&["example.com"], "https://example.com.evil.net/a.png", false)]
#[case(&["example.com"], "https://example.com/a.png", true)]
#[case(&[], "https://anything.test/a.png", true)]
#[case(&["githubusercontent.com", "example.com"], "https://avatars.githubusercontent.com/u/1", true)]
fn test_allow_list(#[case] suffixes: &[&str], #[case] url: &str, #[case] allowed: bool) {
    let list = AllowList::new(suffixes.iter().map(|s| s.to_string()).collect());
    assert_eq!(list.is_allowed(&Url::parse(url).unwrap()), allowed);
}

#[tokio::test]
async fn test_empty_chain_returns_image_unchanged() {
    let ledger = HandleLedger::new();
    let before = checkerboard(&ledger).image().unwrap().clone();

    let out = executor()
        .execute(checkerboard(&ledger), &ActionChain::parse(Some("")), &HashMap::new())
        .await
        .unwrap();

    assert_eq!(out.image().unwrap().as_bytes(), before.as_bytes());
}

#[tokio::test]
async fn test_unknown_operation_leaves_image_unchanged() {
    let ledger = HandleLedger::new();
    let before = checkerboard(&ledger).image().unwrap().clone();

    let out = executor()
        .execute(
            checkerboard(&ledger),
            &ActionChain::parse(Some("definitely_not_an_op!1,2,3")),
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.image().unwrap().as_bytes(), before.as_bytes());
}

#[tokio::test]
async fn test_flip_twice_is_identity() {
    let ledger = HandleLedger::new();
    let before = checkerboard(&ledger).image().unwrap().clone();

    let out = executor()
        .execute(
            checkerboard(&ledger),
            &ActionChain::parse(Some("fliph|flipv|fliph|flipv")),
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.image().unwrap().as_bytes(), before.as_bytes());
}

#[tokio::test]
async fn test_crop_then_rotate() {
    let ledger = HandleLedger::new();
    let out = executor()
        .execute(
            checkerboard(&ledger),
            &ActionChain::parse(Some("crop!0,0,4,2|rotate!-90")),
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.image().unwrap().dimensions(), (2, 4));
    drop(out);
    assert_eq!(ledger.live(), 0);
}

#[tokio::test]
async fn test_failed_step_keeps_previous_image() {
    let ledger = HandleLedger::new();
    let out = executor()
        .execute(
            checkerboard(&ledger),
            &ActionChain::parse(Some("resize!3,2|crop!0,0,99,99")),
            &HashMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.image().unwrap().dimensions(), (3, 2));
}
