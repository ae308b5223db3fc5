//! One-time codec and registry initialization
//!
//! The operation registry is built on first use and shared for the life of
//! the process. `init` also encodes a tiny image with libwebp once so a
//! broken codec shows up in the startup logs rather than on the first request.

use std::sync::OnceLock;

use super::operations::OperationRegistry;

static REGISTRY: OnceLock<OperationRegistry> = OnceLock::new();

/// Initialize codecs and the operation registry. Safe to call repeatedly;
/// only the first call does any work.
pub fn init() -> &'static OperationRegistry {
    REGISTRY.get_or_init(|| {
        let registry = OperationRegistry::builtin();
        let webp_ok = webp_self_check();
        if webp_ok {
            tracing::info!(
                operations = registry.len(),
                "Image codecs initialized"
            );
        } else {
            tracing::warn!(
                operations = registry.len(),
                "WebP encoder self-check failed, webp output will error"
            );
        }
        registry
    })
}

/// Whether `init` has already run
pub fn is_initialized() -> bool {
    REGISTRY.get().is_some()
}

fn webp_self_check() -> bool {
    let pixel = [0u8, 0, 0, 255];
    webp::Encoder::from_rgba(&pixel, 1, 1)
        .encode_simple(false, 50.0)
        .is_ok()
}
