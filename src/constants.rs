// Constants module - centralized default values for configuration
//
// This module defines the default values used throughout the codebase.
// Config defaults, codec defaults and HTTP surface constants live here so
// the transform modules never carry magic numbers.

// =============================================================================
// Server defaults
// =============================================================================

/// Default bind address
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8787;

/// Path of the transform endpoint
pub const TRANSFORM_PATH: &str = "/api/transform";

/// Prefix that receives CORS headers and preflight handling
pub const API_PREFIX: &str = "/api/";

// =============================================================================
// Transform defaults
// =============================================================================

/// Default timeout for a single source image fetch in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default maximum source image size (50 MB)
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 50 * 1024 * 1024;

/// Default maximum decoded pixel count (100 megapixels)
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

/// Default `max-age` of successful transform responses (180 days)
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 15_552_000;

/// Request headers forwarded to source fetches unless configured otherwise
pub const DEFAULT_FORWARD_HEADERS: &[&str] = &["authorization", "cookie", "referer", "user-agent"];

/// Environment variable holding a comma-separated hostname allow-list
pub const ALLOW_LIST_ENV: &str = "WHITE_LIST";

/// Example source shown in the OpenAPI document
pub const EXAMPLE_SOURCE_URL: &str = "https://avatars.githubusercontent.com/u/314135";

// =============================================================================
// Codec defaults
// =============================================================================

/// JPEG quality used when the request does not specify one
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// WebP quality used when the request does not specify one
pub const DEFAULT_WEBP_QUALITY: f32 = 75.0;

// =============================================================================
// Response cache defaults
// =============================================================================

/// Default maximum number of cached responses
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 512;

/// Default TTL in seconds
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Default maximum size of a single cached response (10 MB)
pub const DEFAULT_MAX_ITEM_BYTES: usize = 10 * 1024 * 1024;

/// Largest width or height an operation may produce
pub const MAX_OUTPUT_DIMENSION: u32 = 16_384;
