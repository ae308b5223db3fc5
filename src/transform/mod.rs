//! Image transform pipeline
//!
//! Fetches a source image, runs it through a chain of operations described by
//! the `action` mini-language and encodes the result.
//!
//! # Action syntax
//!
//! ```text
//! resize!100,100,1|grayscale|watermark!https://cdn.example.com/logo.png,10,10
//! ```
//!
//! Steps are separated by `|`; a step's name and parameters by the first `!`;
//! parameters by `,`. `watermark` and `blend` take the URL of a second image as
//! their first parameter.
//!
//! # Example
//!
//! ```ignore
//! use pixelrelay::transform::{TransformService, MemoryImageFetcher};
//!
//! let service = TransformService::new(&config.transform, Arc::new(fetcher));
//! let response = service.handle(&query_params, &headers).await;
//! ```

pub mod action;
pub mod allow_list;
pub mod codecs;
pub mod encoder;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod handle;
pub mod operations;

pub use action::{ActionChain, PipelineStep};
pub use allow_list::AllowList;
pub use encoder::{EncodedImage, EncoderQuality, OutputFormat};
pub use endpoint::{format_label, EndpointResponse, TransformQuery, TransformService};
pub use error::{OperationError, TransformError};
pub use executor::{ExecutorOptions, PipelineExecutor};
pub use fetcher::{FetchError, FetchedImage, HttpImageFetcher, ImageFetcher, MemoryImageFetcher};
pub use handle::{DecodeLimits, HandleLedger, ImageHandle};
pub use operations::{Operation, OperationRegistry};
