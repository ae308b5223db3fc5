// pixelrelay - remote image transform service

pub mod cache;
pub mod config;
pub mod constants;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod proxy;
pub mod transform;
