pub mod client;
pub mod common;
pub mod native_http;
pub mod selector;
pub mod sse;

pub use client::{Credential, ModelInfo, NativeRequest, NativeResponse, StreamChunk, StreamResult, UpstreamClient};
pub use native_http::NativeHttpClient;
pub use selector::KeySelector;
