// Adapters layer: concrete implementations for external systems.

pub mod decode;
pub mod http;

pub use http::ApiClient;
