//! HTTP transport adapters.

mod media_client;

pub use media_client::MediaServerClient;
