//! Media transfer core.
//!
//! Lists, downloads, caches, compresses and uploads images against a remote
//! media server. Many downloads run concurrently with per-URL progress, images
//! are re-encoded to fit an upload budget, and decoded images are kept in a
//! bounded in-memory cache keyed by URL.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the download and upload services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "media-transfer";
