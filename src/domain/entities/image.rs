//! Domain types for images moving through the transfer core.

use serde::{Deserialize, Serialize};

/// Cache key for an image.
/// Either the URL the image was fetched from or a generated unique identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(String);

impl ImageKey {
    /// Creates a new `ImageKey` from any string-like input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Creates a fresh key for an image that has no URL yet.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Uses the supplied URL when it is non-blank, otherwise generates a key.
    #[must_use]
    pub fn from_optional_url(url: Option<&str>) -> Self {
        match url.map(str::trim) {
            Some(url) if !url.is_empty() => Self::new(url),
            _ => Self::generate(),
        }
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Identifier of one in-flight transfer. Never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadId(u64);

impl DownloadId {
    /// Wraps a raw task number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw task number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dl-{}", self.0)
    }
}

/// One entry of the server's image list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Server-relative path or absolute URL of the image.
    pub url: String,
}

impl ImageEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the cache key for this entry.
    #[must_use]
    pub fn key(&self) -> ImageKey {
        ImageKey::new(self.url.clone())
    }
}

/// Ordered list of images known to the client.
#[derive(Debug, Clone, Default)]
pub struct ImageCatalog {
    entries: Vec<ImageEntry>,
}

impl ImageCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Replaces the contents with a freshly fetched list.
    pub fn replace(&mut self, entries: Vec<ImageEntry>) {
        self.entries = entries;
    }

    /// Appends an image after the existing ones.
    pub fn push(&mut self, key: &ImageKey) {
        self.entries.push(ImageEntry::new(key.as_str()));
    }

    /// Returns true if an entry with this key exists.
    #[must_use]
    pub fn contains(&self, key: &ImageKey) -> bool {
        self.entries.iter().any(|e| e.url == key.as_str())
    }

    /// Returns the entries in display order.
    #[must_use]
    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Encoded image ready to be posted to the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    /// JPEG bytes.
    pub bytes: bytes::Bytes,
    /// File name announced in the multipart body.
    pub file_name: String,
}

impl UploadPayload {
    /// MIME type sent with every payload.
    pub const CONTENT_TYPE: &'static str = "image/jpeg";

    /// Multipart field name expected by the server.
    pub const FIELD_NAME: &'static str = "files";

    /// Creates a payload with a fresh `<uuid>.jpg` file name.
    #[must_use]
    pub fn new(bytes: bytes::Bytes) -> Self {
        Self {
            bytes,
            file_name: format!("{}.jpg", uuid::Uuid::new_v4()),
        }
    }
}

/// Server acknowledgement of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// HTTP status returned by the server.
    pub status: u16,
    /// Human readable message for the caller.
    pub message: String,
}
