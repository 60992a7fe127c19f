//! Parley media storage.
//!
//! Images arrive inline as base64 (usually a `data:` URI). A [`BlobStore`]
//! persists them and hands back the URL that message rows reference.

use async_trait::async_trait;
use thiserror::Error;

pub mod format;
pub mod local;

pub use format::{decode_image, DecodedImage, ImageFormat};
pub use local::LocalBlobStore;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid image encoding: {0}")]
    InvalidEncoding(String),
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("media storage failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist an inline image and return the URL it is served from.
    async fn store(&self, image: &str) -> Result<String, MediaError>;
}
