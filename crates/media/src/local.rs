//! Local filesystem blob store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use parley_config::MediaConfig;
use tokio::fs;
use tracing::{debug, info};

use crate::format::decode_image;
use crate::{BlobStore, MediaError};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

/// Writes images under a root directory that the HTTP layer serves statically.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl LocalBlobStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.root_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            max_bytes: config.max_image_bytes,
        }
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), MediaError> {
        fs::create_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "media root ready");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, image: &str) -> Result<String, MediaError> {
        let decoded = decode_image(image, self.max_bytes)?;
        let file_name = format!("{}.{}", CUID.create_id(), decoded.format.extension());

        self.ensure_root().await?;
        fs::write(self.root.join(&file_name), &decoded.bytes).await?;

        info!(
            file = %file_name,
            bytes = decoded.bytes.len(),
            mime = decoded.format.mime(),
            "stored image"
        );

        Ok(format!("{}/{}", self.public_base_url, file_name))
    }
}
