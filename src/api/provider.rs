use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Rendition, SourceItem, SourcePlaylist};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("yt-dlp failed: {0}")]
    ToolFailed(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No direct stream URL for rendition {0}")]
    NoStreamUrl(String),

    #[error("Rendition {0} is not offered for this item")]
    UnknownRendition(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Receives `(bytes_total, bytes_remaining)` as a transfer advances.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(u64, u64) + Send);

/// Resolves media metadata and performs byte transfers.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    async fn resolve_item(&self, url: &str) -> Result<SourceItem>;

    async fn resolve_playlist(&self, url: &str) -> Result<SourcePlaylist>;

    async fn resolve_title(&self, url: &str) -> Result<String> {
        Ok(self.resolve_item(url).await?.title)
    }

    /// Writes `rendition` of the item at `source_url` to `output_dir/filename`
    /// and returns the path actually written.
    async fn download(
        &self,
        source_url: &str,
        rendition: &Rendition,
        output_dir: &Path,
        filename: &str,
        on_progress: ProgressCallback<'_>,
    ) -> Result<PathBuf>;
}
