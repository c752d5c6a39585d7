use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;

/// Transport that streams one HTTP response body to disk.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadMeta, FetchError>;
}

#[derive(Clone, Debug)]
pub struct DownloadMeta {
    pub status: u16,
    pub content_type: String,
    pub bytes_written: u64,
}
