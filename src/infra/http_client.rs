use crate::app::ports::{DownloadMeta, HttpClientPort};
use crate::config::Config;
use crate::constants::{ACCEPT_XML, USER_AGENT};
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// `reqwest`-backed transport that never holds more than one write buffer of the body.
pub struct ReqwestHttp {
    client: reqwest::Client,
    chunk_bytes: usize,
}

impl ReqwestHttp {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            chunk_bytes: config.download_chunk_bytes,
        })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn download(&self, url: &str, dest: &Path) -> Result<DownloadMeta, FetchError> {
        let mut resp = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_XML)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let file = File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_bytes, file);
        let mut bytes_written = 0u64;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
        {
            writer.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        writer.flush().await?;

        Ok(DownloadMeta {
            status: status.as_u16(),
            content_type,
            bytes_written,
        })
    }
}
