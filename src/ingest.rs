use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::error::FetchError;
use crate::infra::http_client::ReqwestHttp;
use metrics::counter;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Raw payload of one successful download.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub url: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub sha256: String,
    pub path: PathBuf,
    pub attempts: u32,
}

/// Downloads source payloads with a bounded number of attempts and a fixed delay between them.
pub struct SourceFetcher {
    client: Arc<dyn HttpClientPort>,
    temp_dir: PathBuf,
    max_retries: u32,
    retry_delay: Duration,
}

impl SourceFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::with_client(Arc::new(ReqwestHttp::new(config)?), config))
    }

    pub fn with_client(client: Arc<dyn HttpClientPort>, config: &Config) -> Self {
        Self {
            client,
            temp_dir: config.temp_dir.clone(),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
        }
    }

    pub async fn fetch(&self, url: &str, file_name: &str) -> Result<FetchedPayload, FetchError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let path = self.temp_dir.join(file_name);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            counter!("sanctions_fetch_attempts_total", "file" => file_name.to_string()).increment(1);
            debug!("Download attempt {}/{} for {}", attempt, self.max_retries, url);

            match self.client.download(url, &path).await {
                Ok(meta) => {
                    if !meta.content_type.contains("xml") {
                        warn!(
                            "Expected XML from {} but got content type '{}'; parsing anyway",
                            url, meta.content_type
                        );
                    }
                    let bytes = tokio::fs::read(&path).await?;
                    let sha256 = hex::encode(Sha256::digest(&bytes));
                    info!(
                        "Downloaded {} ({} bytes, sha256 {})",
                        file_name,
                        bytes.len(),
                        sha256
                    );
                    return Ok(FetchedPayload {
                        url: url.to_string(),
                        bytes,
                        content_type: meta.content_type,
                        sha256,
                        path,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    error!("Download attempt {}/{} failed: {}", attempt, self.max_retries, e);
                    counter!("sanctions_fetch_failures_total", "file" => file_name.to_string()).increment(1);
                    last_error = e.to_string();
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            last_error,
        })
    }
}

/// Remove downloaded payloads. Individual failures are logged, never fatal.
pub fn clean_temp_files(temp_dir: &Path) -> usize {
    let entries = match std::fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not read temp directory {}: {}", temp_dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to delete temp file {}: {}", path.display(), e),
        }
    }
    info!("Removed {} temp files", removed);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::DownloadMeta;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then writes `body`.
    struct FlakyHttp {
        failures: u32,
        calls: AtomicU32,
        body: &'static [u8],
        content_type: &'static str,
    }

    #[async_trait]
    impl HttpClientPort for FlakyHttp {
        async fn download(&self, url: &str, dest: &Path) -> Result<DownloadMeta, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            tokio::fs::write(dest, self.body).await?;
            Ok(DownloadMeta {
                status: 200,
                content_type: self.content_type.to_string(),
                bytes_written: self.body.len() as u64,
            })
        }
    }

    fn config(temp_dir: &Path) -> Config {
        Config {
            temp_dir: temp_dir.to_path_buf(),
            retry_delay_secs: 0,
            ..Config::default()
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyHttp> {
        Arc::new(FlakyHttp {
            failures,
            calls: AtomicU32::new(0),
            body: b"<CONSOLIDATED_LIST/>",
            content_type: "application/xml",
        })
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let client = flaky(2);
        let fetcher = SourceFetcher::with_client(client.clone(), &config(dir.path()));

        let payload = fetcher.fetch("http://un.test/list.xml", "un_sanctions.xml").await.unwrap();

        assert_eq!(payload.attempts, 3);
        assert_eq!(payload.bytes, b"<CONSOLIDATED_LIST/>");
        assert_eq!(payload.sha256.len(), 64);
        assert!(dir.path().join("un_sanctions.xml").exists());
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_bound() {
        let dir = tempfile::tempdir().unwrap();
        let client = flaky(10);
        let fetcher = SourceFetcher::with_client(client.clone(), &config(dir.path()));

        let err = fetcher.fetch("http://un.test/list.xml", "un_sanctions.xml").await.unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FlakyHttp {
            failures: 0,
            calls: AtomicU32::new(0),
            body: b"<html></html>",
            content_type: "text/html",
        });
        let fetcher = SourceFetcher::with_client(client, &config(dir.path()));

        let payload = fetcher.fetch("http://eu.test", "eu_sanctions.xml").await.unwrap();
        assert_eq!(payload.content_type, "text/html");
    }

    #[test]
    fn test_clean_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("un_sanctions.xml"), b"x").unwrap();
        std::fs::write(dir.path().join("eu_sanctions.xml"), b"y").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(clean_temp_files(dir.path()), 2);
        assert!(dir.path().join("nested").exists());
        assert_eq!(clean_temp_files(&dir.path().join("missing")), 0);
    }
}
