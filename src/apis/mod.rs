pub mod eu;
pub mod ofac;
pub mod un;

use crate::config::SourcesConfig;
use crate::error::{FetchError, ParseError, Result, SanctionsError};
use crate::ingest::{FetchedPayload, SourceFetcher};
use crate::storage::{CanonicalWriter, WriteReport};
use crate::types::{CanonicalRecord, Source};
use async_trait::async_trait;
use tracing::warn;

pub use eu::EuCollector;
pub use ofac::OfacCollector;
pub use un::UnCollector;

/// Result of collecting one source end to end.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub source: Source,
    pub records: usize,
    pub payload: FetchedPayloadInfo,
    pub write: WriteReport,
}

/// Payload metadata kept after the raw bytes are dropped.
#[derive(Debug, Clone)]
pub struct FetchedPayloadInfo {
    pub url: String,
    pub bytes: usize,
    pub sha256: String,
}

impl From<&FetchedPayload> for FetchedPayloadInfo {
    fn from(payload: &FetchedPayload) -> Self {
        Self {
            url: payload.url.clone(),
            bytes: payload.bytes.len(),
            sha256: payload.sha256.clone(),
        }
    }
}

/// Core trait every sanctions authority implements.
///
/// Only `parse` is source-specific; fetching and persisting are shared.
#[async_trait]
pub trait Collector: Send + Sync {
    fn source(&self) -> Source;

    /// Endpoints to try in order until one download succeeds.
    fn endpoints(&self) -> Vec<String>;

    /// Translate the authority's XML dialect into canonical records.
    ///
    /// Fails only when the document as a whole cannot be read; individual
    /// bad records are logged and skipped.
    fn parse(&self, raw: &[u8]) -> std::result::Result<Vec<CanonicalRecord>, ParseError>;

    async fn fetch(&self, fetcher: &SourceFetcher) -> std::result::Result<FetchedPayload, FetchError> {
        let source = self.source();
        let mut last_error = FetchError::NoEndpoint(source.tag().to_string());
        for url in self.endpoints() {
            match fetcher.fetch(&url, &source.download_file_name()).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    warn!(source = %source, url = %url, "Endpoint failed: {}", e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    /// Persist parsed records. An empty batch is a failure and leaves any
    /// previous output untouched.
    fn save(&self, writer: &CanonicalWriter, records: &[CanonicalRecord]) -> Result<WriteReport> {
        let source = self.source();
        if records.is_empty() {
            return Err(SanctionsError::NoRecords(source.tag().to_string()));
        }
        Ok(writer.write(records, source)?)
    }
}

/// Drop anything that would violate the non-empty id/name invariant.
pub fn valid_records(mut records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let before = records.len();
    records.retain(CanonicalRecord::is_valid);
    if records.len() < before {
        warn!("Dropped {} records without id or name", before - records.len());
    }
    records
}

pub fn create_collector(source: Source, config: &SourcesConfig) -> Box<dyn Collector> {
    match source {
        Source::Un => Box::new(UnCollector::new(config.un_url.clone())),
        Source::Eu => Box::new(EuCollector::new(
            config.eu_url.clone(),
            config.eu_alt_url.clone(),
        )),
        Source::Us => Box::new(OfacCollector::new(config.us_url.clone())),
    }
}
