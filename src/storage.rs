use crate::config::Config;
use crate::error::WriteError;
use crate::types::{CanonicalRecord, Source};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Number of records serialized to estimate the size of a full document.
const SIZE_SAMPLE: usize = 100;

/// Envelope of a per-source canonical file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source: String,
    pub count: usize,
    pub timestamp: String,
}

/// Envelope of the unified dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedMeta {
    pub last_updated: String,
    pub sources: Vec<String>,
    pub total_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document<M> {
    pub meta: M,
    pub data: Vec<CanonicalRecord>,
}

#[derive(Serialize)]
struct DocumentRef<'a, M> {
    meta: &'a M,
    data: &'a [CanonicalRecord],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Buffered,
    Streamed,
}

#[derive(Debug, Clone)]
pub struct WriteReport {
    pub path: PathBuf,
    pub count: usize,
    pub mode: WriteMode,
}

/// Persists canonical records as `{meta, data}` JSON documents.
///
/// Documents whose projected size exceeds the configured byte threshold are
/// streamed in fixed-size record batches instead of being built in memory.
#[derive(Debug, Clone)]
pub struct CanonicalWriter {
    output_dir: PathBuf,
    buffer_threshold_bytes: u64,
    chunk_size: usize,
}

impl CanonicalWriter {
    pub fn new(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            buffer_threshold_bytes: config.buffer_threshold_bytes,
            chunk_size: config.chunk_size.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn source_path(&self, source: Source) -> PathBuf {
        self.output_dir.join(source.output_file_name())
    }

    /// Write one source's records with a `{source, count, timestamp}` envelope.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub fn write(&self, records: &[CanonicalRecord], source: Source) -> Result<WriteReport, WriteError> {
        let meta = SourceMeta {
            source: source.file_stem().to_string(),
            count: records.len(),
            timestamp: Utc::now().to_rfc3339(),
        };
        let report = self.write_document(&self.source_path(source), &meta, records)?;
        info!("{} sanctions saved: {} records ({:?})", source, report.count, report.mode);
        Ok(report)
    }

    /// Write any envelope plus records, choosing the buffered or streamed path.
    pub fn write_document<M: Serialize>(
        &self,
        path: &Path,
        meta: &M,
        records: &[CanonicalRecord],
    ) -> Result<WriteReport, WriteError> {
        fs::create_dir_all(&self.output_dir)?;
        let projected = projected_size(records)?;
        if projected > self.buffer_threshold_bytes {
            info!(
                "Projected size {} bytes exceeds {} bytes; streaming {} records",
                projected,
                self.buffer_threshold_bytes,
                records.len()
            );
            self.write_streamed(path, meta, records)
        } else {
            self.write_buffered(path, meta, records)
        }
    }

    pub fn write_buffered<M: Serialize>(
        &self,
        path: &Path,
        meta: &M,
        records: &[CanonicalRecord],
    ) -> Result<WriteReport, WriteError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &DocumentRef { meta, data: records })?;
        writer.flush()?;
        Ok(WriteReport {
            path: path.to_path_buf(),
            count: records.len(),
            mode: WriteMode::Buffered,
        })
    }

    /// Emit the envelope, then the record array batch by batch, flushing after each.
    pub fn write_streamed<M: Serialize>(
        &self,
        path: &Path,
        meta: &M,
        records: &[CanonicalRecord],
    ) -> Result<WriteReport, WriteError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(b"{\n\"meta\": ")?;
        serde_json::to_writer(&mut writer, meta)?;
        writer.write_all(b",\n\"data\": [\n")?;

        for (batch_index, batch) in records.chunks(self.chunk_size).enumerate() {
            for (i, record) in batch.iter().enumerate() {
                if batch_index > 0 || i > 0 {
                    writer.write_all(b",")?;
                }
                serde_json::to_writer(&mut writer, record)?;
            }
            writer.write_all(b"\n")?;
            writer.flush()?;
            debug!("Wrote batch {} ({} records)", batch_index + 1, batch.len());
        }

        writer.write_all(b"]\n}")?;
        writer.flush()?;
        Ok(WriteReport {
            path: path.to_path_buf(),
            count: records.len(),
            mode: WriteMode::Streamed,
        })
    }
}

/// Estimate the serialized size of `records` from a leading sample.
pub fn projected_size(records: &[CanonicalRecord]) -> Result<u64, WriteError> {
    if records.is_empty() {
        return Ok(0);
    }
    let sample = &records[..records.len().min(SIZE_SAMPLE)];
    let mut sampled = 0u64;
    for record in sample {
        sampled += serde_json::to_vec(record)?.len() as u64;
    }
    Ok(sampled / sample.len() as u64 * records.len() as u64)
}

pub fn read_document<M: DeserializeOwned>(path: &Path) -> std::io::Result<Document<M>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn read_source_document(path: &Path) -> std::io::Result<Document<SourceMeta>> {
    read_document(path)
}
