use crate::constants::{DIAGNOSTIC_FILE, UNKNOWN_COUNT};
use crate::error::WriteError;
use crate::storage::CanonicalWriter;
use crate::types::Source;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// A record count read back from an output file, or the `"unknown"` marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordCount {
    Known(u64),
    Unknown(&'static str),
}

impl RecordCount {
    pub fn unknown() -> Self {
        RecordCount::Unknown(UNKNOWN_COUNT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// Summary artifact describing one run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub last_update: String,
    pub run_id: Uuid,
    pub sources: Vec<String>,
    pub elapsed_time: f64,
    pub status: RunStatus,
    /// `<source>_count` entries plus `integrated_count`.
    #[serde(flatten)]
    pub counts: BTreeMap<String, RecordCount>,
}

#[derive(Deserialize)]
struct SourceCountMeta {
    count: u64,
}

#[derive(Deserialize)]
struct MetaOnly<M> {
    meta: M,
}

fn read_meta<M: serde::de::DeserializeOwned>(path: &Path) -> Option<M> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Could not open {} for diagnostics: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_reader::<_, MetaOnly<M>>(BufReader::new(file)) {
        Ok(doc) => Some(doc.meta),
        Err(e) => {
            warn!("Could not read meta from {}: {}", path.display(), e);
            None
        }
    }
}

pub fn source_count(writer: &CanonicalWriter, source: Source) -> RecordCount {
    read_meta::<SourceCountMeta>(&writer.source_path(source))
        .map(|meta| RecordCount::Known(meta.count))
        .unwrap_or_else(RecordCount::unknown)
}

impl DiagnosticReport {
    /// Build the report for one run. Source counts are read back from the
    /// per-source files; `integrated_entries` is this run's merged total, if
    /// integration produced one. Anything unavailable becomes `"unknown"`.
    pub fn collect(
        writer: &CanonicalWriter,
        run_id: Uuid,
        sources: &[Source],
        elapsed: Duration,
        status: RunStatus,
        integrated_entries: Option<usize>,
    ) -> Self {
        let mut counts = BTreeMap::new();
        for &source in sources {
            counts.insert(
                format!("{}_count", source.file_stem()),
                source_count(writer, source),
            );
        }
        counts.insert(
            "integrated_count".to_string(),
            integrated_entries
                .map(|n| RecordCount::Known(n as u64))
                .unwrap_or_else(RecordCount::unknown),
        );

        Self {
            last_update: Utc::now().to_rfc3339(),
            run_id,
            sources: sources.iter().map(|s| s.tag().to_string()).collect(),
            elapsed_time: elapsed.as_secs_f64(),
            status,
            counts,
        }
    }

    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, WriteError> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(DIAGNOSTIC_FILE);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!("Diagnostic report written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{CanonicalRecord, EntityType};

    #[test]
    fn test_counts_fall_back_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CanonicalWriter::new(&Config {
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let record = CanonicalRecord::new(Source::Un, "1", "Alpha", EntityType::Entity);
        writer.write(&[record.clone(), record], Source::Un).unwrap();

        let report = DiagnosticReport::collect(
            &writer,
            Uuid::new_v4(),
            &[Source::Un, Source::Eu],
            Duration::from_millis(1500),
            RunStatus::Failure,
            None,
        );
        let path = report.write(dir.path()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["un_count"], 2);
        assert_eq!(value["eu_count"], "unknown");
        assert_eq!(value["integrated_count"], "unknown");
        assert_eq!(value["status"], "failure");
        assert_eq!(value["sources"], serde_json::json!(["UN", "EU"]));
        assert_eq!(value["elapsed_time"], 1.5);
    }

    #[test]
    fn test_integrated_count_comes_from_this_run_only() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CanonicalWriter::new(&Config {
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        // Unified file left behind by an earlier run.
        std::fs::write(
            dir.path().join(crate::constants::UNIFIED_FILE),
            r#"{"meta":{"lastUpdated":"x","sources":["UN"],"totalEntries":1},"data":[]}"#,
        )
        .unwrap();

        let failed = DiagnosticReport::collect(&writer, Uuid::new_v4(), &[], Duration::ZERO, RunStatus::Failure, None);
        assert_eq!(failed.counts["integrated_count"], RecordCount::unknown());

        let ok = DiagnosticReport::collect(&writer, Uuid::new_v4(), &[], Duration::ZERO, RunStatus::Success, Some(7));
        assert_eq!(ok.counts["integrated_count"], RecordCount::Known(7));
    }
}
