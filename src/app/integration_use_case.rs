use crate::constants::{INTEGRATED_FILE, UNIFIED_FILE};
use crate::error::IntegrationError;
use crate::storage::{read_source_document, CanonicalWriter, UnifiedMeta};
use crate::types::{CanonicalRecord, Source};
use chrono::Utc;
use metrics::counter;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{error, info, instrument, warn};

/// Outcome of one integration pass.
#[derive(Debug, Clone)]
pub struct IntegrationReport {
    pub loaded_sources: Vec<Source>,
    pub input_counts: BTreeMap<Source, usize>,
    pub total_entries: usize,
    pub merged_duplicates: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub output_files: Vec<PathBuf>,
    /// Some requested sources could not be loaded.
    pub degraded: bool,
}

/// Id-keyed merge of records in first-seen order.
#[derive(Debug, Default)]
pub struct MergeIndex {
    positions: HashMap<String, usize>,
    records: Vec<CanonicalRecord>,
    merged: usize,
}

impl MergeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first record with a given id seeds the entry; later ones merge into it.
    pub fn insert(&mut self, record: CanonicalRecord) {
        match self.positions.get(&record.id) {
            Some(&pos) => {
                self.records[pos].merge_from(&record);
                self.merged += 1;
            }
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn merged(&self) -> usize {
        self.merged
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

pub fn count_by_source(records: &[CanonicalRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        for source in record.sources() {
            *counts.entry(source.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

pub fn count_by_type(records: &[CanonicalRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.entity_type.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Merges per-source canonical files into the unified dataset.
pub struct IntegrationUseCase {
    writer: CanonicalWriter,
}

impl IntegrationUseCase {
    pub fn new(writer: CanonicalWriter) -> Self {
        Self { writer }
    }

    #[instrument(skip(self))]
    pub fn integrate(&self, sources: &[Source]) -> Result<IntegrationReport, IntegrationError> {
        let mut index = MergeIndex::new();
        let mut loaded_sources = Vec::new();
        let mut input_counts = BTreeMap::new();

        for &source in sources {
            let path = self.writer.source_path(source);
            let document = match read_source_document(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("Skipping {}: could not load {}: {}", source, path.display(), e);
                    counter!("sanctions_integration_skipped_sources_total", "source" => source.tag()).increment(1);
                    continue;
                }
            };

            let total = document.data.len();
            let mut accepted = 0;
            for record in document.data {
                if !record.is_valid() {
                    warn!("Ignoring invalid record in {} output: id='{}'", source, record.id);
                    continue;
                }
                index.insert(record);
                accepted += 1;
            }
            info!("Loaded {} {} records ({} in file)", accepted, source, total);
            loaded_sources.push(source);
            input_counts.insert(source, accepted);
        }

        if loaded_sources.is_empty() {
            error!("No sources could be loaded for integration");
            return Err(IntegrationError::NoSources(
                sources.iter().map(Source::tag).collect::<Vec<_>>().join(","),
            ));
        }

        let degraded = loaded_sources.len() < sources.len();
        if degraded {
            warn!(
                "Integration is partial: loaded {} of {} sources",
                loaded_sources.len(),
                sources.len()
            );
        }

        let merged_duplicates = index.merged();
        let records = index.into_records();
        let meta = UnifiedMeta {
            last_updated: Utc::now().to_rfc3339(),
            sources: loaded_sources.iter().map(|s| s.tag().to_string()).collect(),
            total_entries: records.len(),
        };

        let mut output_files = Vec::new();
        for file in [UNIFIED_FILE, INTEGRATED_FILE] {
            let path = self.writer.output_dir().join(file);
            self.writer.write_document(&path, &meta, &records)?;
            output_files.push(path);
        }

        let by_source = count_by_source(&records);
        let by_type = count_by_type(&records);
        info!(
            "Integrated {} entries ({} duplicates merged)",
            records.len(),
            merged_duplicates
        );
        for (source, count) in &by_source {
            info!("  {}: {}", source, count);
        }
        for (entity_type, count) in &by_type {
            info!("  {}: {}", entity_type, count);
        }
        counter!("sanctions_integrated_entries_total").increment(records.len() as u64);

        Ok(IntegrationReport {
            loaded_sources,
            input_counts,
            total_entries: records.len(),
            merged_duplicates,
            by_source,
            by_type,
            output_files,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{read_document, Document};
    use crate::types::EntityType;
    use std::path::Path;

    fn writer(dir: &Path) -> CanonicalWriter {
        CanonicalWriter::new(&Config {
            output_dir: dir.to_path_buf(),
            ..Config::default()
        })
    }

    fn record(source: Source, id: &str, name: &str, program: &str) -> CanonicalRecord {
        let mut r = CanonicalRecord::new(source, id, name, EntityType::Individual);
        r.add_program(program);
        r
    }

    #[test]
    fn test_merge_index_keeps_first_seen_order() {
        let mut index = MergeIndex::new();
        index.insert(record(Source::Un, "1", "A", "X"));
        index.insert(record(Source::Un, "2", "B", "X"));
        let mut dup = record(Source::Un, "1", "A", "Y");
        dup.source = "EU".into();
        index.insert(dup);

        assert_eq!(index.len(), 2);
        assert_eq!(index.merged(), 1);
        assert_eq!(index.records()[0].programs, vec!["X".to_string(), "Y".to_string()]);
        assert_eq!(index.records()[0].source, "UN,EU");
    }

    #[test]
    fn test_integrate_writes_both_unified_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        writer
            .write(&[record(Source::Un, "1", "Alpha", "DPRK")], Source::Un)
            .unwrap();
        writer
            .write(&[record(Source::Us, "7", "Bravo", "SDGT")], Source::Us)
            .unwrap();

        let report = IntegrationUseCase::new(writer)
            .integrate(&[Source::Un, Source::Us])
            .unwrap();

        assert_eq!(report.total_entries, 2);
        assert!(!report.degraded);
        assert_eq!(report.by_source.get("US-OFAC"), Some(&1));
        assert_eq!(report.by_type.get("INDIVIDUAL"), Some(&2));
        for file in [UNIFIED_FILE, INTEGRATED_FILE] {
            let doc: Document<UnifiedMeta> = read_document(&dir.path().join(file)).unwrap();
            assert_eq!(doc.meta.total_entries, 2);
            assert_eq!(doc.meta.sources, vec!["UN".to_string(), "US".to_string()]);
        }
    }

    #[test]
    fn test_missing_source_is_skipped_and_marks_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        writer
            .write(&[record(Source::Eu, "5", "Charlie", "RUS")], Source::Eu)
            .unwrap();

        let report = IntegrationUseCase::new(writer)
            .integrate(&[Source::Un, Source::Eu])
            .unwrap();

        assert!(report.degraded);
        assert_eq!(report.loaded_sources, vec![Source::Eu]);
        assert_eq!(report.total_entries, 1);
    }

    #[test]
    fn test_no_loaded_sources_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = IntegrationUseCase::new(writer(dir.path()))
            .integrate(&Source::ALL)
            .unwrap_err();
        assert!(matches!(err, IntegrationError::NoSources(_)));
        assert!(!dir.path().join(UNIFIED_FILE).exists());
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());
        std::fs::write(writer.source_path(Source::Un), b"{not json").unwrap();
        writer
            .write(&[record(Source::Us, "9", "Delta", "IRAN")], Source::Us)
            .unwrap();

        let report = IntegrationUseCase::new(writer)
            .integrate(&[Source::Un, Source::Us])
            .unwrap();
        assert_eq!(report.loaded_sources, vec![Source::Us]);
    }
}
