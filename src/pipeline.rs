use crate::apis::{create_collector, valid_records, CollectOutcome};
use crate::app::integration_use_case::{IntegrationReport, IntegrationUseCase};
use crate::config::Config;
use crate::diagnostics::{DiagnosticReport, RunStatus};
use crate::error::{Result, SanctionsError};
use crate::ingest::{clean_temp_files, SourceFetcher};
use crate::storage::CanonicalWriter;
use crate::types::Source;
use metrics::{counter, histogram};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Parsing,
    Writing,
    Integrating,
    Done,
    PartialFailure,
}

/// Step at which a source's collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Write,
}

impl Stage {
    fn of(error: &SanctionsError) -> Self {
        match error {
            SanctionsError::Fetch(_) => Stage::Fetch,
            SanctionsError::Parse(_) => Stage::Parse,
            _ => Stage::Write,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Collected {
        records: usize,
        output_file: PathBuf,
        sha256: String,
    },
    Failed {
        stage: Stage,
        error: String,
    },
}

impl SourceOutcome {
    pub fn is_collected(&self) -> bool {
        matches!(self, SourceOutcome::Collected { .. })
    }
}

impl From<&CollectOutcome> for SourceOutcome {
    fn from(outcome: &CollectOutcome) -> Self {
        SourceOutcome::Collected {
            records: outcome.records,
            output_file: outcome.write.path.clone(),
            sha256: outcome.payload.sha256.clone(),
        }
    }
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcomes: BTreeMap<Source, SourceOutcome>,
    pub integration: Option<IntegrationReport>,
    pub integration_error: Option<String>,
    pub state: RunState,
    pub elapsed: Duration,
    pub diagnostic_file: Option<PathBuf>,
}

impl RunSummary {
    /// True when usable unified data was produced.
    pub fn is_success(&self) -> bool {
        self.integration.is_some()
    }

    pub fn collected_sources(&self) -> Vec<Source> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_collected())
            .map(|(source, _)| *source)
            .collect()
    }
}

pub struct Pipeline {
    config: Config,
    fetcher: SourceFetcher,
    writer: CanonicalWriter,
    state: RunState,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = SourceFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: Config, fetcher: SourceFetcher) -> Self {
        let writer = CanonicalWriter::new(&config);
        Self {
            config,
            fetcher,
            writer,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn writer(&self) -> &CanonicalWriter {
        &self.writer
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            info!("Run state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Fetch, parse and write each source in the order given.
    ///
    /// A failing source is recorded and the remaining sources still run.
    pub async fn collect_sources(&mut self, sources: &[Source]) -> BTreeMap<Source, SourceOutcome> {
        let mut outcomes = BTreeMap::new();
        for &source in sources {
            let span = info_span!("collect", source = %source);
            counter!("sanctions_collect_runs_total", "source" => source.tag()).increment(1);
            let started = Instant::now();

            let outcome = self.collect_one(source).instrument(span).await;
            histogram!("sanctions_collect_duration_seconds", "source" => source.tag())
                .record(started.elapsed().as_secs_f64());

            let outcome = match outcome {
                Ok(collected) => {
                    counter!("sanctions_records_written_total", "source" => source.tag())
                        .increment(collected.records as u64);
                    SourceOutcome::from(&collected)
                }
                Err(e) => {
                    let stage = Stage::of(&e);
                    error!("{} collection failed during {}: {}", source, stage, e);
                    counter!("sanctions_collect_failures_total", "source" => source.tag()).increment(1);
                    SourceOutcome::Failed {
                        stage,
                        error: e.to_string(),
                    }
                }
            };
            outcomes.insert(source, outcome);
        }
        outcomes
    }

    async fn collect_one(&mut self, source: Source) -> Result<CollectOutcome> {
        let collector = create_collector(source, &self.config.sources);

        self.transition(RunState::Fetching);
        let payload = collector.fetch(&self.fetcher).await?;

        self.transition(RunState::Parsing);
        let records = valid_records(collector.parse(&payload.bytes)?);
        info!("{} parsed {} records", source, records.len());

        self.transition(RunState::Writing);
        let write = collector.save(&self.writer, &records)?;

        Ok(CollectOutcome {
            source,
            records: records.len(),
            payload: (&payload).into(),
            write,
        })
    }

    #[instrument(skip(self))]
    pub fn integrate(&mut self, sources: &[Source]) -> Result<IntegrationReport> {
        self.transition(RunState::Integrating);
        let report = IntegrationUseCase::new(self.writer.clone()).integrate(sources)?;
        Ok(report)
    }

    /// Collect every source, join, integrate what was collected and write the diagnostic report.
    pub async fn run(&mut self, sources: &[Source]) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%run_id, "Starting sanctions run for {:?}", sources);
        counter!("sanctions_pipeline_runs_total").increment(1);

        let outcomes = self.collect_sources(sources).await;
        // Merge in the caller's order, not the map's.
        let collected: Vec<Source> = sources
            .iter()
            .copied()
            .filter(|s| outcomes.get(s).is_some_and(SourceOutcome::is_collected))
            .collect();

        let (integration, integration_error) = if collected.is_empty() {
            error!("No source was collected; skipping integration");
            (None, Some("no source was collected".to_string()))
        } else {
            match self.integrate(&collected) {
                Ok(report) => (Some(report), None),
                Err(e) => {
                    error!("Integration failed: {}", e);
                    (None, Some(e.to_string()))
                }
            }
        };

        let all_collected = collected.len() == sources.len();
        let state = if integration.is_some() && all_collected {
            RunState::Done
        } else {
            RunState::PartialFailure
        };
        self.transition(state);
        if state == RunState::PartialFailure && integration.is_some() {
            warn!(
                "Run finished degraded: {} of {} sources collected",
                collected.len(),
                sources.len()
            );
        }

        let elapsed = started.elapsed();
        histogram!("sanctions_pipeline_duration_seconds").record(elapsed.as_secs_f64());
        let status = if integration.is_some() {
            RunStatus::Success
        } else {
            RunStatus::Failure
        };
        let report = DiagnosticReport::collect(
            &self.writer,
            run_id,
            &collected,
            elapsed,
            status,
            integration.as_ref().map(|r| r.total_entries),
        );
        let diagnostic_file = match report.write(self.writer.output_dir()) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to write diagnostic report: {}", e);
                None
            }
        };

        clean_temp_files(&self.config.temp_dir);

        info!(%run_id, "Run finished in {:.2}s with state {:?}", elapsed.as_secs_f64(), state);
        RunSummary {
            run_id,
            outcomes,
            integration,
            integration_error,
            state,
            elapsed,
            diagnostic_file,
        }
    }
}
