//! Pipeline: credential → macro series → sector series → analytics → report.
//!
//! Fatal conditions (missing credential, no macro data, no sector data,
//! instrument lookup failure) return [`PipelineError`]. Everything else is
//! logged, recorded as a [`StageNote`] and the run carries on.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use sectorcycle_core::analysis::{
    analyze, classify, correlation_matrix, current_phase, last_two_growth, momentum,
    quarterly_returns, recommend,
};
use sectorcycle_core::data::{
    ChunkPolicy, CredentialSource, DataError, DateRange, FetchOutcome, FetchProgress,
    InstrumentCatalog, MacroDataProvider, SectorConnector, SectorDataProvider, SeriesCache,
};
use sectorcycle_core::domain::{MacroObservation, PriceBar, TimeSeries};

use crate::config::{AnalysisConfig, ConfigError, SectorConfig};
use crate::report::{AnalysisReport, FetchRecord, FetchSource, Stage, StageNote, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no access token: {0}")]
    MissingCredential(#[source] DataError),
    #[error("no data for macro series '{series_id}'")]
    NoMacroData { series_id: String },
    #[error("no sector produced any data")]
    NoSectorData,
    #[error("instrument lookup failed: {0}")]
    InstrumentLookup(#[source] DataError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// External collaborators the pipeline talks to.
pub struct Collaborators<'a> {
    pub credentials: &'a dyn CredentialSource,
    pub sectors: &'a dyn SectorConnector,
    pub macro_data: &'a dyn MacroDataProvider,
    pub progress: &'a dyn FetchProgress,
}

pub struct Pipeline<'a> {
    config: AnalysisConfig,
    collaborators: Collaborators<'a>,
    cache: SeriesCache,
    today: NaiveDate,
}

struct SectorSeries {
    name: String,
    bars: TimeSeries<PriceBar>,
}

fn fetch_record<T>(key: &str, outcome: &FetchOutcome<T>) -> FetchRecord {
    let (source, chunks) = match outcome {
        FetchOutcome::Cached(_) => (FetchSource::Cached, 0),
        FetchOutcome::Fetched { chunks, .. } => (FetchSource::Fetched, *chunks),
        FetchOutcome::Empty { chunks, .. } => (FetchSource::Empty, *chunks),
    };
    FetchRecord {
        key: key.to_string(),
        source,
        rows: outcome.series().map_or(0, |s| s.len()),
        chunks,
        failed_chunks: outcome.failed_chunks().to_vec(),
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(config: AnalysisConfig, collaborators: Collaborators<'a>) -> Self {
        let cache = SeriesCache::new(&config.cache_dir);
        Self {
            config,
            collaborators,
            cache,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Date used when the config leaves `end_date` open.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self) -> Result<AnalysisReport, PipelineError> {
        self.config.validate()?;
        let span = self.config.span(self.today)?;
        let mut notes = Vec::new();
        let mut fetches = Vec::new();

        let token = self
            .collaborators
            .credentials
            .current_access_token()
            .map_err(PipelineError::MissingCredential)?;
        info!(%span, "credential available, starting analysis");

        let macro_series = self.fetch_macro(span, &mut fetches)?;
        let provider = self.collaborators.sectors.connect(&token)?;

        let sectors = self.fetch_sectors(provider.as_ref(), span, &mut fetches, &mut notes)?;
        if sectors.is_empty() {
            return Err(PipelineError::NoSectorData);
        }

        let phases = classify(&macro_series);
        let window = self.config.momentum_window;

        let mut returns = Vec::with_capacity(sectors.len());
        let mut momenta = BTreeMap::new();
        for s in &sectors {
            returns.push((s.name.clone(), quarterly_returns(&s.name, s.bars.rows())));
            momenta.insert(s.name.clone(), momentum(s.bars.rows(), window));
        }

        let summary = analyze(&returns, &phases);
        for perf in summary.iter() {
            if perf.by_phase.is_empty() {
                warn!(sector = %perf.sector, "no quarterly returns overlap the macro series");
                notes.push(StageNote {
                    stage: Stage::Analyze,
                    message: format!("{}: no returns aligned with any phase", perf.sector),
                });
            } else if perf.unmatched > 0 {
                info!(sector = %perf.sector, unmatched = perf.unmatched, "returns without a phase excluded");
            }
        }

        let correlation_input: Vec<(String, &[PriceBar])> = sectors
            .iter()
            .map(|s| (s.name.clone(), s.bars.rows()))
            .collect();
        let correlation = correlation_matrix(&correlation_input);

        let growth = last_two_growth(macro_series.rows());
        let recommendation = match recommend(&summary, &momenta, growth) {
            Ok(rec) => {
                info!(phase = %rec.current_phase, picks = rec.sectors.len(), "recommendation ready");
                Some(rec)
            }
            Err(e) => {
                warn!(error = %e, "no recommendation produced");
                notes.push(StageNote {
                    stage: Stage::Recommend,
                    message: format!("no recommendation produced: {e}"),
                });
                None
            }
        };

        let report = AnalysisReport {
            schema_version: SCHEMA_VERSION,
            span,
            macro_series_id: self.config.macro_series.id.clone(),
            momentum_window: window,
            current_phase: current_phase(growth),
            phases,
            summary,
            momentum: momenta,
            recommendation,
            correlation,
            fetches,
            notes,
            fingerprint: String::new(),
        };
        Ok(report.seal())
    }

    fn fetch_macro(
        &self,
        span: DateRange,
        fetches: &mut Vec<FetchRecord>,
    ) -> Result<TimeSeries<MacroObservation>, PipelineError> {
        let series_id = &self.config.macro_series.id;
        let key = self.config.macro_cache_key();

        let outcome = self.cache.get_or_fetch(
            &key,
            span,
            &ChunkPolicy::single_request(span),
            |range| self.collaborators.macro_data.fetch_series(series_id, range),
            self.collaborators.progress,
        )?;
        fetches.push(fetch_record(&key, &outcome));

        let series = outcome.into_series();
        if series.is_empty() {
            return Err(PipelineError::NoMacroData {
                series_id: series_id.clone(),
            });
        }
        info!(series_id = %series_id, rows = series.len(), "macro series ready");
        Ok(series)
    }

    /// Token for a sector, from config or the catalog. The catalog is
    /// fetched at most once and only when a lookup is needed.
    fn instrument_token(
        &self,
        provider: &dyn SectorDataProvider,
        catalog: &mut Option<InstrumentCatalog>,
        sector: &SectorConfig,
    ) -> Result<Option<u64>, PipelineError> {
        if let Some(token) = sector.instrument_token {
            return Ok(Some(token));
        }
        if catalog.is_none() {
            let exchange = &self.config.broker.exchange;
            let loaded = provider
                .instrument_catalog(exchange)
                .map_err(PipelineError::InstrumentLookup)?;
            info!(exchange = %exchange, instruments = loaded.len(), "instrument catalog loaded");
            *catalog = Some(loaded);
        }
        Ok(catalog.as_ref().and_then(|c| c.resolve_index(&sector.symbol)))
    }

    fn fetch_sectors(
        &self,
        provider: &dyn SectorDataProvider,
        span: DateRange,
        fetches: &mut Vec<FetchRecord>,
        notes: &mut Vec<StageNote>,
    ) -> Result<Vec<SectorSeries>, PipelineError> {
        let policy = self.config.chunk_policy();
        let mut catalog: Option<InstrumentCatalog> = None;
        let mut out = Vec::new();

        for sector in &self.config.sectors {
            let key = sector.cache_key();

            // A cached series needs no instrument token.
            let token = if self.cache.contains(&key) {
                sector.instrument_token.unwrap_or_default()
            } else {
                match self.instrument_token(provider, &mut catalog, sector)? {
                    Some(token) => token,
                    None => {
                        warn!(sector = %sector.name, symbol = %sector.symbol, "instrument not found, skipping");
                        notes.push(StageNote {
                            stage: Stage::Resolve,
                            message: format!(
                                "{}: no index instrument '{}' on {}",
                                sector.name, sector.symbol, self.config.broker.exchange
                            ),
                        });
                        continue;
                    }
                }
            };

            let result = self.cache.get_or_fetch(
                &key,
                span,
                &policy,
                |range| provider.fetch_chunk(token, range, &self.config.interval),
                self.collaborators.progress,
            );

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(sector = %sector.name, error = %e, "sector series unavailable");
                    notes.push(StageNote {
                        stage: Stage::Fetch,
                        message: format!("{}: {e}", sector.name),
                    });
                    continue;
                }
            };

            fetches.push(fetch_record(&key, &outcome));
            for failure in outcome.failed_chunks() {
                notes.push(StageNote {
                    stage: Stage::Fetch,
                    message: format!("{}: chunk {} skipped: {}", sector.name, failure.range, failure.reason),
                });
            }

            let bars = outcome.into_series();
            if bars.is_empty() {
                notes.push(StageNote {
                    stage: Stage::Fetch,
                    message: format!("{}: no data", sector.name),
                });
                continue;
            }

            info!(sector = %sector.name, rows = bars.len(), "sector series ready");
            out.push(SectorSeries {
                name: sector.name.clone(),
                bars,
            });
        }

        Ok(out)
    }
}
