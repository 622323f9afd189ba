//! Integration tests for the analysis pipeline, using the synthetic provider
//! and hand-rolled failing collaborators.

use chrono::{Datelike, NaiveDate};
use std::cell::Cell;
use std::path::Path;

use sectorcycle_core::data::{
    AccessToken, DataError, DateRange, InstrumentCatalog, MacroDataProvider, SectorConnector,
    SectorDataProvider, SilentProgress, StaticToken, SyntheticProvider,
};
use sectorcycle_core::domain::{MacroObservation, PriceBar, Quarter};
use sectorcycle_runner::{
    load_report, save_report, AnalysisConfig, Collaborators, FetchSource, Pipeline, PipelineError,
    SectorConfig, Stage,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn symbols() -> Vec<String> {
    vec!["NIFTY BANK".into(), "NIFTY IT".into(), "NIFTY AUTO".into()]
}

fn test_config(cache_dir: &Path) -> AnalysisConfig {
    let mut config = AnalysisConfig::default_nse();
    config.start_date = d(2010, 1, 1);
    config.end_date = Some(d(2020, 12, 31));
    config.cache_dir = cache_dir.to_path_buf();
    config.fetch.chunk_delay_ms = 0;
    config.sectors = vec![
        SectorConfig::new("Bank", "NIFTY BANK"),
        SectorConfig::new("IT", "NIFTY IT"),
        SectorConfig::new("Auto", "NIFTY AUTO"),
    ];
    config
}

fn token() -> StaticToken {
    StaticToken::new(Some(AccessToken::new("test-token")))
}

fn run_synthetic(config: AnalysisConfig) -> Result<sectorcycle_runner::AnalysisReport, PipelineError> {
    let provider = SyntheticProvider::new(42, symbols());
    let credentials = token();
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &provider,
        macro_data: &provider,
        progress: &SilentProgress,
    };
    Pipeline::new(config, collaborators).run()
}

// ── Fakes ────────────────────────────────────────────────────────────

struct CountingMacro {
    inner: SyntheticProvider,
    calls: Cell<usize>,
}

impl MacroDataProvider for CountingMacro {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch_series(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<MacroObservation>, DataError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.fetch_series(series_id, range)
    }
}

struct EmptyMacro;

impl MacroDataProvider for EmptyMacro {
    fn name(&self) -> &str {
        "empty"
    }

    fn fetch_series(&self, _: &str, _: DateRange) -> Result<Vec<MacroObservation>, DataError> {
        Ok(Vec::new())
    }
}

/// Synthetic sectors where one instrument always fails, and optionally the
/// catalog too.
#[derive(Clone)]
struct FlakySectors {
    inner: SyntheticProvider,
    failing_symbols: Vec<String>,
    catalog_down: bool,
}

impl SectorDataProvider for FlakySectors {
    fn name(&self) -> &str {
        "flaky"
    }

    fn instrument_catalog(&self, exchange: &str) -> Result<InstrumentCatalog, DataError> {
        if self.catalog_down {
            return Err(DataError::NetworkUnreachable("catalog offline".into()));
        }
        self.inner.instrument_catalog(exchange)
    }

    fn fetch_chunk(
        &self,
        instrument_token: u64,
        range: DateRange,
        interval: &str,
    ) -> Result<Vec<PriceBar>, DataError> {
        let catalog = self.inner.instrument_catalog("NSE")?;
        let failing = self
            .failing_symbols
            .iter()
            .any(|s| catalog.resolve_index(s) == Some(instrument_token));
        if failing {
            return Err(DataError::HttpStatus {
                provider: "flaky".into(),
                status: 500,
                body: "internal error".into(),
            });
        }
        self.inner.fetch_chunk(instrument_token, range, interval)
    }
}

impl SectorConnector for FlakySectors {
    fn connect(&self, _token: &AccessToken) -> Result<Box<dyn SectorDataProvider>, DataError> {
        Ok(Box::new(self.clone()))
    }
}

/// One bar per quarter end, alternating between a subnormal and a huge
/// close, so every other quarterly return overflows to infinity.
struct SpikySectors;

impl SectorDataProvider for SpikySectors {
    fn name(&self) -> &str {
        "spiky"
    }

    fn instrument_catalog(&self, _exchange: &str) -> Result<InstrumentCatalog, DataError> {
        Ok(InstrumentCatalog::new(Vec::new()))
    }

    fn fetch_chunk(
        &self,
        _instrument_token: u64,
        range: DateRange,
        _interval: &str,
    ) -> Result<Vec<PriceBar>, DataError> {
        let mut bars = Vec::new();
        let mut quarter = Quarter::containing(range.start);
        while quarter.start_date() <= range.end {
            let date = quarter.end_date();
            if range.contains(date) {
                let close = if (date.year() * 4 + date.month() as i32 / 3) % 2 == 0 {
                    1e-320
                } else {
                    1e300
                };
                bars.push(PriceBar {
                    date,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 0,
                });
            }
            quarter = quarter.next();
        }
        Ok(bars)
    }
}

impl SectorConnector for SpikySectors {
    fn connect(&self, _token: &AccessToken) -> Result<Box<dyn SectorDataProvider>, DataError> {
        Ok(Box::new(SpikySectors))
    }
}

fn run_flaky(config: AnalysisConfig, sectors: FlakySectors) -> Result<sectorcycle_runner::AnalysisReport, PipelineError> {
    let macro_data = SyntheticProvider::new(42, vec![]);
    let credentials = token();
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &sectors,
        macro_data: &macro_data,
        progress: &SilentProgress,
    };
    Pipeline::new(config, collaborators).run()
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn synthetic_run_produces_full_report() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_synthetic(test_config(dir.path())).unwrap();

    assert_eq!(report.phases.len(), 44);
    assert_eq!(report.summary.len(), 3);
    assert_eq!(report.momentum.len(), 3);
    assert!(report.notes.is_empty(), "unexpected notes: {:?}", report.notes);
    assert_eq!(report.correlation.sectors, vec!["Bank", "IT", "Auto"]);
    assert_eq!(report.fingerprint, report.compute_fingerprint());

    let rec = report.recommendation.as_ref().unwrap();
    assert_eq!(rec.current_phase, report.current_phase);
    assert_eq!(rec.scorecard.len(), 3);

    // 4018 days at 2000 per chunk.
    let bank = report.fetches.iter().find(|f| f.key == "sector_Bank").unwrap();
    assert_eq!(bank.source, FetchSource::Fetched);
    assert_eq!(bank.chunks, 3);
}

#[test]
fn populated_cache_gives_byte_identical_artifacts() {
    let cache = tempfile::tempdir().unwrap();
    let out_a = tempfile::tempdir().unwrap();
    let out_b = tempfile::tempdir().unwrap();

    let cold = run_synthetic(test_config(cache.path())).unwrap();
    let warm_a = run_synthetic(test_config(cache.path())).unwrap();
    let warm_b = run_synthetic(test_config(cache.path())).unwrap();

    // CSV round trip preserves every value.
    assert_eq!(cold.fingerprint, warm_a.fingerprint);
    assert!(warm_a.fetches.iter().all(|f| f.source == FetchSource::Cached));

    save_report(&warm_a, out_a.path()).unwrap();
    save_report(&warm_b, out_b.path()).unwrap();
    for file in ["report.json", "performance.csv", "scorecard.csv"] {
        let a = std::fs::read(out_a.path().join(file)).unwrap();
        let b = std::fs::read(out_b.path().join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between runs");
    }

    let loaded = load_report(out_a.path()).unwrap();
    assert_eq!(loaded.fingerprint, warm_a.fingerprint);
}

#[test]
fn warm_run_needs_no_network() {
    let cache = tempfile::tempdir().unwrap();
    run_synthetic(test_config(cache.path())).unwrap();

    let macro_data = CountingMacro {
        inner: SyntheticProvider::new(42, vec![]),
        calls: Cell::new(0),
    };
    let sectors = FlakySectors {
        inner: SyntheticProvider::new(42, symbols()),
        failing_symbols: symbols(),
        catalog_down: true,
    };
    let credentials = token();
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &sectors,
        macro_data: &macro_data,
        progress: &SilentProgress,
    };

    let report = Pipeline::new(test_config(cache.path()), collaborators).run().unwrap();
    assert_eq!(macro_data.calls.get(), 0);
    assert_eq!(report.summary.len(), 3);
}

#[test]
fn missing_credential_halts_before_any_fetch() {
    let cache = tempfile::tempdir().unwrap();
    let macro_data = CountingMacro {
        inner: SyntheticProvider::new(42, vec![]),
        calls: Cell::new(0),
    };
    let sectors = SyntheticProvider::new(42, symbols());
    let credentials = StaticToken::new(None);
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &sectors,
        macro_data: &macro_data,
        progress: &SilentProgress,
    };

    let err = Pipeline::new(test_config(cache.path()), collaborators)
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingCredential(_)));
    assert_eq!(macro_data.calls.get(), 0);
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[test]
fn empty_macro_series_is_fatal() {
    let cache = tempfile::tempdir().unwrap();
    let sectors = SyntheticProvider::new(42, symbols());
    let credentials = token();
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &sectors,
        macro_data: &EmptyMacro,
        progress: &SilentProgress,
    };

    match Pipeline::new(test_config(cache.path()), collaborators).run() {
        Err(PipelineError::NoMacroData { series_id }) => assert_eq!(series_id, "NGDPRNSAXDCINQ"),
        other => panic!("expected NoMacroData, got {other:?}"),
    }
}

#[test]
fn failing_sector_is_skipped_with_a_note() {
    let cache = tempfile::tempdir().unwrap();
    let sectors = FlakySectors {
        inner: SyntheticProvider::new(42, symbols()),
        failing_symbols: vec!["NIFTY IT".into()],
        catalog_down: false,
    };

    let report = run_flaky(test_config(cache.path()), sectors).unwrap();
    let names: Vec<&str> = report.summary.iter().map(|s| s.sector.as_str()).collect();
    assert_eq!(names, vec!["Bank", "Auto"]);

    let it = report.fetches.iter().find(|f| f.key == "sector_IT").unwrap();
    assert_eq!(it.source, FetchSource::Empty);
    assert_eq!(it.failed_chunks.len(), 3);
    assert!(report
        .notes_for(Stage::Fetch)
        .any(|n| n.message == "IT: no data"));
    assert!(!cache.path().join("sector_IT.csv").exists());
}

#[test]
fn no_sector_data_is_fatal() {
    let cache = tempfile::tempdir().unwrap();
    let sectors = FlakySectors {
        inner: SyntheticProvider::new(42, symbols()),
        failing_symbols: symbols(),
        catalog_down: false,
    };
    assert!(matches!(
        run_flaky(test_config(cache.path()), sectors),
        Err(PipelineError::NoSectorData)
    ));
}

#[test]
fn unresolved_symbol_is_dropped() {
    let cache = tempfile::tempdir().unwrap();
    let mut config = test_config(cache.path());
    config.sectors.push(SectorConfig::new("Metal", "NIFTY METAL"));

    let report = run_synthetic(config).unwrap();
    assert_eq!(report.summary.len(), 3);
    let notes: Vec<_> = report.notes_for(Stage::Resolve).collect();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.contains("NIFTY METAL"));
}

#[test]
fn catalog_failure_is_fatal() {
    let cache = tempfile::tempdir().unwrap();
    let sectors = FlakySectors {
        inner: SyntheticProvider::new(42, symbols()),
        failing_symbols: vec![],
        catalog_down: true,
    };
    assert!(matches!(
        run_flaky(test_config(cache.path()), sectors),
        Err(PipelineError::InstrumentLookup(_))
    ));
}

#[test]
fn explicit_token_skips_catalog() {
    let cache = tempfile::tempdir().unwrap();
    let mut config = test_config(cache.path());
    config.sectors = vec![SectorConfig {
        name: "Bank".into(),
        symbol: "NIFTY BANK".into(),
        instrument_token: Some(1000),
    }];
    let sectors = FlakySectors {
        inner: SyntheticProvider::new(42, symbols()),
        failing_symbols: vec![],
        catalog_down: true,
    };

    let report = run_flaky(config, sectors).unwrap();
    assert_eq!(report.summary.len(), 1);
}

#[test]
fn open_end_date_uses_run_date() {
    let cache = tempfile::tempdir().unwrap();
    let mut config = test_config(cache.path());
    config.end_date = None;

    let provider = SyntheticProvider::new(42, symbols());
    let credentials = token();
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &provider,
        macro_data: &provider,
        progress: &SilentProgress,
    };
    let report = Pipeline::new(config, collaborators)
        .with_today(d(2012, 6, 30))
        .run()
        .unwrap();
    assert_eq!(report.span.end, d(2012, 6, 30));
    assert_eq!(report.phases.len(), 10);
}

#[test]
fn ranking_failure_keeps_earlier_output() {
    let cache = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let mut config = test_config(cache.path());
    config.sectors = vec![SectorConfig {
        name: "Bank".into(),
        symbol: "NIFTY BANK".into(),
        instrument_token: Some(1),
    }];

    let macro_data = SyntheticProvider::new(42, vec![]);
    let credentials = token();
    let collaborators = Collaborators {
        credentials: &credentials,
        sectors: &SpikySectors,
        macro_data: &macro_data,
        progress: &SilentProgress,
    };
    let report = Pipeline::new(config, collaborators).run().unwrap();

    assert!(report.recommendation.is_none());
    assert_eq!(report.phases.len(), 44);
    assert_eq!(report.summary.len(), 1);
    let notes: Vec<_> = report.notes_for(Stage::Recommend).collect();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.starts_with("no recommendation produced"));

    // A scorecard from an earlier run must not survive.
    let stale = out.path().join("scorecard.csv");
    std::fs::write(&stale, "sector,qualified\nBank,true\n").unwrap();
    save_report(&report, out.path()).unwrap();
    assert!(!stale.exists());
    assert!(out.path().join("performance.csv").exists());
}
