//! Collaborator traits and structured error types for the data layer.
//!
//! Providers are opaque sources of time-series rows. The cache sits above
//! these traits; providers know nothing about chunking or persistence.

use chrono::NaiveDate;
use thiserror::Error;

use super::auth::AccessToken;
use super::chunker::DateRange;
use super::instruments::InstrumentCatalog;
use crate::domain::{MacroObservation, PriceBar};

/// Structured error types for data operations.
///
/// These are displayable as-is in the CLI.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid chunk size: max_chunk_days must be at least 1")]
    InvalidChunkSize,

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("HTTP {status} from {provider}: {body}")]
    HttpStatus {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no cached data for '{key}'")]
    NoCachedData { key: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Source of the brokerage access credential.
///
/// The login flow that mints the token lives outside this crate; all the
/// pipeline needs is the current value. An `Err` means "absent" and carries
/// the operator-facing reason.
pub trait CredentialSource {
    fn current_access_token(&self) -> Result<AccessToken, DataError>;
}

/// Provider of daily sector index bars, one chunk per call.
pub trait SectorDataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Instrument listing for an exchange, used to resolve index symbols.
    fn instrument_catalog(&self, exchange: &str) -> Result<InstrumentCatalog, DataError>;

    /// Fetch bars for one instrument over one chunk of the requested span.
    fn fetch_chunk(
        &self,
        instrument_token: u64,
        range: DateRange,
        interval: &str,
    ) -> Result<Vec<PriceBar>, DataError>;
}

/// Builds an authenticated [`SectorDataProvider`] once a token is available.
pub trait SectorConnector {
    fn connect(&self, token: &AccessToken) -> Result<Box<dyn SectorDataProvider>, DataError>;
}

/// Provider of macro series levels (GDP).
pub trait MacroDataProvider {
    fn name(&self) -> &str;

    /// Raw levels only; growth rates are derived after the rows are merged.
    fn fetch_series(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<MacroObservation>, DataError>;
}

/// Progress callback for cached fetches.
pub trait FetchProgress {
    /// A persisted artifact satisfied the request.
    fn on_cache_hit(&self, key: &str, rows: usize);

    /// One chunk finished, successfully (row count) or not.
    fn on_chunk(
        &self,
        key: &str,
        index: usize,
        total: usize,
        range: DateRange,
        result: Result<usize, &DataError>,
    );

    /// All chunks of a cold fetch are done.
    fn on_fetch_complete(&self, key: &str, rows: usize, failed_chunks: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_cache_hit(&self, key: &str, rows: usize) {
        println!("  cached: {key} ({rows} rows)");
    }

    fn on_chunk(
        &self,
        key: &str,
        index: usize,
        total: usize,
        range: DateRange,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(rows) => println!("  [{}/{}] {key} {range}: {rows} rows", index + 1, total),
            Err(e) => println!("  [{}/{}] {key} {range}: FAIL: {e}", index + 1, total),
        }
    }

    fn on_fetch_complete(&self, key: &str, rows: usize, failed_chunks: usize) {
        if rows == 0 {
            println!("  no data fetched for {key}");
        } else if failed_chunks > 0 {
            println!("  fetched {key}: {rows} rows ({failed_chunks} chunk(s) failed)");
        } else {
            println!("  fetched {key}: {rows} rows");
        }
    }
}

/// Progress reporter that discards everything.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_cache_hit(&self, _key: &str, _rows: usize) {}

    fn on_chunk(
        &self,
        _key: &str,
        _index: usize,
        _total: usize,
        _range: DateRange,
        _result: Result<usize, &DataError>,
    ) {
    }

    fn on_fetch_complete(&self, _key: &str, _rows: usize, _failed_chunks: usize) {}
}
