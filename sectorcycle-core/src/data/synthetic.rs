//! Offline provider with seeded random-walk data.
//!
//! Every value is a pure function of `(seed, instrument, date)`, so a span
//! fetched in one request or in many chunks yields identical rows. Used by
//! `--synthetic` runs and by tests that need realistic volume without the
//! network.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::auth::AccessToken;
use super::chunker::DateRange;
use super::instruments::{Instrument, InstrumentCatalog, INDICES_SEGMENT};
use super::provider::{DataError, MacroDataProvider, SectorConnector, SectorDataProvider};
use crate::domain::{MacroObservation, PriceBar, Quarter};

/// First token handed out by the synthetic catalog.
pub const SYNTHETIC_TOKEN_BASE: u64 = 1000;

/// Walks start here; dates before it produce no rows.
fn origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    symbols: Vec<String>,
}

impl SyntheticProvider {
    pub fn new(seed: u64, symbols: Vec<String>) -> Self {
        Self { seed, symbols }
    }

    fn sub_seed(&self, stream: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(stream.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn token_of(&self, index: usize) -> u64 {
        SYNTHETIC_TOKEN_BASE + index as u64
    }

    fn symbol_for_token(&self, token: u64) -> Option<&str> {
        let index = token.checked_sub(SYNTHETIC_TOKEN_BASE)?;
        self.symbols.get(usize::try_from(index).ok()?).map(String::as_str)
    }

    /// Weekday bars from the origin to `range.end`, keeping those in `range`.
    fn walk_bars(&self, symbol: &str, range: DateRange) -> Vec<PriceBar> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(symbol));
        let drift: f64 = rng.gen_range(-0.0002..0.0008);
        let vol: f64 = rng.gen_range(0.008..0.02);
        let mut close: f64 = rng.gen_range(2_000.0..40_000.0);

        let mut bars = Vec::new();
        let mut date = origin();
        while date <= range.end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let open = close;
                let shock: f64 = rng.gen_range(-1.0..1.0);
                close = (open * (1.0 + drift + vol * shock)).max(1.0);
                let wick: f64 = rng.gen_range(0.0..vol);

                if range.contains(date) {
                    bars.push(PriceBar {
                        date,
                        open,
                        high: open.max(close) * (1.0 + wick),
                        low: open.min(close) * (1.0 - wick),
                        close,
                        volume: 0,
                    });
                }
            }
            date += Duration::days(1);
        }
        bars
    }

    /// Quarterly levels stamped at quarter start, with an occasional
    /// contraction so both phases show up.
    fn walk_levels(&self, series_id: &str, range: DateRange) -> Vec<MacroObservation> {
        let mut rng = StdRng::seed_from_u64(self.sub_seed(series_id));
        let mut level = 1.0e7;
        let mut rows = Vec::new();
        let mut quarter = Quarter::containing(origin());

        while quarter.start_date() <= range.end {
            let date = quarter.start_date();
            if range.contains(date) {
                rows.push(MacroObservation::new(date, level));
            }
            let growth: f64 = if rng.gen_bool(0.3) {
                rng.gen_range(-0.06..0.0)
            } else {
                rng.gen_range(0.0..0.05)
            };
            level *= 1.0 + growth;
            quarter = quarter.next();
        }
        rows
    }
}

impl SectorDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn instrument_catalog(&self, exchange: &str) -> Result<InstrumentCatalog, DataError> {
        let instruments = self
            .symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| Instrument {
                instrument_token: self.token_of(i),
                tradingsymbol: symbol.clone(),
                name: symbol.clone(),
                segment: INDICES_SEGMENT.to_string(),
                exchange: exchange.to_string(),
            })
            .collect();
        Ok(InstrumentCatalog::new(instruments))
    }

    fn fetch_chunk(
        &self,
        instrument_token: u64,
        range: DateRange,
        _interval: &str,
    ) -> Result<Vec<PriceBar>, DataError> {
        let symbol = self
            .symbol_for_token(instrument_token)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: instrument_token.to_string(),
            })?;
        Ok(self.walk_bars(symbol, range))
    }
}

impl SectorConnector for SyntheticProvider {
    fn connect(&self, _token: &AccessToken) -> Result<Box<dyn SectorDataProvider>, DataError> {
        Ok(Box::new(self.clone()))
    }
}

impl MacroDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_series(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<MacroObservation>, DataError> {
        Ok(self.walk_levels(series_id, range))
    }
}
