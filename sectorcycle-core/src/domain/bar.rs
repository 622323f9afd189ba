//! PriceBar: one daily observation of a sector index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::series::Observation;

/// Daily OHLCV bar for a sector index.
///
/// Index instruments report zero volume; the field is kept so the cached
/// artifact mirrors what the broker returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Returns true if the close is unusable for return calculations.
    pub fn is_void(&self) -> bool {
        !self.close.is_finite()
    }
}

impl Observation for PriceBar {
    fn date(&self) -> NaiveDate {
        self.date
    }
}
