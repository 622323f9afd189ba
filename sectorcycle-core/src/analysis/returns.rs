//! Quarterly returns and trailing momentum from daily closes.
//!
//! Returns are fractions: `0.10` is a 10% gain.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{PriceBar, Quarter};

/// Change of the last close in a quarter versus the last close of the
/// previous observed quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyReturn {
    pub sector: String,
    pub quarter_end: NaiveDate,
    pub value: f64,
}

/// Last finite close per calendar quarter, in quarter order.
fn quarter_closes(bars: &[PriceBar]) -> Vec<(Quarter, f64)> {
    let mut closes: Vec<(Quarter, f64)> = Vec::new();
    for bar in bars.iter().filter(|b| !b.is_void()) {
        let quarter = Quarter::containing(bar.date);
        match closes.last_mut() {
            Some((q, close)) if *q == quarter => *close = bar.close,
            _ => closes.push((quarter, bar.close)),
        }
    }
    closes
}

/// Resample to quarter ends and take the change between consecutive
/// observed quarters. The first quarter has no base and is dropped.
///
/// `bars` must be sorted by date, which [`TimeSeries`](crate::domain::TimeSeries)
/// guarantees.
pub fn quarterly_returns(sector: &str, bars: &[PriceBar]) -> Vec<QuarterlyReturn> {
    quarter_closes(bars)
        .windows(2)
        .filter_map(|pair| {
            let (_, base) = pair[0];
            let (quarter, close) = pair[1];
            if base == 0.0 {
                return None;
            }
            Some(QuarterlyReturn {
                sector: sector.to_string(),
                quarter_end: quarter.end_date(),
                value: close / base - 1.0,
            })
        })
        .collect()
}

/// Change between the latest close and the close `window` observations
/// earlier. Zero when there is not enough history or the base is unusable.
pub fn momentum(bars: &[PriceBar], window: usize) -> f64 {
    let n = bars.len();
    if window == 0 || n < window + 1 {
        return 0.0;
    }
    let base = bars[n - 1 - window].close;
    let last = bars[n - 1].close;
    if !base.is_finite() || !last.is_finite() || base == 0.0 {
        return 0.0;
    }
    last / base - 1.0
}

/// Close-to-close daily changes keyed by the later date.
pub fn daily_returns(bars: &[PriceBar]) -> Vec<(NaiveDate, f64)> {
    bars.windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            if prev.is_void() || curr.is_void() || prev.close == 0.0 {
                None
            } else {
                Some((curr.date, curr.close / prev.close - 1.0))
            }
        })
        .collect()
}
