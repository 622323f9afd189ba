//! Macro observations (GDP levels) and their phase-labelled form.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::phase::Phase;
use super::series::Observation;

/// One release of a macro series: the raw level and the growth versus the
/// previous release, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroObservation {
    pub date: NaiveDate,
    pub level: f64,
    pub growth_rate: Option<f64>,
}

impl MacroObservation {
    /// A raw level as returned by a provider, growth not yet derived.
    pub fn new(date: NaiveDate, level: f64) -> Self {
        Self {
            date,
            level,
            growth_rate: None,
        }
    }
}

impl Observation for MacroObservation {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// Fill `growth_rate` as the percent change from the previous level.
///
/// The first row, rows following a non-finite or zero level, and rows whose
/// own level is non-finite get `None`.
pub fn derive_growth_rates(rows: &mut [MacroObservation]) {
    let mut previous: Option<f64> = None;
    for row in rows.iter_mut() {
        row.growth_rate = match previous {
            Some(prev) if prev.is_finite() && prev != 0.0 && row.level.is_finite() => {
                Some((row.level / prev - 1.0) * 100.0)
            }
            _ => None,
        };
        previous = Some(row.level);
    }
}

/// A macro observation with its phase label attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasedObservation {
    pub date: NaiveDate,
    pub level: f64,
    pub growth_rate: Option<f64>,
    pub phase: Phase,
}

impl Observation for PhasedObservation {
    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(month: u32, level: f64) -> MacroObservation {
        MacroObservation::new(NaiveDate::from_ymd_opt(2020, month, 1).unwrap(), level)
    }

    #[test]
    fn first_growth_is_undefined() {
        let mut rows = vec![obs(1, 100.0), obs(4, 110.0)];
        derive_growth_rates(&mut rows);
        assert_eq!(rows[0].growth_rate, None);
        let g = rows[1].growth_rate.unwrap();
        assert!((g - 10.0).abs() < 1e-9);
    }

    #[test]
    fn negative_growth() {
        let mut rows = vec![obs(1, 200.0), obs(4, 150.0)];
        derive_growth_rates(&mut rows);
        let g = rows[1].growth_rate.unwrap();
        assert!((g + 25.0).abs() < 1e-9);
    }

    #[test]
    fn zero_or_nan_base_yields_none() {
        let mut rows = vec![obs(1, 0.0), obs(4, 10.0), obs(7, f64::NAN), obs(10, 12.0)];
        derive_growth_rates(&mut rows);
        assert_eq!(rows[1].growth_rate, None);
        assert_eq!(rows[2].growth_rate, None);
        assert_eq!(rows[3].growth_rate, None);
    }
}
