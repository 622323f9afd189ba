//! Phase classification from macro growth.
//!
//! An observation is a recession when its growth and the immediately
//! preceding growth are both negative. Missing growth never counts as
//! negative, so the first observation is always an expansion.

use crate::domain::{MacroObservation, Phase, PhasedObservation, TimeSeries};

/// The two-observation rule shared by history labelling and current-phase
/// detection.
pub fn phase_for_pair(previous: Option<f64>, current: Option<f64>) -> Phase {
    match (previous, current) {
        (Some(p), Some(c)) if p < 0.0 && c < 0.0 => Phase::Recession,
        _ => Phase::Expansion,
    }
}

/// Label every observation with its phase.
pub fn classify(series: &TimeSeries<MacroObservation>) -> Vec<PhasedObservation> {
    let mut previous: Option<f64> = None;
    series
        .iter()
        .map(|obs| {
            let phase = phase_for_pair(previous, obs.growth_rate);
            previous = obs.growth_rate;
            PhasedObservation {
                date: obs.date,
                level: obs.level,
                growth_rate: obs.growth_rate,
                phase,
            }
        })
        .collect()
}

/// Growth of the second-to-last and last observations, oldest first.
pub fn last_two_growth(rows: &[MacroObservation]) -> [Option<f64>; 2] {
    match rows {
        [] => [None, None],
        [only] => [None, only.growth_rate],
        [.., prev, last] => [prev.growth_rate, last.growth_rate],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(growth: &[Option<f64>]) -> TimeSeries<MacroObservation> {
        let rows = growth
            .iter()
            .enumerate()
            .map(|(i, g)| MacroObservation {
                date: NaiveDate::from_ymd_opt(2010 + i as i32, 1, 1).unwrap(),
                level: 100.0,
                growth_rate: *g,
            })
            .collect();
        TimeSeries::from_rows(rows)
    }

    fn phases(growth: &[Option<f64>]) -> Vec<Phase> {
        classify(&series(growth)).into_iter().map(|p| p.phase).collect()
    }

    #[test]
    fn pairwise_rule() {
        use Phase::*;
        let got = phases(&[Some(1.0), Some(-1.0), Some(-2.0), Some(3.0), Some(-1.0)]);
        assert_eq!(got, vec![Expansion, Expansion, Recession, Expansion, Expansion]);
    }

    #[test]
    fn first_is_always_expansion() {
        assert_eq!(phases(&[Some(-5.0)]), vec![Phase::Expansion]);
    }

    #[test]
    fn missing_growth_is_not_negative() {
        use Phase::*;
        let got = phases(&[None, Some(-1.0), None, Some(-1.0), Some(-1.0)]);
        assert_eq!(got, vec![Expansion, Expansion, Expansion, Expansion, Recession]);
    }

    #[test]
    fn long_streak_stays_recession() {
        use Phase::*;
        let got = phases(&[Some(-1.0), Some(-1.0), Some(-1.0), Some(-1.0)]);
        assert_eq!(got, vec![Expansion, Recession, Recession, Recession]);
    }

    #[test]
    fn zero_growth_is_not_negative() {
        assert_eq!(phase_for_pair(Some(-1.0), Some(0.0)), Phase::Expansion);
    }

    #[test]
    fn empty_series() {
        assert!(classify(&TimeSeries::empty()).is_empty());
        assert_eq!(last_two_growth(&[]), [None, None]);
    }

    #[test]
    fn last_two() {
        let s = series(&[None, Some(2.0), Some(-1.0)]);
        assert_eq!(last_two_growth(s.rows()), [Some(2.0), Some(-1.0)]);
        let one = series(&[None]);
        assert_eq!(last_two_growth(one.rows()), [None, None]);
    }
}
