//! Sector selection from expansion performance and recent momentum.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::performance::PerformanceSummary;
use super::phase::phase_for_pair;
use crate::domain::Phase;

#[derive(Debug, Error, PartialEq)]
pub enum RecommendError {
    #[error("non-finite {field} for sector '{sector}'")]
    NonFinite { sector: String, field: &'static str },
}

/// One row of the scorecard shown next to the recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorScore {
    pub sector: String,
    pub mean_expansion: Option<f64>,
    pub mean_recession: Option<f64>,
    pub momentum: f64,
    pub qualified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub current_phase: Phase,
    /// Qualifying sectors, in input order.
    pub sectors: Vec<String>,
    pub scorecard: Vec<SectorScore>,
}

/// Missing expansion history counts as zero, so it passes `>= 0`.
pub fn qualifies(mean_expansion: Option<f64>, momentum: f64) -> bool {
    mean_expansion.unwrap_or(0.0) >= 0.0 && momentum > 0.0
}

/// Recession iff both of the two most recent growth values are negative.
pub fn current_phase(last_two_growth: [Option<f64>; 2]) -> Phase {
    phase_for_pair(last_two_growth[0], last_two_growth[1])
}

fn check_finite(sector: &str, field: &'static str, value: Option<f64>) -> Result<(), RecommendError> {
    match value {
        Some(v) if !v.is_finite() => Err(RecommendError::NonFinite {
            sector: sector.to_string(),
            field,
        }),
        _ => Ok(()),
    }
}

pub fn recommend(
    summary: &PerformanceSummary,
    momentum_by_sector: &BTreeMap<String, f64>,
    last_two_growth: [Option<f64>; 2],
) -> Result<Recommendation, RecommendError> {
    let mut scorecard = Vec::with_capacity(summary.len());

    for perf in summary.iter() {
        let mean_expansion = perf.mean(Phase::Expansion);
        let mean_recession = perf.mean(Phase::Recession);
        let momentum = momentum_by_sector.get(&perf.sector).copied();

        check_finite(&perf.sector, "expansion mean", mean_expansion)?;
        check_finite(&perf.sector, "recession mean", mean_recession)?;
        check_finite(&perf.sector, "momentum", momentum)?;

        let momentum = momentum.unwrap_or(0.0);
        scorecard.push(SectorScore {
            sector: perf.sector.clone(),
            mean_expansion,
            mean_recession,
            momentum,
            qualified: qualifies(mean_expansion, momentum),
        });
    }

    let sectors = scorecard
        .iter()
        .filter(|s| s.qualified)
        .map(|s| s.sector.clone())
        .collect();

    Ok(Recommendation {
        current_phase: current_phase(last_two_growth),
        sectors,
        scorecard,
    })
}
