//! Phase-conditioned mean returns per sector.
//!
//! Macro observations are stamped at quarter start and returns at quarter
//! end; both are joined on their calendar [`Quarter`]. Return rows whose
//! quarter has no phase label are counted as unmatched and left out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::returns::QuarterlyReturn;
use crate::domain::{Phase, PhasedObservation, Quarter};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub sector: String,
    /// Absent phase = no observations in that phase.
    pub by_phase: BTreeMap<Phase, PhaseStats>,
    /// Return rows with no phase for their quarter.
    pub unmatched: usize,
}

impl SectorPerformance {
    pub fn mean(&self, phase: Phase) -> Option<f64> {
        self.by_phase.get(&phase).map(|s| s.mean)
    }
}

/// Per-sector summaries in input sector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub sectors: Vec<SectorPerformance>,
}

impl PerformanceSummary {
    pub fn get(&self, sector: &str) -> Option<&SectorPerformance> {
        self.sectors.iter().find(|s| s.sector == sector)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SectorPerformance> {
        self.sectors.iter()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

/// Phase for each quarter. A later observation in the same quarter wins.
pub fn phase_by_quarter(phases: &[PhasedObservation]) -> BTreeMap<Quarter, Phase> {
    phases
        .iter()
        .map(|p| (Quarter::containing(p.date), p.phase))
        .collect()
}

/// Left-join each sector's returns onto phases and average per phase.
pub fn analyze(
    returns_by_sector: &[(String, Vec<QuarterlyReturn>)],
    phases: &[PhasedObservation],
) -> PerformanceSummary {
    let lookup = phase_by_quarter(phases);

    let sectors = returns_by_sector
        .iter()
        .map(|(sector, returns)| {
            let mut sums: BTreeMap<Phase, (f64, usize)> = BTreeMap::new();
            let mut unmatched = 0;

            for r in returns {
                match lookup.get(&Quarter::containing(r.quarter_end)) {
                    Some(phase) => {
                        let entry = sums.entry(*phase).or_insert((0.0, 0));
                        entry.0 += r.value;
                        entry.1 += 1;
                    }
                    None => unmatched += 1,
                }
            }

            let by_phase = sums
                .into_iter()
                .map(|(phase, (sum, count))| {
                    (
                        phase,
                        PhaseStats {
                            mean: sum / count as f64,
                            count,
                        },
                    )
                })
                .collect();

            SectorPerformance {
                sector: sector.clone(),
                by_phase,
                unmatched,
            }
        })
        .collect();

    PerformanceSummary { sectors }
}
