//! The analysis report and its content fingerprint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use sectorcycle_core::analysis::{CorrelationMatrix, PerformanceSummary, Recommendation};
use sectorcycle_core::data::{ChunkFailure, DateRange};
use sectorcycle_core::domain::{Phase, PhasedObservation};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Pipeline stage a note was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolve,
    Fetch,
    Analyze,
    Recommend,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Analyze => "analyze",
            Stage::Recommend => "recommend",
        };
        f.write_str(s)
    }
}

/// A recovered condition, kept so it shows up in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNote {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Cached,
    Fetched,
    Empty,
}

/// How one series was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRecord {
    pub key: String,
    pub source: FetchSource,
    pub rows: usize,
    /// Chunks requested; zero for a cache hit.
    pub chunks: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_chunks: Vec<ChunkFailure>,
}

/// Everything a run produces. Contains no wall-clock fields, so identical
/// cached inputs serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub span: DateRange,
    pub macro_series_id: String,
    pub momentum_window: usize,
    /// Phase implied by the two most recent growth values.
    pub current_phase: Phase,
    pub phases: Vec<PhasedObservation>,
    pub summary: PerformanceSummary,
    pub momentum: BTreeMap<String, f64>,
    /// `None` when the decision step failed; see `notes`.
    pub recommendation: Option<Recommendation>,
    pub correlation: CorrelationMatrix,
    pub fetches: Vec<FetchRecord>,
    pub notes: Vec<StageNote>,
    /// BLAKE3 of the analytics content.
    pub fingerprint: String,
}

#[derive(Serialize)]
struct AnalyticsView<'a> {
    phases: &'a [PhasedObservation],
    summary: &'a PerformanceSummary,
    momentum: &'a BTreeMap<String, f64>,
    recommendation: &'a Option<Recommendation>,
    correlation: &'a CorrelationMatrix,
}

impl AnalysisReport {
    /// Hash of the analytics (phases, summary, momentum, recommendation,
    /// correlation). Fetch bookkeeping and notes are excluded.
    pub fn compute_fingerprint(&self) -> String {
        let view = AnalyticsView {
            phases: &self.phases,
            summary: &self.summary,
            momentum: &self.momentum,
            recommendation: &self.recommendation,
            correlation: &self.correlation,
        };
        let json = serde_json::to_vec(&view).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    /// Recompute and store the fingerprint.
    pub fn seal(mut self) -> Self {
        self.fingerprint = self.compute_fingerprint();
        self
    }

    pub fn notes_for(&self, stage: Stage) -> impl Iterator<Item = &StageNote> {
        self.notes.iter().filter(move |n| n.stage == stage)
    }
}
