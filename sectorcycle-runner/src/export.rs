//! Report artifacts: `report.json`, `performance.csv` and `scorecard.csv`.
//!
//! Output is a pure function of the report, so re-running on the same cached
//! inputs rewrites byte-identical files.

use std::path::Path;

use anyhow::{bail, Context, Result};
use sectorcycle_core::analysis::{PerformanceSummary, Recommendation};

use crate::report::{AnalysisReport, SCHEMA_VERSION};

pub const REPORT_FILE: &str = "report.json";
pub const PERFORMANCE_FILE: &str = "performance.csv";
pub const SCORECARD_FILE: &str = "scorecard.csv";

pub fn export_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Columns: sector, phase, mean_return, count. One row per (sector, phase)
/// with observations.
pub fn export_performance_csv(summary: &PerformanceSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["sector", "phase", "mean_return", "count"])?;

    for perf in summary.iter() {
        for (phase, stats) in &perf.by_phase {
            wtr.write_record([
                perf.sector.clone(),
                phase.to_string(),
                format!("{:.6}", stats.mean),
                stats.count.to_string(),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    Ok(String::from_utf8(data)?)
}

/// Columns: sector, mean_expansion, mean_recession, momentum, qualified.
pub fn export_scorecard_csv(recommendation: &Recommendation) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "sector",
        "mean_expansion",
        "mean_recession",
        "momentum",
        "qualified",
    ])?;

    for score in &recommendation.scorecard {
        wtr.write_record([
            score.sector.clone(),
            format_opt(score.mean_expansion),
            format_opt(score.mean_recession),
            format!("{:.6}", score.momentum),
            score.qualified.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    Ok(String::from_utf8(data)?)
}

/// Write all artifacts into `output_dir`. The scorecard is skipped when no
/// recommendation was produced.
pub fn save_report(report: &AnalysisReport, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let json = export_json(report)?;
    std::fs::write(output_dir.join(REPORT_FILE), json)
        .with_context(|| format!("failed to write {REPORT_FILE}"))?;

    let perf = export_performance_csv(&report.summary)?;
    std::fs::write(output_dir.join(PERFORMANCE_FILE), perf)
        .with_context(|| format!("failed to write {PERFORMANCE_FILE}"))?;

    let scorecard_path = output_dir.join(SCORECARD_FILE);
    match &report.recommendation {
        Some(rec) => {
            let scorecard = export_scorecard_csv(rec)?;
            std::fs::write(&scorecard_path, scorecard)
                .with_context(|| format!("failed to write {SCORECARD_FILE}"))?;
        }
        None if scorecard_path.exists() => {
            std::fs::remove_file(&scorecard_path)
                .with_context(|| format!("failed to remove stale {SCORECARD_FILE}"))?;
        }
        None => {}
    }

    Ok(())
}

/// Load `report.json` from a directory written by [`save_report`].
pub fn load_report(output_dir: &Path) -> Result<AnalysisReport> {
    let path = output_dir.join(REPORT_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
