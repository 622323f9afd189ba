//! Pearson correlation of daily sector returns over their shared dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::returns::daily_returns;
use crate::domain::PriceBar;

/// Square matrix in sector order. `None` marks an undefined coefficient
/// (zero variance).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub sectors: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
    /// Number of shared dates the coefficients were computed over.
    pub observations: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.sectors.iter().position(|s| s == a)?;
        let j = self.sectors.iter().position(|s| s == b)?;
        self.values.get(i)?.get(j).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Inner-join daily returns on date and correlate every pair of sectors.
///
/// Fewer than two sectors or two shared dates gives an empty matrix.
pub fn correlation_matrix(series: &[(String, &[PriceBar])]) -> CorrelationMatrix {
    if series.len() < 2 {
        return CorrelationMatrix::default();
    }

    let returns: Vec<BTreeMap<NaiveDate, f64>> = series
        .iter()
        .map(|(_, bars)| daily_returns(bars).into_iter().collect())
        .collect();

    let mut shared: BTreeSet<NaiveDate> = returns[0].keys().copied().collect();
    for r in &returns[1..] {
        shared.retain(|d| r.contains_key(d));
    }
    if shared.len() < 2 {
        return CorrelationMatrix::default();
    }

    let columns: Vec<Vec<f64>> = returns
        .iter()
        .map(|r| shared.iter().filter_map(|d| r.get(d).copied()).collect())
        .collect();

    let values = (0..columns.len())
        .map(|i| {
            (0..columns.len())
                .map(|j| pearson(&columns[i], &columns[j]))
                .collect()
        })
        .collect();

    CorrelationMatrix {
        sectors: series.iter().map(|(name, _)| name.clone()).collect(),
        values,
        observations: shared.len(),
    }
}
