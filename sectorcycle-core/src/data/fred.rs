//! FRED macro-series provider (public graph CSV endpoint, no API key).

use chrono::NaiveDate;
use std::time::Duration;
use tracing::debug;

use super::chunker::DateRange;
use super::provider::{DataError, MacroDataProvider};
use crate::domain::MacroObservation;

pub const FRED_GRAPH_CSV: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";

/// Real GDP for India, quarterly, not seasonally adjusted.
pub const DEFAULT_GDP_SERIES: &str = "NGDPRNSAXDCINQ";

pub struct FredProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl FredProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(FRED_GRAPH_CSV)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn series_url(&self, series_id: &str, range: DateRange) -> String {
        format!(
            "{}?id={series_id}&cosd={}&coed={}",
            self.base_url, range.start, range.end
        )
    }

    /// Parse `date,value` rows. FRED marks missing values with `.`.
    pub fn parse_csv(series_id: &str, body: &str) -> Result<Vec<MacroObservation>, DataError> {
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut rows = Vec::new();

        for record in reader.records() {
            let record = record
                .map_err(|e| DataError::ResponseFormatChanged(format!("{series_id} csv: {e}")))?;
            let (Some(date), Some(value)) = (record.get(0), record.get(1)) else {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{series_id} csv: expected two columns"
                )));
            };

            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!("{series_id} csv date '{date}': {e}"))
            })?;

            let value = value.trim();
            if value.is_empty() || value == "." {
                continue;
            }
            let level: f64 = value.parse().map_err(|e| {
                DataError::ResponseFormatChanged(format!("{series_id} csv value '{value}': {e}"))
            })?;

            rows.push(MacroObservation::new(date, level));
        }

        Ok(rows)
    }
}

impl MacroDataProvider for FredProvider {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch_series(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<MacroObservation>, DataError> {
        let url = self.series_url(series_id, range);
        debug!(series_id, %range, "requesting macro series");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound {
                symbol: series_id.to_string(),
            });
        }
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                provider: "fred".into(),
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_csv(series_id, &body)
    }
}
