//! Kite Connect historical-data provider.
//!
//! Fetches daily candles for index instruments, one chunk per request. The
//! endpoint rejects spans longer than 2000 days for daily candles, which is
//! why callers go through the chunked cache rather than calling this
//! directly for a long history.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::auth::AccessToken;
use super::chunker::DateRange;
use super::instruments::InstrumentCatalog;
use super::provider::{DataError, SectorConnector, SectorDataProvider};
use crate::domain::PriceBar;

pub const KITE_API_BASE: &str = "https://api.kite.trade";

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    status: String,
    data: Option<CandleData>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandleData {
    candles: Vec<Vec<Value>>,
}

/// Authenticated Kite client.
pub struct KiteProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    access_token: AccessToken,
}

impl KiteProvider {
    pub fn new(
        api_key: impl Into<String>,
        access_token: AccessToken,
        base_url: impl Into<String>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token,
        })
    }

    fn historical_url(&self, instrument_token: u64, interval: &str, range: DateRange) -> String {
        format!(
            "{}/instruments/historical/{instrument_token}/{interval}?from={}&to={}",
            self.base_url, range.start, range.end
        )
    }

    fn instruments_url(&self, exchange: &str) -> String {
        format!("{}/instruments/{exchange}", self.base_url)
    }

    fn authorization(&self) -> String {
        format!("token {}:{}", self.api_key, self.access_token.expose())
    }

    /// GET with Kite headers; maps HTTP failures onto [`DataError`].
    fn get(&self, url: &str) -> Result<String, DataError> {
        let resp = self
            .client
            .get(url)
            .header("X-Kite-Version", "3")
            .header("Authorization", self.authorization())
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationRequired(format!(
                "Kite rejected the session token: {body}"
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: "kite".into(),
            });
        }
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                provider: "kite".into(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }

    /// Parse a historical-candles body into bars.
    pub fn parse_candles(body: &str) -> Result<Vec<PriceBar>, DataError> {
        let resp: HistoricalResponse = serde_json::from_str(body)
            .map_err(|e| DataError::ResponseFormatChanged(format!("historical response: {e}")))?;

        if resp.status != "success" {
            return Err(DataError::ResponseFormatChanged(format!(
                "historical status '{}': {}",
                resp.status,
                resp.message.unwrap_or_default()
            )));
        }

        let data = resp
            .data
            .ok_or_else(|| DataError::ResponseFormatChanged("no data in response".into()))?;

        data.candles.iter().map(|c| parse_candle(c)).collect()
    }
}

/// `[timestamp, open, high, low, close, volume]`
fn parse_candle(candle: &[Value]) -> Result<PriceBar, DataError> {
    if candle.len() < 5 {
        return Err(DataError::ResponseFormatChanged(format!(
            "candle has {} fields, expected at least 5",
            candle.len()
        )));
    }

    let timestamp = candle[0]
        .as_str()
        .ok_or_else(|| DataError::ResponseFormatChanged("candle timestamp is not a string".into()))?;
    let date = parse_candle_date(timestamp)?;

    let num = |i: usize| -> Result<f64, DataError> {
        candle[i].as_f64().ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("candle field {i} is not a number"))
        })
    };

    Ok(PriceBar {
        date,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: candle.get(5).and_then(Value::as_u64).unwrap_or(0),
    })
}

/// Candle timestamps look like `2024-01-02T00:00:00+0530`; the bar belongs
/// to the exchange-local calendar date.
///
/// Not converted to UTC first: midnight IST is the previous day in UTC, which
/// would move the first session of a quarter into the quarter before it.
fn parse_candle_date(timestamp: &str) -> Result<NaiveDate, DataError> {
    if let Ok(dt) = chrono::DateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.date_naive());
    }
    timestamp
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid candle timestamp: {timestamp}")))
}

impl SectorDataProvider for KiteProvider {
    fn name(&self) -> &str {
        "kite"
    }

    fn instrument_catalog(&self, exchange: &str) -> Result<InstrumentCatalog, DataError> {
        let body = self.get(&self.instruments_url(exchange))?;
        InstrumentCatalog::from_csv(&body)
    }

    fn fetch_chunk(
        &self,
        instrument_token: u64,
        range: DateRange,
        interval: &str,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = self.historical_url(instrument_token, interval, range);
        debug!(instrument_token, %range, "requesting candles");
        let body = self.get(&url)?;
        Self::parse_candles(&body)
    }
}

/// Builds a [`KiteProvider`] from the API key once a session token exists.
pub struct KiteConnector {
    pub api_key: String,
    pub base_url: String,
}

impl KiteConnector {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: KITE_API_BASE.to_string(),
        }
    }
}

impl SectorConnector for KiteConnector {
    fn connect(&self, token: &AccessToken) -> Result<Box<dyn SectorDataProvider>, DataError> {
        let provider = KiteProvider::new(self.api_key.clone(), token.clone(), self.base_url.clone())?;
        Ok(Box::new(provider))
    }
}
