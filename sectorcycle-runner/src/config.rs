//! Serializable analysis configuration (TOML).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use sectorcycle_core::data::{
    file_stem, ChunkPolicy, DateRange, DEFAULT_GDP_SERIES, DEFAULT_MAX_CHUNK_DAYS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_chunk_days")]
    pub max_chunk_days: u32,
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_chunk_days: default_max_chunk_days(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroSeriesConfig {
    #[serde(default = "default_series_id")]
    pub id: String,
}

impl Default for MacroSeriesConfig {
    fn default() -> Self {
        Self {
            id: default_series_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Environment variable that, when set, supplies the access token
    /// directly instead of asking the token service.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,
    #[serde(default = "default_token_service_url")]
    pub token_service_url: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            access_token_env: default_access_token_env(),
            token_service_url: default_token_service_url(),
            exchange: default_exchange(),
        }
    }
}

/// One sector tracked through its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorConfig {
    pub name: String,
    /// Index trading symbol, e.g. `NIFTY BANK`.
    pub symbol: String,
    /// Skips catalog lookup when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_token: Option<u64>,
}

impl SectorConfig {
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            instrument_token: None,
        }
    }

    /// Cache key of this sector's price series.
    pub fn cache_key(&self) -> String {
        format!("sector_{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub start_date: NaiveDate,
    /// Defaults to the run date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Trailing observations used for momentum.
    #[serde(default = "default_momentum_window")]
    pub momentum_window: usize,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub macro_series: MacroSeriesConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub sectors: Vec<SectorConfig>,
}

fn default_max_chunk_days() -> u32 {
    DEFAULT_MAX_CHUNK_DAYS
}
fn default_chunk_delay_ms() -> u64 {
    1000
}
fn default_series_id() -> String {
    DEFAULT_GDP_SERIES.to_string()
}
fn default_api_key_env() -> String {
    "KITE_API_KEY".to_string()
}
fn default_access_token_env() -> String {
    "KITE_ACCESS_TOKEN".to_string()
}
fn default_token_service_url() -> String {
    "http://127.0.0.1:5000".to_string()
}
fn default_exchange() -> String {
    "NSE".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}
fn default_momentum_window() -> usize {
    90
}
fn default_interval() -> String {
    "day".to_string()
}

impl AnalysisConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// The five NSE sector indices over 2005-01-01 .. 2025-05-27.
    pub fn default_nse() -> Self {
        let sectors = [
            ("Bank", "NIFTY BANK"),
            ("IT", "NIFTY IT"),
            ("Pharma", "NIFTY PHARMA"),
            ("FMCG", "NIFTY FMCG"),
            ("Auto", "NIFTY AUTO"),
        ]
        .iter()
        .map(|(name, symbol)| SectorConfig::new(name, symbol))
        .collect();

        Self {
            start_date: NaiveDate::from_ymd_opt(2005, 1, 1).unwrap_or(NaiveDate::MIN),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 27),
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            momentum_window: default_momentum_window(),
            interval: default_interval(),
            fetch: FetchConfig::default(),
            macro_series: MacroSeriesConfig::default(),
            broker: BrokerConfig::default(),
            sectors,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(end) = self.end_date {
            if self.start_date > end {
                return Err(ConfigError::Invalid(format!(
                    "start_date {} is after end_date {end}",
                    self.start_date
                )));
            }
        }
        if self.fetch.max_chunk_days == 0 {
            return Err(ConfigError::Invalid("fetch.max_chunk_days must be at least 1".into()));
        }
        if self.momentum_window == 0 {
            return Err(ConfigError::Invalid("momentum_window must be at least 1".into()));
        }
        if self.macro_series.id.trim().is_empty() {
            return Err(ConfigError::Invalid("macro_series.id is empty".into()));
        }
        if self.sectors.is_empty() {
            return Err(ConfigError::Invalid("at least one [[sectors]] entry is required".into()));
        }

        let mut seen = HashSet::new();
        let mut stems = HashSet::new();
        for sector in &self.sectors {
            if sector.name.trim().is_empty() || sector.symbol.trim().is_empty() {
                return Err(ConfigError::Invalid("sector name and symbol must be non-empty".into()));
            }
            if !seen.insert(sector.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate sector name '{}'",
                    sector.name
                )));
            }
            if !stems.insert(file_stem(&sector.cache_key())) {
                return Err(ConfigError::Invalid(format!(
                    "sector name '{}' collides with another after file-name sanitising",
                    sector.name
                )));
            }
        }
        Ok(())
    }

    /// Analysis span, with a missing end date resolved to `today`.
    pub fn span(&self, today: NaiveDate) -> Result<DateRange, ConfigError> {
        let end = self.end_date.unwrap_or(today);
        DateRange::new(self.start_date, end).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Chunking and pacing for sector fetches.
    pub fn chunk_policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            max_chunk_days: self.fetch.max_chunk_days,
            chunk_delay: Duration::from_millis(self.fetch.chunk_delay_ms),
        }
    }

    /// Cache key of the macro series.
    pub fn macro_cache_key(&self) -> String {
        format!("macro_{}", self.macro_series.id)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::default_nse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
start_date = "2005-01-01"
end_date = "2025-05-27"
momentum_window = 60

[fetch]
chunk_delay_ms = 0

[[sectors]]
name = "Bank"
symbol = "NIFTY BANK"
instrument_token = 260105

[[sectors]]
name = "IT"
symbol = "NIFTY IT"
"#;

    #[test]
    fn parses_with_defaults() {
        let config = AnalysisConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.momentum_window, 60);
        assert_eq!(config.fetch.max_chunk_days, 2000);
        assert_eq!(config.fetch.chunk_delay_ms, 0);
        assert_eq!(config.macro_series.id, "NGDPRNSAXDCINQ");
        assert_eq!(config.broker.exchange, "NSE");
        assert_eq!(config.interval, "day");
        assert_eq!(config.cache_dir, PathBuf::from("data"));
        assert_eq!(config.sectors[0].instrument_token, Some(260105));
        assert_eq!(config.sectors[1].instrument_token, None);
    }

    #[test]
    fn missing_end_date_resolves_to_today() {
        let config = AnalysisConfig::from_toml(
            "start_date = \"2020-01-01\"\n[[sectors]]\nname = \"A\"\nsymbol = \"X\"\n",
        )
        .unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let span = config.span(today).unwrap();
        assert_eq!(span.end, today);
    }

    #[test]
    fn rejects_inverted_dates() {
        let text = SAMPLE.replace("2025-05-27", "2000-01-01");
        assert!(matches!(
            AnalysisConfig::from_toml(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let text = SAMPLE.replace("chunk_delay_ms = 0", "max_chunk_days = 0");
        assert!(AnalysisConfig::from_toml(&text).is_err());
    }

    #[test]
    fn rejects_duplicate_sector_names() {
        let text = SAMPLE.replace("name = \"IT\"", "name = \"Bank\"");
        let err = AnalysisConfig::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_colliding_cache_keys() {
        let text = SAMPLE
            .replace("name = \"IT\"", "name = \"Bank?\"")
            .replace("name = \"Bank\"", "name = \"Bank!\"");
        assert!(AnalysisConfig::from_toml(&text).is_err());
    }

    #[test]
    fn rejects_no_sectors() {
        assert!(AnalysisConfig::from_toml("start_date = \"2020-01-01\"\n").is_err());
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            AnalysisConfig::from_toml("start_date = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn default_covers_five_nse_indices() {
        let config = AnalysisConfig::default_nse();
        config.validate().unwrap();
        let symbols: Vec<&str> = config.sectors.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(
            symbols,
            vec!["NIFTY BANK", "NIFTY IT", "NIFTY PHARMA", "NIFTY FMCG", "NIFTY AUTO"]
        );
        assert_eq!(config.chunk_policy().chunk_delay, Duration::from_secs(1));
        assert_eq!(config.macro_cache_key(), "macro_NGDPRNSAXDCINQ");
        assert_eq!(config.sectors[0].cache_key(), "sector_Bank");
    }

    #[test]
    fn shipped_config_matches_default() {
        let text = include_str!("../../config/nse_sectors.toml");
        assert_eq!(AnalysisConfig::from_toml(text).unwrap(), AnalysisConfig::default_nse());
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = AnalysisConfig::from_toml(SAMPLE).unwrap();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(AnalysisConfig::from_toml(&text).unwrap(), config);
    }
}
