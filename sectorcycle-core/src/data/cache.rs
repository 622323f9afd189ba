//! Per-key CSV cache with cache-or-fetch semantics.
//!
//! Layout: `{cache_dir}/{key}.csv` plus a `{key}.meta.json` sidecar.
//!
//! - The CSV's existence is the only hit signal; a cached file is trusted until
//!   someone deletes it.
//! - On a miss the span is chunked, each chunk fetched in turn with a fixed
//!   pause between requests, and the surviving rows merged and persisted.
//! - A failing chunk is skipped; only when every chunk comes back empty is the
//!   outcome [`FetchOutcome::Empty`] (and nothing is written).
//! - Writes are atomic (write `.tmp`, rename into place).
//! - One process per cache directory; concurrent runs are not supported.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::chunker::{plan_chunks, DateRange, DEFAULT_MAX_CHUNK_DAYS};
use super::provider::{DataError, FetchProgress};
use crate::domain::{derive_growth_rates, MacroObservation, Observation, PriceBar, TimeSeries};

/// A row type the cache knows how to persist.
pub trait CacheRecord: Observation + Serialize + DeserializeOwned {
    /// Hook run on the merged, sorted rows right before they are persisted.
    fn finalize(_rows: &mut [Self]) {}
}

impl CacheRecord for PriceBar {}

impl CacheRecord for MacroObservation {
    fn finalize(rows: &mut [Self]) {
        derive_growth_rates(rows);
    }
}

/// How a cold fetch is split and paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub max_chunk_days: u32,
    /// Pause between consecutive chunk requests.
    pub chunk_delay: Duration,
}

impl ChunkPolicy {
    /// One request for the whole span, no pacing.
    pub fn single_request(span: DateRange) -> Self {
        Self {
            max_chunk_days: u32::try_from(span.days()).unwrap_or(u32::MAX),
            chunk_delay: Duration::ZERO,
        }
    }
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            max_chunk_days: DEFAULT_MAX_CHUNK_DAYS,
            chunk_delay: Duration::from_secs(1),
        }
    }
}

/// A chunk that failed and was left out of the merged series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub range: DateRange,
    pub reason: String,
}

/// Result of [`SeriesCache::get_or_fetch`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Served from the persisted artifact; no provider call was made.
    Cached(TimeSeries<T>),
    /// Fetched, merged and persisted. `failed` lists skipped chunks.
    Fetched {
        series: TimeSeries<T>,
        chunks: usize,
        failed: Vec<ChunkFailure>,
    },
    /// Every chunk failed or came back empty. Nothing was persisted.
    Empty {
        chunks: usize,
        failed: Vec<ChunkFailure>,
    },
}

impl<T> FetchOutcome<T> {
    pub fn series(&self) -> Option<&TimeSeries<T>> {
        match self {
            FetchOutcome::Cached(series) | FetchOutcome::Fetched { series, .. } => Some(series),
            FetchOutcome::Empty { .. } => None,
        }
    }

    /// The series, or an empty one for [`FetchOutcome::Empty`].
    pub fn into_series(self) -> TimeSeries<T> {
        match self {
            FetchOutcome::Cached(series) | FetchOutcome::Fetched { series, .. } => series,
            FetchOutcome::Empty { .. } => TimeSeries::empty(),
        }
    }

    pub fn failed_chunks(&self) -> &[ChunkFailure] {
        match self {
            FetchOutcome::Cached(_) => &[],
            FetchOutcome::Fetched { failed, .. } | FetchOutcome::Empty { failed, .. } => failed,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, FetchOutcome::Cached(_))
    }

    pub fn is_empty(&self) -> bool {
        self.series().map_or(true, |s| s.is_empty())
    }
}

/// Metadata sidecar for a cached key. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub key: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache status for a single artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub key: String,
    pub size_bytes: u64,
    pub meta: Option<CacheMeta>,
}

/// The series cache.
pub struct SeriesCache {
    cache_dir: PathBuf,
}

impl SeriesCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the CSV artifact for a key.
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.csv", file_stem(key)))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.meta_path_for_stem(&file_stem(key))
    }

    fn meta_path_for_stem(&self, stem: &str) -> PathBuf {
        self.cache_dir.join(format!("{stem}.meta.json"))
    }

    /// Whether a persisted artifact exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.artifact_path(key).is_file()
    }

    /// Return the cached series for `key`, or fetch it chunk by chunk.
    ///
    /// The existence check happens once, before any chunk is planned: a hit
    /// never touches `fetch`. Chunk failures are logged and skipped, never
    /// retried.
    pub fn get_or_fetch<T, F>(
        &self,
        key: &str,
        span: DateRange,
        policy: &ChunkPolicy,
        mut fetch: F,
        progress: &dyn FetchProgress,
    ) -> Result<FetchOutcome<T>, DataError>
    where
        T: CacheRecord,
        F: FnMut(DateRange) -> Result<Vec<T>, DataError>,
    {
        if self.contains(key) {
            let series = self.load(key)?;
            info!(
                key,
                rows = series.len(),
                first = ?series.first_date(),
                last = ?series.last_date(),
                "loaded cached series"
            );
            progress.on_cache_hit(key, series.len());
            return Ok(FetchOutcome::Cached(series));
        }

        let plan = plan_chunks(span.start, span.end, policy.max_chunk_days)?;
        let total = plan.len();
        info!(key, %span, chunks = total, "cache miss, fetching");

        let mut rows: Vec<T> = Vec::new();
        let mut failed: Vec<ChunkFailure> = Vec::new();

        for (i, range) in plan.iter().enumerate() {
            if i > 0 && !policy.chunk_delay.is_zero() {
                std::thread::sleep(policy.chunk_delay);
            }

            match fetch(*range) {
                Ok(chunk) => {
                    debug!(key, %range, rows = chunk.len(), "chunk fetched");
                    progress.on_chunk(key, i, total, *range, Ok(chunk.len()));
                    rows.extend(chunk);
                }
                Err(e) => {
                    warn!(key, %range, error = %e, "chunk failed, skipping");
                    progress.on_chunk(key, i, total, *range, Err(&e));
                    failed.push(ChunkFailure {
                        range: *range,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut merged = TimeSeries::from_rows(rows).into_rows();
        progress.on_fetch_complete(key, merged.len(), failed.len());

        if merged.is_empty() {
            warn!(key, failed = failed.len(), "no rows fetched");
            return Ok(FetchOutcome::Empty {
                chunks: total,
                failed,
            });
        }

        T::finalize(&mut merged);
        self.write(key, &merged)?;

        Ok(FetchOutcome::Fetched {
            series: TimeSeries::from_rows(merged),
            chunks: total,
            failed,
        })
    }

    /// Load the persisted rows for `key`.
    pub fn load<T: CacheRecord>(&self, key: &str) -> Result<TimeSeries<T>, DataError> {
        let path = self.artifact_path(key);
        if !path.is_file() {
            return Err(DataError::NoCachedData {
                key: key.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::CacheError(format!("open {}: {e}", path.display())))?;

        let mut rows = Vec::new();
        for record in reader.deserialize::<T>() {
            let row = record
                .map_err(|e| DataError::CacheError(format!("parse {}: {e}", path.display())))?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(DataError::CacheError(format!(
                "artifact {} has no rows",
                path.display()
            )));
        }

        Ok(TimeSeries::from_rows(rows))
    }

    /// Persist rows for `key`, replacing any existing artifact.
    pub fn write<T: CacheRecord>(&self, key: &str, rows: &[T]) -> Result<(), DataError> {
        let (first, last) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first.date(), last.date()),
            _ => return Err(DataError::CacheError("no rows to cache".into())),
        };

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut writer = csv::Writer::from_writer(vec![]);
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| DataError::CacheError(format!("csv serialization: {e}")))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| DataError::CacheError(format!("csv flush: {e}")))?;

        let path = self.artifact_path(key);
        let tmp_path = path.with_extension("csv.tmp");
        fs::write(&tmp_path, &bytes)
            .map_err(|e| DataError::CacheError(format!("write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            key: key.to_string(),
            start_date: first,
            end_date: last,
            row_count: rows.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(key), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(key, rows = rows.len(), path = %path.display(), "cached series written");
        Ok(())
    }

    /// Metadata sidecar for a key, if present and readable.
    pub fn get_meta(&self, key: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(key)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// All artifacts in the cache directory, sorted by key.
    pub fn status(&self) -> Result<Vec<CacheStatus>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut statuses = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let meta = fs::read_to_string(self.meta_path_for_stem(stem))
                .ok()
                .and_then(|content| serde_json::from_str::<CacheMeta>(&content).ok());

            statuses.push(CacheStatus {
                key: meta.as_ref().map_or_else(|| stem.to_string(), |m| m.key.clone()),
                size_bytes,
                meta,
            });
        }

        statuses.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(statuses)
    }

    /// Delete every artifact, sidecar and leftover temp file. Returns the
    /// number of artifacts removed.
    pub fn clear(&self) -> Result<usize, DataError> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let is_artifact = name.ends_with(".csv");
            if is_artifact || name.ends_with(".meta.json") || name.ends_with(".tmp") {
                fs::remove_file(&path)
                    .map_err(|e| DataError::CacheError(format!("remove {}: {e}", path.display())))?;
                if is_artifact {
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// File-name-safe form of a cache key.
pub fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
