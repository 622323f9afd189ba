//! Date ranges and chunk planning for span-limited providers.
//!
//! The broker caps each historical request at a fixed number of days, so a
//! long span is cut into contiguous, non-overlapping pieces. Each chunk ends
//! `max_chunk_days - 1` days after it starts (clipped to the span end) and the
//! next one begins the following day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::provider::DataError;

/// Provider limit on days per historical request.
pub const DEFAULT_MAX_CHUNK_DAYS: u32 = 2000;

/// Inclusive date range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Ordered chunks covering exactly one requested span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    chunks: Vec<DateRange>,
}

impl ChunkPlan {
    pub fn chunks(&self) -> &[DateRange] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DateRange> {
        self.chunks.iter()
    }
}

impl<'a> IntoIterator for &'a ChunkPlan {
    type Item = &'a DateRange;
    type IntoIter = std::slice::Iter<'a, DateRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

/// Split `[start, end]` into chunks of at most `max_chunk_days` days.
pub fn plan_chunks(
    start: NaiveDate,
    end: NaiveDate,
    max_chunk_days: u32,
) -> Result<ChunkPlan, DataError> {
    if start > end {
        return Err(DataError::InvalidRange { start, end });
    }
    if max_chunk_days == 0 {
        return Err(DataError::InvalidChunkSize);
    }

    let step = chrono::Duration::days(i64::from(max_chunk_days) - 1);
    let mut chunks = Vec::new();
    let mut cursor = start;

    loop {
        let chunk_end = cursor
            .checked_add_signed(step)
            .map_or(end, |d| d.min(end));
        chunks.push(DateRange {
            start: cursor,
            end: chunk_end,
        });
        if chunk_end >= end {
            break;
        }
        match chunk_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    Ok(ChunkPlan { chunks })
}
