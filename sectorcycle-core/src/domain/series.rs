//! TimeSeries: date-indexed rows with a strictly increasing index.

use chrono::NaiveDate;

/// A row that carries its own date index.
pub trait Observation {
    fn date(&self) -> NaiveDate;
}

/// Ordered rows, dates strictly increasing, no duplicates.
///
/// The only way in is [`TimeSeries::from_rows`], which sorts and collapses
/// duplicate dates, so every instance upholds the ordering invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries<T> {
    rows: Vec<T>,
}

impl<T: Observation> TimeSeries<T> {
    /// Build a series from rows in any order.
    ///
    /// Sorting is stable; when two rows share a date the one appearing later
    /// in the input wins, so a chunk fetched later overrides an earlier one.
    pub fn from_rows(mut rows: Vec<T>) -> Self {
        rows.sort_by_key(|r| r.date());

        let mut merged: Vec<T> = Vec::with_capacity(rows.len());
        for row in rows {
            match merged.last_mut() {
                Some(last) if last.date() == row.date() => *last = row,
                _ => merged.push(row),
            }
        }

        Self { rows: merged }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(Observation::date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(Observation::date)
    }
}

impl<T> TimeSeries<T> {
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// Read-only view of the rows.
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> IntoIterator for &'a TimeSeries<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
