//! Quote rows and the canonical quote table.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column order of every quote table. The timestamp is the row key, not a column.
pub const COLUMNS: [&str; 5] = ["open", "close", "high", "low", "volume"];

/// One OHLCV bar. Timestamps have second resolution; day/week/month bars
/// sit at midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl QuoteRow {
    /// Values in [`COLUMNS`] order.
    pub fn values(&self) -> [f64; 5] {
        [self.open, self.close, self.high, self.low, self.volume]
    }

    /// Build a row from values in [`COLUMNS`] order.
    pub fn from_values(timestamp: NaiveDateTime, values: [f64; 5]) -> Self {
        let [open, close, high, low, volume] = values;
        Self {
            timestamp,
            open,
            close,
            high,
            low,
            volume,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("timestamps must be strictly increasing: {previous} is followed by {next}")]
    NotStrictlyIncreasing {
        previous: NaiveDateTime,
        next: NaiveDateTime,
    },
}

/// Ordered, timestamp-keyed sequence of quote rows for one symbol/granularity.
///
/// Invariant: timestamps are unique and strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteTable {
    rows: Vec<QuoteRow>,
}

impl QuoteTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from rows that must already be strictly increasing.
    pub fn new(rows: Vec<QuoteRow>) -> Result<Self, TableError> {
        for pair in rows.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(TableError::NotStrictlyIncreasing {
                    previous: pair[0].timestamp,
                    next: pair[1].timestamp,
                });
            }
        }
        Ok(Self { rows })
    }

    /// Build a table from provider rows in any order: sort by timestamp and
    /// drop repeated timestamps, keeping the first occurrence.
    pub fn from_unsorted(mut rows: Vec<QuoteRow>) -> Self {
        // Stable sort keeps provider order among equal timestamps.
        rows.sort_by_key(|r| r.timestamp);
        rows.dedup_by_key(|r| r.timestamp);
        Self { rows }
    }

    pub fn rows(&self) -> &[QuoteRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<QuoteRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&QuoteRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&QuoteRow> {
        self.rows.last()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.rows.iter().map(|r| r.timestamp)
    }

    /// Keep only the most recent `n` rows.
    pub fn tail(&self, n: usize) -> Self {
        let start = self.rows.len().saturating_sub(n);
        Self {
            rows: self.rows[start..].to_vec(),
        }
    }

    /// Keep rows whose timestamp satisfies `keep`. Order is preserved, so the
    /// invariant still holds.
    pub fn filter(self, mut keep: impl FnMut(&QuoteRow) -> bool) -> Self {
        Self {
            rows: self.rows.into_iter().filter(|r| keep(r)).collect(),
        }
    }

    /// Replace the close of the most recent row. No-op on an empty table.
    pub fn set_last_close(&mut self, close: f64) {
        if let Some(last) = self.rows.last_mut() {
            last.close = close;
        }
    }
}
