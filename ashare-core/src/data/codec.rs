//! JSON codec for quote tables.
//!
//! A table is stored as three parallel arrays, independent of any dataframe
//! library:
//!
//! ```json
//! {
//!   "index":   ["2024-01-02T00:00:00", "2024-01-03T00:00:00"],
//!   "columns": ["open", "close", "high", "low", "volume"],
//!   "data":    [[22.1, 22.3, 22.48, 21.9, 51234.0], [22.3, 22.87, 22.95, 22.2, 60341.0]]
//! }
//! ```
//!
//! A document may also carry `"as_of": "YYYY-MM-DD"` when the table was
//! fetched for a past date. [`decode`] ignores it; the store reads it to tell
//! latest entries from historical ones.
//!
//! The empty table encodes to `{}`. Decoding is lenient about absence (any
//! missing array decodes to the empty table) and strict about contradiction
//! (mismatched lengths, unknown timestamps, unordered rows are errors).

use crate::domain::{QuoteRow, QuoteTable, TableError, COLUMNS};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Second-resolution ISO-8601, no zone.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("index has {index} entries but data has {data} rows")]
    LengthMismatch { index: usize, data: usize },

    #[error("row {row} has {width} values, expected {expected}")]
    RowWidth {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("invalid timestamp '{0}'")]
    BadTimestamp(String),

    #[error("invalid as-of date '{0}'")]
    BadAsOf(String),

    #[error("{column} at {timestamp} is not a finite number")]
    NonFinite {
        timestamp: NaiveDateTime,
        column: &'static str,
    },

    #[error("invalid table: {0}")]
    Table(#[from] TableError),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk shape of a quote table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Vec<f64>>>,
    /// Set when the table was fetched for a past date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

impl TableDocument {
    /// True when no table arrays are present.
    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.columns.is_none() && self.data.is_none()
    }

    pub fn as_of(&self) -> Result<Option<NaiveDate>, CodecError> {
        self.as_of
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .map_err(|_| CodecError::BadAsOf(raw.to_string()))
            })
            .transpose()
    }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Encode a table. The empty table becomes the empty document.
pub fn encode(table: &QuoteTable) -> TableDocument {
    if table.is_empty() {
        return TableDocument::default();
    }
    TableDocument {
        index: Some(table.timestamps().map(format_timestamp).collect()),
        columns: Some(COLUMNS.iter().map(|c| c.to_string()).collect()),
        data: Some(table.rows().iter().map(|r| r.values().to_vec()).collect()),
        as_of: None,
    }
}

/// [`encode`], stamped with the as-of date the table was fetched for.
pub fn encode_as_of(table: &QuoteTable, as_of: Option<NaiveDate>) -> TableDocument {
    TableDocument {
        as_of: as_of.map(|d| d.format(DATE_FORMAT).to_string()),
        ..encode(table)
    }
}

/// JSON has no NaN or infinity; serde_json would write them as `null`.
fn check_finite(table: &QuoteTable) -> Result<(), CodecError> {
    for row in table.rows() {
        if let Some((column, _)) = COLUMNS
            .into_iter()
            .zip(row.values())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(CodecError::NonFinite {
                timestamp: row.timestamp,
                column,
            });
        }
    }
    Ok(())
}

/// Decode a document back into a table.
pub fn decode(document: &TableDocument) -> Result<QuoteTable, CodecError> {
    let (Some(index), Some(columns), Some(data)) =
        (&document.index, &document.columns, &document.data)
    else {
        return Ok(QuoteTable::empty());
    };

    if index.len() != data.len() {
        return Err(CodecError::LengthMismatch {
            index: index.len(),
            data: data.len(),
        });
    }

    // Position of each canonical column in the stored column list.
    let mut positions = [0usize; COLUMNS.len()];
    for (slot, name) in positions.iter_mut().zip(COLUMNS) {
        *slot = columns
            .iter()
            .position(|c| c == name)
            .ok_or(CodecError::MissingColumn(name))?;
    }

    let mut rows = Vec::with_capacity(data.len());
    for (row, (raw_ts, values)) in index.iter().zip(data).enumerate() {
        if values.len() != columns.len() {
            return Err(CodecError::RowWidth {
                row,
                width: values.len(),
                expected: columns.len(),
            });
        }
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| CodecError::BadTimestamp(raw_ts.clone()))?;
        rows.push(QuoteRow::from_values(timestamp, positions.map(|p| values[p])));
    }

    Ok(QuoteTable::new(rows)?)
}

/// Encode straight to pretty JSON text. Fails on NaN or infinite values.
pub fn to_json(table: &QuoteTable) -> Result<String, CodecError> {
    to_json_as_of(table, None)
}

pub fn to_json_as_of(table: &QuoteTable, as_of: Option<NaiveDate>) -> Result<String, CodecError> {
    check_finite(table)?;
    Ok(serde_json::to_string_pretty(&encode_as_of(table, as_of))?)
}

/// Decode from JSON text.
pub fn from_json(text: &str) -> Result<QuoteTable, CodecError> {
    from_json_as_of(text).map(|(table, _)| table)
}

/// Decode from JSON text, along with the as-of stamp if there is one.
pub fn from_json_as_of(text: &str) -> Result<(QuoteTable, Option<NaiveDate>), CodecError> {
    let document: TableDocument = serde_json::from_str(text)?;
    Ok((decode(&document)?, document.as_of()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> QuoteTable {
        let d = |day: u32, h: u32, m: u32| {
            NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap()
        };
        QuoteTable::new(vec![
            QuoteRow::from_values(d(2, 10, 30), [22.1, 22.3, 22.48, 21.9, 51234.0]),
            QuoteRow::from_values(d(2, 11, 30), [22.3, 22.87, 22.95, 22.2, 60341.0]),
        ])
        .unwrap()
    }

    #[test]
    fn encodes_parallel_arrays() {
        let doc = encode(&sample());
        assert_eq!(
            doc.index.as_deref().unwrap(),
            ["2024-01-02T10:30:00", "2024-01-02T11:30:00"]
        );
        assert_eq!(doc.columns.as_deref().unwrap(), COLUMNS);
        assert_eq!(doc.data.as_ref().unwrap()[1], vec![22.3, 22.87, 22.95, 22.2, 60341.0]);
    }

    #[test]
    fn round_trip_through_json_text() {
        let table = sample();
        let text = to_json(&table).unwrap();
        assert_eq!(from_json(&text).unwrap(), table);
    }

    #[test]
    fn empty_table_is_empty_document() {
        let doc = encode(&QuoteTable::empty());
        assert!(doc.is_empty());
        assert_eq!(serde_json::to_string(&doc).unwrap(), "{}");
        assert!(decode(&doc).unwrap().is_empty());
    }

    #[test]
    fn missing_array_decodes_to_empty() {
        let table = from_json(r#"{"index":["2024-01-02T00:00:00"],"data":[[1,1,1,1,1]]}"#).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn column_order_in_document_is_respected() {
        let text = r#"{
            "index": ["2024-01-02T00:00:00"],
            "columns": ["volume", "low", "high", "close", "open"],
            "data": [[500, 1, 4, 3, 2]]
        }"#;
        let row = from_json(text).unwrap().rows()[0];
        assert_eq!(row.values(), [2.0, 3.0, 4.0, 1.0, 500.0]);
    }

    #[test]
    fn missing_required_column_is_error() {
        let text = r#"{"index":["2024-01-02T00:00:00"],"columns":["open","close","high","low"],"data":[[1,1,1,1]]}"#;
        assert!(matches!(
            from_json(text).unwrap_err(),
            CodecError::MissingColumn("volume")
        ));
    }

    #[test]
    fn length_mismatch_is_error() {
        let mut doc = encode(&sample());
        doc.index.as_mut().unwrap().pop();
        assert!(matches!(
            decode(&doc).unwrap_err(),
            CodecError::LengthMismatch { index: 1, data: 2 }
        ));
    }

    #[test]
    fn short_row_is_error() {
        let mut doc = encode(&sample());
        doc.data.as_mut().unwrap()[0].pop();
        assert!(matches!(decode(&doc).unwrap_err(), CodecError::RowWidth { row: 0, .. }));
    }

    #[test]
    fn unordered_index_is_error() {
        let mut doc = encode(&sample());
        doc.index.as_mut().unwrap().reverse();
        assert!(matches!(decode(&doc).unwrap_err(), CodecError::Table(_)));
    }

    #[test]
    fn bad_timestamp_is_error() {
        let mut doc = encode(&sample());
        doc.index.as_mut().unwrap()[0] = "soon".into();
        assert!(matches!(decode(&doc).unwrap_err(), CodecError::BadTimestamp(_)));
    }

    #[test]
    fn non_finite_values_are_refused() {
        let mut table = sample();
        table.set_last_close(f64::NAN);
        assert!(matches!(
            to_json(&table).unwrap_err(),
            CodecError::NonFinite { column: "close", .. }
        ));

        let ts = table.first().unwrap().timestamp;
        let inf =
            QuoteTable::new(vec![QuoteRow::from_values(ts, [1.0, 1.0, 1.0, 1.0, f64::INFINITY])])
                .unwrap();
        assert!(matches!(
            to_json(&inf).unwrap_err(),
            CodecError::NonFinite { column: "volume", .. }
        ));
    }

    #[test]
    fn as_of_stamp_round_trips_and_is_ignored_by_decode() {
        let as_of = NaiveDate::from_ymd_opt(2020, 1, 10).unwrap();
        let text = to_json_as_of(&sample(), Some(as_of)).unwrap();
        assert!(text.contains(r#""as_of": "2020-01-10""#));
        assert_eq!(from_json(&text).unwrap(), sample());
        assert_eq!(from_json_as_of(&text).unwrap(), (sample(), Some(as_of)));
        assert_eq!(from_json_as_of(&to_json(&sample()).unwrap()).unwrap().1, None);
    }

    #[test]
    fn bad_as_of_is_error() {
        let err = from_json_as_of(r#"{"as_of":"last week"}"#).unwrap_err();
        assert!(matches!(err, CodecError::BadAsOf(_)));
    }

    #[test]
    fn space_separated_timestamps_are_accepted() {
        let table = from_json(
            r#"{"index":["2024-01-02 00:00:00"],"columns":["open","close","high","low","volume"],"data":[[1,2,3,0.5,10]]}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
    }
}
