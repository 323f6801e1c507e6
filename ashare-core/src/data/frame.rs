//! Polars bridge for quote tables.
//!
//! The on-disk format never depends on polars; this is only for callers
//! that want to analyse or pretty-print a table as a `DataFrame`.

use crate::domain::{QuoteRow, QuoteTable, TableError, COLUMNS};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("null value in column {column} at row {row}")]
    Null { column: String, row: usize },

    #[error("timestamp out of range at row {0}")]
    TimestampRange(usize),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Expected schema for a quote frame.
pub struct QuoteSchema;

impl QuoteSchema {
    pub fn schema() -> Schema {
        let mut fields = vec![Field::new(
            TIMESTAMP_COLUMN.into(),
            DataType::Datetime(TimeUnit::Milliseconds, None),
        )];
        fields.extend(
            COLUMNS
                .iter()
                .map(|name| Field::new((*name).into(), DataType::Float64)),
        );
        Schema::from_iter(fields)
    }

    /// Validate DataFrame against schema
    pub fn validate(df: &DataFrame) -> Result<(), FrameError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| FrameError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(FrameError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Convert a table to a DataFrame with a millisecond `timestamp` column
/// followed by the five value columns.
pub fn to_dataframe(table: &QuoteTable) -> Result<DataFrame, FrameError> {
    let millis: Vec<i64> = table
        .timestamps()
        .map(|ts| ts.and_utc().timestamp_millis())
        .collect();

    let mut columns = vec![Column::new(TIMESTAMP_COLUMN.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?];

    for (i, name) in COLUMNS.iter().enumerate() {
        let values: Vec<f64> = table.rows().iter().map(|r| r.values()[i]).collect();
        columns.push(Column::new((*name).into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Convert a validated DataFrame back to a table.
pub fn from_dataframe(df: &DataFrame) -> Result<QuoteTable, FrameError> {
    QuoteSchema::validate(df)?;

    let ts_column = df.column(TIMESTAMP_COLUMN)?.cast(&DataType::Int64)?;
    let ts_ca = ts_column.i64()?;

    let mut value_cas = Vec::with_capacity(COLUMNS.len());
    for name in COLUMNS {
        value_cas.push(df.column(name)?.f64()?);
    }

    let null = |column: &str, row: usize| FrameError::Null {
        column: column.to_string(),
        row,
    };

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let millis = ts_ca.get(i).ok_or_else(|| null(TIMESTAMP_COLUMN, i))?;
        let timestamp = millis_to_naive(millis).ok_or(FrameError::TimestampRange(i))?;

        let mut values = [0.0; COLUMNS.len()];
        for (slot, (ca, name)) in values.iter_mut().zip(value_cas.iter().zip(COLUMNS)) {
            *slot = ca.get(i).ok_or_else(|| null(name, i))?;
        }
        rows.push(QuoteRow::from_values(timestamp, values));
    }

    Ok(QuoteTable::new(rows)?)
}

impl QuoteTable {
    pub fn to_dataframe(&self) -> Result<DataFrame, FrameError> {
        to_dataframe(self)
    }

    pub fn from_dataframe(df: &DataFrame) -> Result<Self, FrameError> {
        from_dataframe(df)
    }
}

fn millis_to_naive(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}
