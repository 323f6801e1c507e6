//! Sina kline adapter (scale-oriented provider).
//!
//! One endpoint serves every period through a minutes-per-bar `scale`:
//! day = 240, week = 1200, month = 7200, or the literal minute count.
//! The endpoint has no end-date parameter, so an as-of fetch asks for extra
//! lookback bars and truncates locally.

use super::http::{self, get_text};
use super::provider::{FetchRequest, ProviderError, QuoteSource, SourceId};
use crate::domain::{Granularity, QuoteRow, QuoteTable};
use chrono::{Local, NaiveDate};
use serde_json::Value;

/// Provider B adapter.
pub struct SinaKline {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl SinaKline {
    pub fn new(client: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn kline_url(&self, symbol: &str, scale: u32, datalen: usize) -> String {
        format!(
            "{}?symbol={symbol}&scale={scale}&ma=5&datalen={datalen}",
            self.base_url
        )
    }

    /// Request URL as of `today`: `datalen` includes the as-of lookback.
    fn request_url(&self, request: &FetchRequest, today: NaiveDate) -> String {
        let datalen = lookback_count(request.count, request.granularity, request.as_of, today);
        self.kline_url(request.symbol.as_str(), scale(request.granularity), datalen)
    }

    fn fetch_at(&self, request: &FetchRequest, today: NaiveDate) -> Result<QuoteTable, ProviderError> {
        let body = get_text(&self.client, &self.request_url(request, today))?;
        table_for(request, &body)
    }
}

/// Parse a kline body and cut it down to what `request` asked for.
pub fn table_for(request: &FetchRequest, body: &str) -> Result<QuoteTable, ProviderError> {
    let table = parse_kline(body)?;
    let table = truncate_to_as_of(table, request.granularity, request.as_of, request.count);

    if table.is_empty() {
        return Err(ProviderError::EmptyResult);
    }
    Ok(table)
}

impl QuoteSource for SinaKline {
    fn id(&self) -> SourceId {
        SourceId::SinaKline
    }

    fn fetch(&self, request: &FetchRequest) -> Result<QuoteTable, ProviderError> {
        self.fetch_at(request, Local::now().date_naive())
    }
}

/// Minutes per bar as Sina expects them.
pub fn scale(granularity: Granularity) -> u32 {
    match granularity {
        Granularity::Day => 240,
        Granularity::Week => 1200,
        Granularity::Month => 7200,
        g => g.minutes_per_bar().unwrap_or(1),
    }
}

/// Calendar days approximated by one bar, for the as-of lookback heuristic.
fn days_per_extra_bar(granularity: Granularity) -> Option<i64> {
    match granularity {
        Granularity::Day => Some(1),
        Granularity::Week => Some(4),
        Granularity::Month => Some(29),
        _ => None,
    }
}

/// Bars to request so that `count` bars remain after dropping everything
/// after `as_of`: one extra bar per 1/4/29 calendar days elapsed for
/// day/week/month. The approximation ignores weekends, holidays and month
/// lengths. A future `as_of` adds nothing.
pub fn lookback_count(
    count: usize,
    granularity: Granularity,
    as_of: Option<NaiveDate>,
    today: NaiveDate,
) -> usize {
    match (as_of, days_per_extra_bar(granularity)) {
        (Some(as_of), Some(unit)) => {
            let elapsed = (today - as_of).num_days().max(0);
            let extra = usize::try_from(elapsed / unit).unwrap_or(usize::MAX);
            count.saturating_add(extra)
        }
        _ => count,
    }
}

/// Keep rows on or before `as_of` (day/week/month only), then the most
/// recent `count` of them.
pub fn truncate_to_as_of(
    table: QuoteTable,
    granularity: Granularity,
    as_of: Option<NaiveDate>,
    count: usize,
) -> QuoteTable {
    match as_of {
        Some(as_of) if !granularity.is_intraday() => table
            .filter(|row| row.timestamp.date() <= as_of)
            .tail(count),
        _ => table,
    }
}

/// Parse a kline body: a JSON array of `{day, open, high, low, close, volume}`
/// objects with string or numeric values. `null` means no data.
pub fn parse_kline(body: &str) -> Result<QuoteTable, ProviderError> {
    let value = http::parse_json(body)?;
    let items = match value {
        Value::Null => return Ok(QuoteTable::empty()),
        Value::Array(items) => items,
        other => {
            return Err(ProviderError::parse(format!(
                "expected an array of bars, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        rows.push(parse_bar(item).ok_or_else(|| {
            ProviderError::parse(format!("malformed bar at index {i}: {item}"))
        })?);
    }
    Ok(QuoteTable::from_unsorted(rows))
}

fn parse_bar(item: &Value) -> Option<QuoteRow> {
    let field = |name: &str| item.get(name).and_then(http::number);
    Some(QuoteRow {
        timestamp: http::timestamp(item.get("day")?.as_str()?)?,
        open: field("open")?,
        close: field("close")?,
        high: field("high")?,
        low: field("low")?,
        volume: field("volume")?,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_BODY: &str = r#"[
        {"day":"2024-01-02","open":"22.100","high":"22.480","low":"21.900","close":"22.300","volume":"5123400","ma_price5":22.1},
        {"day":"2024-01-03","open":"22.300","high":"22.950","low":"22.200","close":"22.870","volume":"6034100"},
        {"day":"2024-01-04","open":"22.800","high":"23.000","low":"22.500","close":"22.610","volume":"4800000"}
    ]"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn scale_values() {
        assert_eq!(scale(Granularity::Day), 240);
        assert_eq!(scale(Granularity::Week), 1200);
        assert_eq!(scale(Granularity::Month), 7200);
        assert_eq!(scale(Granularity::Min15), 15);
        assert_eq!(scale(Granularity::Min60), 60);
    }

    #[test]
    fn parses_string_valued_bars() {
        let table = parse_kline(DAY_BODY).unwrap();
        assert_eq!(table.len(), 3);
        let first = table.first().unwrap();
        assert_eq!(first.timestamp, date(2024, 1, 2).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(first.open, 22.1);
        assert_eq!(first.close, 22.3);
        assert_eq!(first.high, 22.48);
        assert_eq!(first.low, 21.9);
        assert_eq!(first.volume, 5_123_400.0);
    }

    #[test]
    fn parses_minute_timestamps() {
        let body = r#"[{"day":"2024-01-02 10:30:00","open":1,"high":2,"low":0.5,"close":1.5,"volume":100}]"#;
        let table = parse_kline(body).unwrap();
        assert_eq!(table.first().unwrap().timestamp.to_string(), "2024-01-02 10:30:00");
    }

    #[test]
    fn null_body_is_empty() {
        assert!(parse_kline("null").unwrap().is_empty());
    }

    #[test]
    fn object_body_is_parse_error() {
        let err = parse_kline(r#"{"__ERROR":"symbol"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn missing_field_is_parse_error() {
        let err = parse_kline(r#"[{"day":"2024-01-02","open":"1"}]"#).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn lookback_compensates_per_granularity() {
        let today = date(2024, 3, 1);
        let as_of = Some(date(2024, 1, 31)); // 30 days earlier

        assert_eq!(lookback_count(5, Granularity::Day, as_of, today), 35);
        assert_eq!(lookback_count(5, Granularity::Week, as_of, today), 5 + 7);
        assert_eq!(lookback_count(5, Granularity::Month, as_of, today), 5 + 1);
        assert_eq!(lookback_count(5, Granularity::Min5, as_of, today), 5);
        assert_eq!(lookback_count(5, Granularity::Day, None, today), 5);
    }

    #[test]
    fn lookback_ignores_future_as_of() {
        let today = date(2024, 3, 1);
        assert_eq!(lookback_count(5, Granularity::Day, Some(date(2024, 3, 9)), today), 5);
    }

    #[test]
    fn lookback_saturates() {
        let today = date(2024, 3, 1);
        let as_of = Some(date(1990, 1, 1));
        assert_eq!(lookback_count(usize::MAX, Granularity::Day, as_of, today), usize::MAX);
        assert_eq!(lookback_count(usize::MAX - 1, Granularity::Day, as_of, today), usize::MAX);
    }

    #[test]
    fn as_of_fetch_widens_request_then_truncates() {
        let source = SinaKline::new(reqwest::blocking::Client::new(), "http://example.test/kline");
        // Three days before today: three extra day bars requested.
        let request = FetchRequest::new("300718", Granularity::Day, 1, Some(date(2024, 1, 3)));

        assert_eq!(
            source.request_url(&request, date(2024, 1, 6)),
            "http://example.test/kline?symbol=sz300718&scale=240&ma=5&datalen=4"
        );

        let table = table_for(&request, DAY_BODY).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.first().unwrap().timestamp.date(), date(2024, 1, 3));
        assert_eq!(table.first().unwrap().close, 22.87);
    }

    #[test]
    fn as_of_before_all_rows_is_empty_result() {
        let request = FetchRequest::new("300718", Granularity::Day, 2, Some(date(2023, 12, 1)));
        assert!(matches!(table_for(&request, DAY_BODY), Err(ProviderError::EmptyResult)));
    }

    #[test]
    fn truncation_keeps_latest_rows_on_or_before_as_of() {
        let table = parse_kline(DAY_BODY).unwrap();
        let cut = truncate_to_as_of(table, Granularity::Day, Some(date(2024, 1, 3)), 1);
        assert_eq!(cut.len(), 1);
        assert_eq!(cut.first().unwrap().close, 22.87);
    }

    #[test]
    fn truncation_skips_intraday() {
        let table = parse_kline(DAY_BODY).unwrap();
        let cut = truncate_to_as_of(table, Granularity::Min30, Some(date(2024, 1, 2)), 1);
        assert_eq!(cut.len(), 3);
    }

    #[test]
    fn url_shape() {
        let client = reqwest::blocking::Client::new();
        let source = SinaKline::new(client, "http://example.test/kline");
        assert_eq!(
            source.kline_url("sz300718", 240, 5),
            "http://example.test/kline?symbol=sz300718&scale=240&ma=5&datalen=5"
        );
    }
}
