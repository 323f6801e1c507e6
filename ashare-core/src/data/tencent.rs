//! Tencent adapters (bar-oriented provider).
//!
//! Two endpoints, two wire shapes:
//! - day/week/month bars, addressed by a period unit and an optional end date;
//!   equities carry a forward-adjusted `qfq{unit}` series, indices only `{unit}`
//! - recent-N minute bars (`m{N}`) with no back-fill, plus a live quote block
//!
//! Both responses are nested under `data.{symbol}`. Bar rows are positional
//! arrays: `[time, open, close, high, low, volume, ...]`.

use super::http::{self, get_text};
use super::provider::{FetchRequest, ProviderError, QuoteSource, SourceId};
use crate::domain::{Granularity, QuoteRow, QuoteTable};
use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::debug;

/// Index of the current price inside the `qt.{symbol}` array.
const LIVE_PRICE_FIELD: usize = 3;

/// Provider A day/week/month adapter.
pub struct TencentKline {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl TencentKline {
    pub fn new(client: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn kline_url(&self, symbol: &str, unit: &str, end: &str, count: usize) -> String {
        format!("{}?param={symbol},{unit},,{end},{count},qfq", self.base_url)
    }

    fn fetch_at(&self, request: &FetchRequest, today: NaiveDate) -> Result<QuoteTable, ProviderError> {
        let unit = period_unit(request.granularity).ok_or_else(|| {
            ProviderError::parse(format!(
                "{} bars are not served by the day kline endpoint",
                request.granularity
            ))
        })?;
        let end = end_param(request.as_of, today);
        let url = self.kline_url(request.symbol.as_str(), unit, &end, request.count);

        let body = get_text(&self.client, &url)?;
        let table = parse_kline(&body, request.symbol.as_str(), unit)?;
        if table.is_empty() {
            return Err(ProviderError::EmptyResult);
        }
        Ok(table)
    }
}

impl QuoteSource for TencentKline {
    fn id(&self) -> SourceId {
        SourceId::TencentKline
    }

    fn fetch(&self, request: &FetchRequest) -> Result<QuoteTable, ProviderError> {
        self.fetch_at(request, Local::now().date_naive())
    }
}

/// Provider A minute-bar adapter. Ignores `as_of`: the endpoint only serves
/// the most recent bars.
pub struct TencentMinute {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl TencentMinute {
    pub fn new(client: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn minute_url(&self, symbol: &str, minutes: u32, count: usize) -> String {
        format!("{}?param={symbol},m{minutes},,{count}", self.base_url)
    }
}

impl QuoteSource for TencentMinute {
    fn id(&self) -> SourceId {
        SourceId::TencentMinute
    }

    fn fetch(&self, request: &FetchRequest) -> Result<QuoteTable, ProviderError> {
        let minutes = request.granularity.minutes_per_bar().ok_or_else(|| {
            ProviderError::parse(format!(
                "{} bars are not served by the minute endpoint",
                request.granularity
            ))
        })?;
        let url = self.minute_url(request.symbol.as_str(), minutes, request.count);

        let body = get_text(&self.client, &url)?;
        let table = parse_minute(&body, request.symbol.as_str(), minutes)?;
        if table.is_empty() {
            return Err(ProviderError::EmptyResult);
        }
        Ok(table)
    }
}

/// Period unit in the kline `param` (`day`, `week`, `month`).
pub fn period_unit(granularity: Granularity) -> Option<&'static str> {
    match granularity {
        Granularity::Day => Some("day"),
        Granularity::Week => Some("week"),
        Granularity::Month => Some("month"),
        _ => None,
    }
}

/// End-date slot of the kline `param`: empty for "latest", which is also how
/// an as-of date equal to today is sent.
pub fn end_param(as_of: Option<NaiveDate>, today: NaiveDate) -> String {
    match as_of {
        Some(date) if date != today => date.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

/// Parse a day/week/month response, preferring the forward-adjusted series.
pub fn parse_kline(body: &str, symbol: &str, unit: &str) -> Result<QuoteTable, ProviderError> {
    let value = http::parse_json(body)?;
    let stock = symbol_block(&value, symbol)?;

    let adjusted_key = format!("qfq{unit}");
    let series = match stock.get(&adjusted_key) {
        Some(series) => series,
        None => {
            debug!(symbol, unit, "no forward-adjusted series, using raw bars");
            stock.get(unit).ok_or_else(|| {
                ProviderError::parse(format!("neither '{adjusted_key}' nor '{unit}' in response"))
            })?
        }
    };

    parse_rows(series)
}

/// Parse a minute response and overwrite the last bar's close with the live
/// quote, which reflects trading not yet folded into the bar history.
pub fn parse_minute(body: &str, symbol: &str, minutes: u32) -> Result<QuoteTable, ProviderError> {
    let value = http::parse_json(body)?;
    let stock = symbol_block(&value, symbol)?;

    let key = format!("m{minutes}");
    let series = stock
        .get(&key)
        .ok_or_else(|| ProviderError::parse(format!("no '{key}' series in response")))?;
    let mut table = parse_rows(series)?;

    if !table.is_empty() {
        table.set_last_close(live_price(stock, symbol)?);
    }
    Ok(table)
}

fn symbol_block<'a>(value: &'a Value, symbol: &str) -> Result<&'a Value, ProviderError> {
    let data = value
        .get("data")
        .ok_or_else(|| ProviderError::parse("missing 'data'"))?;
    data.get(symbol)
        .filter(|block| block.is_object())
        .ok_or_else(|| ProviderError::parse(format!("no data block for {symbol}")))
}

fn live_price(stock: &Value, symbol: &str) -> Result<f64, ProviderError> {
    stock
        .get("qt")
        .and_then(|qt| qt.get(symbol))
        .and_then(|fields| fields.get(LIVE_PRICE_FIELD))
        .and_then(http::number)
        .ok_or_else(|| ProviderError::parse(format!("no live quote for {symbol}")))
}

fn parse_rows(series: &Value) -> Result<QuoteTable, ProviderError> {
    let items = series
        .as_array()
        .ok_or_else(|| ProviderError::parse("bar series is not an array"))?;

    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        rows.push(parse_row(item).ok_or_else(|| {
            ProviderError::parse(format!("malformed bar at index {i}: {item}"))
        })?);
    }
    Ok(QuoteTable::from_unsorted(rows))
}

/// `[time, open, close, high, low, volume, ...]`; trailing extras (dividend
/// notes, turnover) are ignored.
fn parse_row(item: &Value) -> Option<QuoteRow> {
    let fields = item.as_array()?;
    let num = |i: usize| fields.get(i).and_then(http::number);
    Some(QuoteRow {
        timestamp: http::timestamp(fields.first()?.as_str()?)?,
        open: num(1)?,
        close: num(2)?,
        high: num(3)?,
        low: num(4)?,
        volume: num(5)?,
    })
}
