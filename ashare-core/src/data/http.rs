//! Blocking HTTP plumbing and defensive payload helpers shared by the adapters.

use super::provider::ProviderError;
use crate::config::HttpConfig;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

/// Build the blocking client every adapter shares.
pub fn build_client(config: &HttpConfig) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.as_str())
        .build()
}

/// GET `url` and return the body. Connect failures, timeouts and non-2xx
/// statuses are all [`ProviderError::Transport`].
pub fn get_text(client: &reqwest::blocking::Client, url: &str) -> Result<String, ProviderError> {
    get_text_with(client.get(url), url)
}

/// Like [`get_text`] but for a prepared request (extra headers etc).
pub fn get_text_with(
    request: reqwest::blocking::RequestBuilder,
    url: &str,
) -> Result<String, ProviderError> {
    debug!(url, "GET");
    let resp = request
        .send()
        .map_err(|e| ProviderError::Transport(format!("{url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(ProviderError::Transport(format!("HTTP {status} for {url}")));
    }

    resp.text()
        .map_err(|e| ProviderError::Transport(format!("reading body of {url}: {e}")))
}

/// Strip a `var name = ...;` JavaScript wrapper, if any, leaving the payload.
pub fn unwrap_js(body: &str) -> &str {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    match trimmed.split_once('=') {
        Some((_, rest)) => rest.trim().trim_end_matches(';').trim_end(),
        None => trimmed,
    }
}

/// Parse a body (optionally JS-wrapped) as JSON.
pub fn parse_json(body: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(unwrap_js(body))
        .map_err(|e| ProviderError::parse(format!("invalid JSON: {e}")))
}

/// Providers send numbers either as JSON numbers or as numeric strings.
pub fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Parse a provider timestamp. Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`
/// and the compact `YYYYMMDDHHMM` used by minute bars.
pub fn timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if raw.len() == 12 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return compact_minute(raw);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// `YYYYMMDDHHMM`, caller has checked it is 12 ASCII digits.
fn compact_minute(raw: &str) -> Option<NaiveDateTime> {
    let field = |range: std::ops::Range<usize>| raw[range].parse::<u32>().ok();
    let year = raw[0..4].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?
        .and_hms_opt(field(8..10)?, field(10..12)?, 0)
}
