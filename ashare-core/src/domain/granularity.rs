//! Bar size / period requested from a provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requested bar period.
///
/// Displays and parses as the short frequency code (`1d`, `1w`, `1M`, `1m`,
/// `5m`, `15m`, `30m`, `60m`). The code is also the `{granularity}` token in
/// cache and archive file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "1M")]
    Month,
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "60m")]
    Min60,
}

impl Granularity {
    pub const ALL: [Granularity; 8] = [
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Min1,
        Granularity::Min5,
        Granularity::Min15,
        Granularity::Min30,
        Granularity::Min60,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Granularity::Day => "1d",
            Granularity::Week => "1w",
            Granularity::Month => "1M",
            Granularity::Min1 => "1m",
            Granularity::Min5 => "5m",
            Granularity::Min15 => "15m",
            Granularity::Min30 => "30m",
            Granularity::Min60 => "60m",
        }
    }

    /// True for minute bars.
    pub fn is_intraday(self) -> bool {
        self.minutes_per_bar().is_some()
    }

    /// Bar length for intraday granularities, `None` for day/week/month.
    pub fn minutes_per_bar(self) -> Option<u32> {
        match self {
            Granularity::Min1 => Some(1),
            Granularity::Min5 => Some(5),
            Granularity::Min15 => Some(15),
            Granularity::Min30 => Some(30),
            Granularity::Min60 => Some(60),
            Granularity::Day | Granularity::Week | Granularity::Month => None,
        }
    }

    /// Human-readable label used by the CLI.
    pub fn label(self) -> &'static str {
        match self {
            Granularity::Day => "daily",
            Granularity::Week => "weekly",
            Granularity::Month => "monthly",
            Granularity::Min1 => "1-minute",
            Granularity::Min5 => "5-minute",
            Granularity::Min15 => "15-minute",
            Granularity::Min30 => "30-minute",
            Granularity::Min60 => "60-minute",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown granularity '{0}' (expected one of 1d, 1w, 1M, 1m, 5m, 15m, 30m, 60m)")]
pub struct ParseGranularityError(pub String);

impl FromStr for Granularity {
    type Err = ParseGranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `1M` and `1m` differ only by case, so match exactly first.
        if let Some(g) = Granularity::ALL.iter().find(|g| g.code() == s) {
            return Ok(*g);
        }
        match s.to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(ParseGranularityError(s.to_string())),
        }
    }
}
