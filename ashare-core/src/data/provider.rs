//! Quote source trait and adapter-level error types.
//!
//! A `QuoteSource` knows one provider's URL scheme and response shape and turns
//! a response into a [`QuoteTable`]. Sources never retry and never fall back;
//! ordering and fallback belong to [`QuoteFetcher`](super::fallback::QuoteFetcher).

use crate::domain::{CanonicalSymbol, Granularity, QuoteTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a single provider attempt failed. Caught by the orchestrator and
/// turned into the next fallback attempt.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected payload: {0}")]
    Parse(String),

    #[error("provider returned no rows")]
    EmptyResult,
}

impl ProviderError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        ProviderError::Parse(msg.into())
    }
}

/// The adapters, one per (provider, wire format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Provider B: Sina's scale-parameterized kline endpoint (all but 1-minute).
    SinaKline,
    /// Provider A: Tencent's forward-adjusted day/week/month endpoint.
    TencentKline,
    /// Provider A: Tencent's recent-N minute bars plus live quote.
    TencentMinute,
}

impl SourceId {
    pub fn name(self) -> &'static str {
        match self {
            SourceId::SinaKline => "sina_kline",
            SourceId::TencentKline => "tencent_kline",
            SourceId::TencentMinute => "tencent_minute",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One fetch, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: CanonicalSymbol,
    pub granularity: Granularity,
    /// Number of bars wanted. Providers may return fewer.
    pub count: usize,
    /// Only bars on or before this date. `None` means "up to now".
    pub as_of: Option<NaiveDate>,
}

impl FetchRequest {
    pub fn new(
        symbol: impl Into<CanonicalSymbol>,
        granularity: Granularity,
        count: usize,
        as_of: Option<NaiveDate>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            granularity,
            count,
            as_of,
        }
    }
}

/// Capability interface implemented by every adapter.
pub trait QuoteSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Fetch bars for `request`. An empty table must be reported as
    /// [`ProviderError::EmptyResult`], not `Ok`.
    fn fetch(&self, request: &FetchRequest) -> Result<QuoteTable, ProviderError>;
}
