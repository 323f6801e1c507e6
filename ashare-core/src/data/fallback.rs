//! Fetch orchestrator: ordered provider fallback per granularity.
//!
//! The fallback order is a declared table ([`fallback_order`]), not control
//! flow, so it can be checked without touching the network:
//!
//! | granularity          | order                                |
//! |----------------------|--------------------------------------|
//! | day / week / month   | Sina kline → Tencent kline           |
//! | 1-minute             | Tencent minute                       |
//! | 5/15/30/60-minute    | Sina kline → Tencent minute          |
//!
//! Sources are tried strictly one at a time. Any adapter failure (transport,
//! parse, empty) moves on to the next source; only exhaustion is reported.

use super::http::build_client;
use super::provider::{FetchRequest, ProviderError, QuoteSource, SourceId};
use super::sina::SinaKline;
use super::tencent::{TencentKline, TencentMinute};
use crate::config::AshareConfig;
use crate::domain::{CanonicalSymbol, Granularity, QuoteTable};
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

const PERIOD_ORDER: &[SourceId] = &[SourceId::SinaKline, SourceId::TencentKline];
// Sina's 1-minute bars are unreliable.
const ONE_MINUTE_ORDER: &[SourceId] = &[SourceId::TencentMinute];
const MINUTE_ORDER: &[SourceId] = &[SourceId::SinaKline, SourceId::TencentMinute];

/// Adapter order for a granularity.
pub fn fallback_order(granularity: Granularity) -> &'static [SourceId] {
    match granularity {
        Granularity::Day | Granularity::Week | Granularity::Month => PERIOD_ORDER,
        Granularity::Min1 => ONE_MINUTE_ORDER,
        Granularity::Min5 | Granularity::Min15 | Granularity::Min30 | Granularity::Min60 => {
            MINUTE_ORDER
        }
    }
}

/// One failed provider attempt.
#[derive(Debug)]
pub struct Attempt {
    pub source: SourceId,
    pub error: ProviderError,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.error)
    }
}

/// Wrapper so the attempt list renders as `a: x; b: y` inside error messages.
#[derive(Debug)]
pub struct Attempts(pub Vec<Attempt>);

impl fmt::Display for Attempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no provider configured");
        }
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{attempt}")?;
        }
        Ok(())
    }
}

/// Outcome of a fetch that produced no table.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no provider could serve {granularity} bars for {symbol} ({attempts})")]
    NoProviderAvailable {
        symbol: CanonicalSymbol,
        granularity: Granularity,
        attempts: Attempts,
    },

    #[error("every provider answered with zero {granularity} bars for {symbol}")]
    EmptyResult {
        symbol: CanonicalSymbol,
        granularity: Granularity,
    },

    #[error("bar count must be at least 1")]
    InvalidCount,
}

/// Runs adapters in fallback order and returns the first non-empty table.
pub struct QuoteFetcher {
    sources: Vec<Box<dyn QuoteSource>>,
}

impl QuoteFetcher {
    /// Build from an explicit set of adapters. Adapters whose id is not in a
    /// granularity's fallback order are never used for it.
    pub fn new(sources: Vec<Box<dyn QuoteSource>>) -> Self {
        Self { sources }
    }

    /// The production adapters, sharing one HTTP client.
    pub fn from_config(config: &AshareConfig) -> reqwest::Result<Self> {
        let client = build_client(&config.http)?;
        let endpoints = &config.endpoints;
        Ok(Self::new(vec![
            Box::new(SinaKline::new(client.clone(), &endpoints.sina_kline)),
            Box::new(TencentKline::new(client.clone(), &endpoints.tencent_kline)),
            Box::new(TencentMinute::new(client, &endpoints.tencent_minute)),
        ]))
    }

    fn source(&self, id: SourceId) -> Option<&dyn QuoteSource> {
        self.sources.iter().find(|s| s.id() == id).map(|s| &**s)
    }

    /// Normalize `symbol` and fetch `count` bars ending at `as_of` (or now).
    pub fn fetch_quotes(
        &self,
        symbol: &str,
        granularity: Granularity,
        count: usize,
        as_of: Option<NaiveDate>,
    ) -> Result<QuoteTable, FetchError> {
        self.fetch(&FetchRequest::new(symbol, granularity, count, as_of))
    }

    /// Fetch an already-normalized request.
    pub fn fetch(&self, request: &FetchRequest) -> Result<QuoteTable, FetchError> {
        if request.count == 0 {
            return Err(FetchError::InvalidCount);
        }

        let mut attempts = Vec::new();

        for &id in fallback_order(request.granularity) {
            let Some(source) = self.source(id) else {
                continue;
            };

            info!(
                source = %id,
                symbol = %request.symbol,
                granularity = %request.granularity,
                count = request.count,
                "fetching quotes"
            );

            match source.fetch(request) {
                Ok(table) if !table.is_empty() => {
                    info!(source = %id, rows = table.len(), "fetched quotes");
                    return Ok(table);
                }
                Ok(_) => {
                    warn!(source = %id, "provider returned an empty table, trying next");
                    attempts.push(Attempt {
                        source: id,
                        error: ProviderError::EmptyResult,
                    });
                }
                Err(error) => {
                    warn!(source = %id, %error, "provider failed, trying next");
                    attempts.push(Attempt { source: id, error });
                }
            }
        }

        let all_empty = !attempts.is_empty()
            && attempts
                .iter()
                .all(|a| matches!(a.error, ProviderError::EmptyResult));

        if all_empty {
            Err(FetchError::EmptyResult {
                symbol: request.symbol.clone(),
                granularity: request.granularity,
            })
        } else {
            Err(FetchError::NoProviderAvailable {
                symbol: request.symbol.clone(),
                granularity: request.granularity,
                attempts: Attempts(attempts),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuoteRow;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<SourceId>>>;

    enum Behavior {
        Rows(usize),
        EmptyOk,
        Empty,
        Transport,
    }

    struct MockSource {
        id: SourceId,
        behavior: Behavior,
        calls: CallLog,
    }

    impl QuoteSource for MockSource {
        fn id(&self) -> SourceId {
            self.id
        }

        fn fetch(&self, _request: &FetchRequest) -> Result<QuoteTable, ProviderError> {
            self.calls.lock().unwrap().push(self.id);
            match self.behavior {
                Behavior::Rows(n) => Ok(rows(n)),
                Behavior::EmptyOk => Ok(QuoteTable::empty()),
                Behavior::Empty => Err(ProviderError::EmptyResult),
                Behavior::Transport => Err(ProviderError::Transport("connection refused".into())),
            }
        }
    }

    fn rows(n: usize) -> QuoteTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        QuoteTable::from_unsorted(
            (0..n)
                .map(|i| QuoteRow {
                    timestamp: (start + chrono::Duration::days(i as i64))
                        .and_hms_opt(0, 0, 0)
                        .unwrap(),
                    open: 1.0,
                    close: 1.0 + i as f64,
                    high: 2.0,
                    low: 0.5,
                    volume: 100.0,
                })
                .collect(),
        )
    }

    fn fetcher(script: Vec<(SourceId, Behavior)>) -> (QuoteFetcher, CallLog) {
        let calls: CallLog = Arc::default();
        let sources = script
            .into_iter()
            .map(|(id, behavior)| {
                Box::new(MockSource {
                    id,
                    behavior,
                    calls: calls.clone(),
                }) as Box<dyn QuoteSource>
            })
            .collect();
        (QuoteFetcher::new(sources), calls)
    }

    #[test]
    fn declared_orders() {
        assert_eq!(
            fallback_order(Granularity::Week),
            &[SourceId::SinaKline, SourceId::TencentKline]
        );
        assert_eq!(fallback_order(Granularity::Min1), &[SourceId::TencentMinute]);
        assert_eq!(
            fallback_order(Granularity::Min60),
            &[SourceId::SinaKline, SourceId::TencentMinute]
        );
    }

    #[test]
    fn first_success_wins_without_touching_the_rest() {
        let (f, calls) = fetcher(vec![
            (SourceId::TencentKline, Behavior::Rows(2)),
            (SourceId::SinaKline, Behavior::Rows(5)),
        ]);
        let table = f.fetch_quotes("300718", Granularity::Day, 5, None).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(*calls.lock().unwrap(), vec![SourceId::SinaKline]);
    }

    #[test]
    fn transport_failure_falls_back() {
        let (f, calls) = fetcher(vec![
            (SourceId::SinaKline, Behavior::Transport),
            (SourceId::TencentKline, Behavior::Rows(3)),
        ]);
        let table = f.fetch_quotes("sz300718", Granularity::Day, 5, None).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![SourceId::SinaKline, SourceId::TencentKline]
        );
    }

    #[test]
    fn ok_but_empty_table_counts_as_failure() {
        let (f, _) = fetcher(vec![
            (SourceId::SinaKline, Behavior::EmptyOk),
            (SourceId::TencentMinute, Behavior::Rows(4)),
        ]);
        let table = f.fetch_quotes("600000", Granularity::Min5, 4, None).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn one_minute_never_asks_sina() {
        let (f, calls) = fetcher(vec![
            (SourceId::SinaKline, Behavior::Rows(5)),
            (SourceId::TencentMinute, Behavior::Transport),
        ]);
        let err = f.fetch_quotes("600000", Granularity::Min1, 5, None).unwrap_err();
        assert!(matches!(err, FetchError::NoProviderAvailable { .. }));
        assert_eq!(*calls.lock().unwrap(), vec![SourceId::TencentMinute]);
    }

    #[test]
    fn exhaustion_lists_every_attempt() {
        let (f, _) = fetcher(vec![
            (SourceId::SinaKline, Behavior::Transport),
            (SourceId::TencentKline, Behavior::Empty),
        ]);
        let err = f.fetch_quotes("600000", Granularity::Month, 5, None).unwrap_err();
        match &err {
            FetchError::NoProviderAvailable {
                symbol, attempts, ..
            } => {
                assert_eq!(symbol.as_str(), "sh600000");
                assert_eq!(attempts.0.len(), 2);
            }
            other => panic!("expected NoProviderAvailable, got {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("sina_kline: transport error"), "{msg}");
        assert!(msg.contains("tencent_kline: provider returned no rows"), "{msg}");
    }

    #[test]
    fn all_empty_reports_empty_result() {
        let (f, _) = fetcher(vec![
            (SourceId::SinaKline, Behavior::Empty),
            (SourceId::TencentKline, Behavior::EmptyOk),
        ]);
        let err = f.fetch_quotes("600000", Granularity::Day, 5, None).unwrap_err();
        assert!(matches!(err, FetchError::EmptyResult { .. }));
    }

    #[test]
    fn no_sources_is_no_provider() {
        let (f, _) = fetcher(vec![]);
        let err = f.fetch_quotes("600000", Granularity::Day, 5, None).unwrap_err();
        assert!(err.to_string().contains("no provider configured"));
    }

    #[test]
    fn zero_count_is_rejected_before_any_call() {
        let (f, calls) = fetcher(vec![(SourceId::SinaKline, Behavior::Rows(1))]);
        let err = f.fetch_quotes("600000", Granularity::Day, 0, None).unwrap_err();
        assert!(matches!(err, FetchError::InvalidCount));
        assert!(calls.lock().unwrap().is_empty());
    }
}
