//! Ashare Core: quote acquisition, normalization and storage for A-shares.
//!
//! This crate contains:
//! - Domain types (canonical symbols, granularities, quote tables)
//! - Provider adapters for Tencent and Sina with ordered fallback
//! - A library-agnostic JSON table codec
//! - Cache and date-partitioned archive storage
//! - The `DataManager` facade and batch download

pub mod config;
pub mod data;
pub mod domain;
pub mod download;
pub mod manager;

pub use config::{AshareConfig, ConfigError};
pub use domain::{CanonicalSymbol, Granularity, QuoteRow, QuoteTable};
pub use manager::{DataManager, ManagerError, SavedQuotes};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::QuoteTable>();
        require_sync::<domain::QuoteTable>();
        require_send::<domain::CanonicalSymbol>();
        require_sync::<domain::CanonicalSymbol>();

        require_send::<data::QuoteFetcher>();
        require_sync::<data::QuoteFetcher>();
        require_send::<data::QuoteStore>();
        require_sync::<data::QuoteStore>();
        require_send::<data::StockDirectory>();
        require_sync::<data::StockDirectory>();

        require_send::<manager::DataManager>();
        require_sync::<manager::DataManager>();
        require_send::<manager::ManagerError>();
        require_sync::<manager::ManagerError>();
    }

    /// Adapters are usable as trait objects behind the fetcher.
    #[test]
    fn quote_source_is_object_safe() {
        fn _check(source: &dyn data::QuoteSource, request: &data::FetchRequest) {
            let _ = source.fetch(request);
        }
    }
}
