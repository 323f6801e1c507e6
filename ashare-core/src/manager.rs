//! Fetch-then-persist facade used by the CLI.

use crate::config::AshareConfig;
use crate::data::{FetchError, FetchRequest, QuoteFetcher, QuoteStore, StoreError};
use crate::domain::{CanonicalSymbol, Granularity, QuoteTable};
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A table together with where it lives on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedQuotes {
    pub symbol: CanonicalSymbol,
    pub granularity: Granularity,
    pub table: QuoteTable,
    pub cache_path: PathBuf,
    pub archive_path: PathBuf,
    /// True when served from the cache without a network call.
    pub from_cache: bool,
}

pub struct DataManager {
    fetcher: QuoteFetcher,
    store: QuoteStore,
}

impl DataManager {
    pub fn new(fetcher: QuoteFetcher, store: QuoteStore) -> Self {
        Self { fetcher, store }
    }

    /// Production adapters and the configured cache/archive roots.
    pub fn from_config(config: &AshareConfig) -> Result<Self, ManagerError> {
        let fetcher = QuoteFetcher::from_config(config)?;
        let store = QuoteStore::new(&config.cache_dir, &config.stock_dir);
        store.init()?;
        Ok(Self::new(fetcher, store))
    }

    pub fn store(&self) -> &QuoteStore {
        &self.store
    }

    pub fn fetcher(&self) -> &QuoteFetcher {
        &self.fetcher
    }

    /// Fetch, then write the cache entry and today's archive entry.
    /// Nothing is written unless the fetch succeeds.
    pub fn get_and_save(
        &self,
        symbol: &str,
        granularity: Granularity,
        count: usize,
        as_of: Option<NaiveDate>,
    ) -> Result<SavedQuotes, ManagerError> {
        self.get_and_save_on(symbol, granularity, count, as_of, Local::now().date_naive())
    }

    /// [`get_and_save`](Self::get_and_save) with an explicit archive date.
    pub fn get_and_save_on(
        &self,
        symbol: &str,
        granularity: Granularity,
        count: usize,
        as_of: Option<NaiveDate>,
        fetch_date: NaiveDate,
    ) -> Result<SavedQuotes, ManagerError> {
        let request = FetchRequest::new(symbol, granularity, count, as_of);
        let table = self.fetcher.fetch(&request)?;

        let (cache_path, archive_path) =
            self.store.save(&request.symbol, granularity, &table, as_of, fetch_date)?;

        Ok(SavedQuotes {
            symbol: request.symbol,
            granularity,
            table,
            cache_path,
            archive_path,
            from_cache: false,
        })
    }

    /// Read the cache entry without touching the network.
    pub fn load_cached(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> Result<Option<QuoteTable>, ManagerError> {
        let symbol = CanonicalSymbol::normalize(symbol);
        Ok(self.store.get_cache(&symbol, granularity)?)
    }

    /// Serve from the cache when today's data is already on disk, otherwise
    /// [`get_and_save`](Self::get_and_save).
    ///
    /// The cache is reused only for a latest (no `as_of`) day/week/month
    /// request whose archive entry for today exists and whose cached table
    /// came from a latest fetch and holds at least `count` rows. Minute bars
    /// always go to the network.
    pub fn load_or_fetch(
        &self,
        symbol: &str,
        granularity: Granularity,
        count: usize,
        as_of: Option<NaiveDate>,
        force: bool,
    ) -> Result<SavedQuotes, ManagerError> {
        self.load_or_fetch_on(symbol, granularity, count, as_of, force, Local::now().date_naive())
    }

    pub fn load_or_fetch_on(
        &self,
        symbol: &str,
        granularity: Granularity,
        count: usize,
        as_of: Option<NaiveDate>,
        force: bool,
        today: NaiveDate,
    ) -> Result<SavedQuotes, ManagerError> {
        if count == 0 {
            return Err(FetchError::InvalidCount.into());
        }

        let reusable = !force
            && as_of.is_none()
            && !granularity.is_intraday()
            && self
                .store
                .has_archive(&CanonicalSymbol::normalize(symbol), granularity, today);

        if reusable {
            let canonical = CanonicalSymbol::normalize(symbol);
            if let Some(entry) = self.store.get_cache_entry(&canonical, granularity)? {
                if entry.is_latest() && entry.table.len() >= count {
                    info!(symbol = %canonical, %granularity, "serving from cache");
                    return Ok(SavedQuotes {
                        cache_path: self.store.cache_path(&canonical, granularity),
                        archive_path: self.store.archive_path(&canonical, granularity, today),
                        symbol: canonical,
                        granularity,
                        table: entry.table.tail(count),
                        from_cache: true,
                    });
                }
            }
        }

        self.get_and_save_on(symbol, granularity, count, as_of, today)
    }
}
