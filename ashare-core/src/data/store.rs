//! Cache and archive storage for quote tables.
//!
//! Layout:
//! - cache:   `{cache_dir}/{symbol}_{granularity}.json` (latest only, overwritten)
//! - archive: `{stock_dir}/{YYYYMMDD}/{symbol}_{granularity}_{YYYYMMDD}.json`
//!   (one per fetch date, overwritten only by a fetch on the same date)
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Per-key write lock, so concurrent writers of the same key are serialized
//!   and the last writer wins cleanly. [`QuoteStore::save`] holds it across
//!   the cache and archive writes.
//! - Entries from a past-date fetch carry their as-of date
//! - Absent cache entries read as `None`, not as an error

use super::codec::{self, CodecError};
use crate::domain::{CanonicalSymbol, Granularity, QuoteTable};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to encode table for {path}: {source}")]
    Encode { path: PathBuf, source: CodecError },

    #[error("corrupt table in {path}: {source}")]
    Decode { path: PathBuf, source: CodecError },
}

/// Create `dir` and its parents. Succeeds if it already exists.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Identity of a cache entry.
type Key = (CanonicalSymbol, Granularity);

/// Sole writer of cache and archive entries.
#[derive(Debug)]
pub struct QuoteStore {
    cache_dir: PathBuf,
    stock_dir: PathBuf,
    locks: Mutex<HashMap<Key, Arc<Mutex<()>>>>,
}

impl QuoteStore {
    pub fn new(cache_dir: impl Into<PathBuf>, stock_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            stock_dir: stock_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn stock_dir(&self) -> &Path {
        &self.stock_dir
    }

    /// Create both root directories.
    pub fn init(&self) -> Result<(), StoreError> {
        ensure_dir(&self.cache_dir)?;
        ensure_dir(&self.stock_dir)
    }

    /// `{cache_dir}/{symbol}_{granularity}.json`
    pub fn cache_path(&self, symbol: &CanonicalSymbol, granularity: Granularity) -> PathBuf {
        self.cache_dir.join(format!("{symbol}_{granularity}.json"))
    }

    /// `{stock_dir}/{YYYYMMDD}/{symbol}_{granularity}_{YYYYMMDD}.json`
    pub fn archive_path(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        fetch_date: NaiveDate,
    ) -> PathBuf {
        let day = fetch_date.format("%Y%m%d");
        self.stock_dir
            .join(day.to_string())
            .join(format!("{symbol}_{granularity}_{day}.json"))
    }

    /// Replace the cache entry for (symbol, granularity) with a latest table.
    pub fn put_cache(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        table: &QuoteTable,
    ) -> Result<PathBuf, StoreError> {
        let path = self.cache_path(symbol, granularity);
        self.with_key_lock(symbol, granularity, || write_table(&path, table, None))?;
        info!(path = %path.display(), rows = table.len(), "cache updated");
        Ok(path)
    }

    /// Read the cache entry, `None` if it was never written.
    pub fn get_cache(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
    ) -> Result<Option<QuoteTable>, StoreError> {
        Ok(self
            .get_cache_entry(symbol, granularity)?
            .map(|entry| entry.table))
    }

    /// Read the cache entry together with the as-of date it was fetched for.
    pub fn get_cache_entry(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
    ) -> Result<Option<CacheEntry>, StoreError> {
        read_entry(&self.cache_path(symbol, granularity))
    }

    /// Write the archive entry for `fetch_date` and return its path.
    pub fn archive(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        table: &QuoteTable,
        fetch_date: NaiveDate,
    ) -> Result<PathBuf, StoreError> {
        let path = self.archive_path(symbol, granularity, fetch_date);
        self.with_key_lock(symbol, granularity, || write_table(&path, table, None))?;
        info!(path = %path.display(), rows = table.len(), "archive written");
        Ok(path)
    }

    /// Write the cache entry and the archive entry for `fetch_date` under one
    /// hold of the key lock, so both always hold the same table.
    /// Returns `(cache_path, archive_path)`.
    pub fn save(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        table: &QuoteTable,
        as_of: Option<NaiveDate>,
        fetch_date: NaiveDate,
    ) -> Result<(PathBuf, PathBuf), StoreError> {
        let cache_path = self.cache_path(symbol, granularity);
        let archive_path = self.archive_path(symbol, granularity, fetch_date);
        self.with_key_lock(symbol, granularity, || {
            write_table(&cache_path, table, as_of)?;
            write_table(&archive_path, table, as_of)
        })?;
        info!(
            cache = %cache_path.display(),
            archive = %archive_path.display(),
            rows = table.len(),
            "table saved"
        );
        Ok((cache_path, archive_path))
    }

    /// Read an archive entry, `None` if there is none for that date.
    pub fn get_archive(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        fetch_date: NaiveDate,
    ) -> Result<Option<QuoteTable>, StoreError> {
        Ok(read_entry(&self.archive_path(symbol, granularity, fetch_date))?.map(|e| e.table))
    }

    pub fn has_archive(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        fetch_date: NaiveDate,
    ) -> bool {
        self.archive_path(symbol, granularity, fetch_date).is_file()
    }

    /// Run `write` while holding the key's lock. The map entry is dropped
    /// again once no other writer holds or waits on it, so the map only
    /// grows with the number of keys being written at the same time.
    fn with_key_lock<T>(
        &self,
        symbol: &CanonicalSymbol,
        granularity: Granularity,
        write: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let key = (symbol.clone(), granularity);
        let lock = {
            // The map only hands out lock handles; a poisoned map is still usable.
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            write()
        };

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Handles are cloned only under the map lock: two means the map and us.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
        result
    }
}

/// A decoded cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub table: QuoteTable,
    /// The past date the table was fetched for, `None` for a latest fetch.
    pub as_of: Option<NaiveDate>,
}

impl CacheEntry {
    pub fn is_latest(&self) -> bool {
        self.as_of.is_none()
    }
}

/// Encode `table` and write it atomically, creating parent directories.
fn write_table(
    path: &Path,
    table: &QuoteTable,
    as_of: Option<NaiveDate>,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let json = codec::to_json_as_of(table, as_of).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(|source| StoreError::Write {
        path: tmp_path.clone(),
        source,
    })?;

    fs::rename(&tmp_path, path).map_err(|source| {
        // Clean up temp file on rename failure
        let _ = fs::remove_file(&tmp_path);
        StoreError::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;

    debug!(path = %path.display(), "table written");
    Ok(())
}

fn read_entry(path: &Path) -> Result<Option<CacheEntry>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    codec::from_json_as_of(&text)
        .map(|(table, as_of)| Some(CacheEntry { table, as_of }))
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
}
