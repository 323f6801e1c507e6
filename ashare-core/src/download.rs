//! Download orchestrator: coordinates multi-symbol fetches with progress reporting.

use crate::domain::Granularity;
use crate::manager::{DataManager, ManagerError, SavedQuotes};
use chrono::NaiveDate;

/// Progress callback for batch downloads.
pub trait DownloadProgress: Send {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<SavedQuotes, ManagerError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<SavedQuotes, ManagerError>,
    ) {
        match result {
            Ok(saved) if saved.from_cache => {
                println!("  OK: {} ({} rows, cached)", saved.symbol, saved.table.len())
            }
            Ok(saved) => println!(
                "  OK: {} ({} rows) -> {}",
                saved.symbol,
                saved.table.len(),
                saved.archive_path.display()
            ),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Fetch and save several symbols one after another.
///
/// A failing symbol is recorded and the batch moves on.
pub fn download_symbols(
    manager: &DataManager,
    symbols: &[&str],
    granularity: Granularity,
    count: usize,
    as_of: Option<NaiveDate>,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut saved = Vec::new();
    let mut errors: Vec<(String, ManagerError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let result = manager.load_or_fetch(symbol, granularity, count, as_of, force);
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(quotes) => saved.push(quotes),
            Err(e) => errors.push((symbol.to_string(), e)),
        }
    }

    progress.on_batch_complete(saved.len(), errors.len(), total);

    DownloadSummary {
        total,
        succeeded: saved.len(),
        failed: errors.len(),
        saved,
        errors,
    }
}

/// Summary of a batch download operation.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub saved: Vec<SavedQuotes>,
    pub errors: Vec<(String, ManagerError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FetchRequest, ProviderError, QuoteFetcher, QuoteSource, QuoteStore, SourceId};
    use crate::domain::{QuoteRow, QuoteTable};
    use std::sync::Mutex;

    /// Serves one bar for Shanghai symbols and fails for everything else.
    struct ShanghaiOnly;

    impl QuoteSource for ShanghaiOnly {
        fn id(&self) -> SourceId {
            SourceId::SinaKline
        }

        fn fetch(&self, request: &FetchRequest) -> Result<QuoteTable, ProviderError> {
            if request.symbol.as_str().starts_with("sh") {
                let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap();
                Ok(QuoteTable::from_unsorted(vec![QuoteRow::from_values(
                    ts,
                    [1.0, 1.0, 1.0, 1.0, 1.0],
                )]))
            } else {
                Err(ProviderError::Transport("refused".into()))
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl DownloadProgress for Recorder {
        fn on_start(&self, symbol: &str, _index: usize, _total: usize) {
            self.events.lock().unwrap().push(format!("start {symbol}"));
        }

        fn on_complete(
            &self,
            symbol: &str,
            _index: usize,
            _total: usize,
            result: &Result<SavedQuotes, ManagerError>,
        ) {
            let tag = if result.is_ok() { "ok" } else { "fail" };
            self.events.lock().unwrap().push(format!("{tag} {symbol}"));
        }

        fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {succeeded}/{failed}/{total}"));
        }
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DataManager::new(
            QuoteFetcher::new(vec![Box::new(ShanghaiOnly)]),
            QuoteStore::new(dir.path().join("cache"), dir.path().join("stock")),
        );
        let progress = Recorder::default();

        let summary = download_symbols(
            &manager,
            &["600000", "300718", "sh601318"],
            Granularity::Day,
            1,
            None,
            true,
            &progress,
        );

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
        assert_eq!(summary.errors[0].0, "300718");
        assert_eq!(
            *progress.events.lock().unwrap(),
            vec![
                "start 600000",
                "ok 600000",
                "start 300718",
                "fail 300718",
                "start sh601318",
                "ok sh601318",
                "done 2/1/3",
            ]
        );
    }

    #[test]
    fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DataManager::new(
            QuoteFetcher::new(vec![]),
            QuoteStore::new(dir.path().join("cache"), dir.path().join("stock")),
        );
        let summary = download_symbols(
            &manager,
            &[],
            Granularity::Day,
            5,
            None,
            false,
            &StdoutProgress,
        );
        assert!(summary.all_succeeded());
        assert_eq!(summary.total, 0);
    }
}
