//! Quote acquisition and storage

pub mod codec;
pub mod directory;
pub mod fallback;
pub mod frame;
pub mod http;
pub mod provider;
pub mod sina;
pub mod store;
pub mod tencent;

pub use codec::{CodecError, TableDocument};
pub use directory::{StockDirectory, StockListing};
pub use fallback::{fallback_order, Attempt, Attempts, FetchError, QuoteFetcher};
pub use frame::{FrameError, QuoteSchema};
pub use provider::{FetchRequest, ProviderError, QuoteSource, SourceId};
pub use sina::SinaKline;
pub use store::{CacheEntry, QuoteStore, StoreError};
pub use tencent::{TencentKline, TencentMinute};
