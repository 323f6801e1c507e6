//! Domain types: symbols, granularities, quote tables

pub mod granularity;
pub mod quote;
pub mod symbol;

pub use granularity::{Granularity, ParseGranularityError};
pub use quote::{QuoteRow, QuoteTable, TableError, COLUMNS};
pub use symbol::{CanonicalSymbol, Market};
