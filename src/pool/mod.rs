//! Pool module - batched entity retrieval.

mod fetcher;

pub use fetcher::*;
