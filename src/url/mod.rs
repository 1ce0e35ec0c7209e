//! URL handling module for Archive-Harvest
//!
//! Provides the normalization that turns discovered hrefs into the keys the
//! deduplicator admits and the URLs the executor fetches.

mod normalize;

pub use normalize::normalize_url;
