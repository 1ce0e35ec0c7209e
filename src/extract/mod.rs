//! Record extraction for fetched leaf documents
//!
//! The harvester is markup-agnostic: everything it knows about turning a
//! leaf page into output rows goes through the [`RecordExtractor`] trait.
//! [`JournalArticleExtractor`] is the built-in implementation for Open
//! Journal Systems article pages.

mod journal;

pub use journal::JournalArticleExtractor;

use thiserror::Error;
use url::Url;

/// Errors a record extractor may report for one leaf
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document is not an article page: {0}")]
    NotAnArticle(String),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("invalid extractor selector {0}")]
    InvalidSelector(String),
}

/// One structured output row derived from a leaf
///
/// Fields keep the order the extractor produced them in; a `None` value marks
/// a field the extractor looked for but could not find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
    source_url: String,
}

impl Record {
    /// Creates an empty record for the given leaf URL
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            source_url: source_url.into(),
        }
    }

    /// Builder-style [`Record::set`]
    pub fn with_field<V: Into<String>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field, replacing an existing value in place
    pub fn set<V: Into<String>>(&mut self, name: impl Into<String>, value: Option<V>) {
        let name = name.into();
        let value = value.map(Into::into);
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Returns the value of a field; `None` if absent or missing
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Fields in extraction order
    pub fn fields(&self) -> &[(String, Option<String>)] {
        &self.fields
    }

    /// The leaf this record was extracted from
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub(crate) fn set_source_url(&mut self, source_url: &str) {
        self.source_url = source_url.to_string();
    }
}

/// Maps one fetched leaf document to zero or more records
///
/// Called at most once per successfully fetched leaf, on the worker that
/// fetched it, with the raw body and the leaf's own URL (for resolving
/// relative links inside field values). An `Err` becomes a per-leaf
/// diagnostic; the run continues.
pub trait RecordExtractor: Send + Sync {
    fn extract(&self, body: &str, leaf_url: &Url) -> Result<Vec<Record>, ExtractError>;
}

impl<F> RecordExtractor for F
where
    F: Fn(&str, &Url) -> Result<Vec<Record>, ExtractError> + Send + Sync,
{
    fn extract(&self, body: &str, leaf_url: &Url) -> Result<Vec<Record>, ExtractError> {
        self(body, leaf_url)
    }
}
