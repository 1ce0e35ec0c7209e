//! Run-wide URL deduplication
//!
//! Every URL is admitted at most once per [`PageKind`], keyed on its
//! normalized form. Admission is atomic, so concurrent workers racing on the
//! same link schedule it exactly once.

use crate::state::PageKind;
use crate::url::normalize_url;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<(PageKind, String)>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a URL is offered for a kind
    ///
    /// URLs that fail to normalize are compared verbatim.
    pub fn admit(&self, url: &str, kind: PageKind) -> bool {
        let key = match normalize_url(url) {
            Ok(normalized) => normalized.to_string(),
            Err(e) => {
                tracing::debug!("Deduplicating unnormalizable URL {} verbatim: {}", url, e);
                url.trim().to_string()
            }
        };

        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let admitted = seen.insert((kind, key));
        if !admitted {
            tracing::trace!("Skipping duplicate {} {}", kind, url);
        }
        admitted
    }

    /// Number of distinct URLs admitted so far
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
