/// Task state definitions for tracking fetch progress
///
/// Every URL the harvester schedules moves through this small state machine.
use std::fmt;

/// Level of the link hierarchy a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageKind {
    /// A paginated page enumerating containers
    ListingPage,

    /// An intermediate page (e.g. an issue) enumerating leaves
    Container,

    /// A terminal document records are extracted from
    Leaf,
}

impl PageKind {
    /// Returns all kinds in phase order
    pub fn all() -> [Self; 3] {
        [Self::ListingPage, Self::Container, Self::Leaf]
    }

    /// Position of this kind in phase order
    pub fn index(&self) -> usize {
        match self {
            Self::ListingPage => 0,
            Self::Container => 1,
            Self::Leaf => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListingPage => "listing_page",
            Self::Container => "container",
            Self::Leaf => "leaf",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the current state of a fetch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Scheduled but no attempt made yet
    Pending,

    /// An attempt is in progress
    InFlight,

    /// The last attempt failed in a way that may succeed on retry
    TransientError,

    // ===== Terminal States =====
    /// Fetched successfully
    Succeeded,

    /// The server answered 404
    NotFound,

    /// Retries exhausted, cancelled, or the fetched document could not be used
    Failed,
}

impl TaskState {
    /// Returns true if no further attempt will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::NotFound | Self::Failed)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// ```text
    /// Pending -> InFlight -> {Succeeded, NotFound, Failed}
    /// InFlight -> TransientError -> InFlight        (retry)
    /// TransientError -> Failed                      (exhausted or cancelled)
    /// Pending -> Failed                             (cancelled before first attempt)
    /// ```
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (Pending, Failed)
                | (InFlight, TransientError)
                | (InFlight, Succeeded)
                | (InFlight, NotFound)
                | (InFlight, Failed)
                | (TransientError, InFlight)
                | (TransientError, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::TransientError => "transient_error",
            Self::Succeeded => "succeeded",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
