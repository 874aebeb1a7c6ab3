/// Pagination walk states
///
/// This module defines the states a listing walk moves through and which
/// moves between them are legal.
use std::fmt;

/// Represents where a pagination walk currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkState {
    // ===== Active States =====
    /// No page has been scraped yet
    Start,

    /// A listing page was scraped and its items collected
    PageLoaded,

    /// The next-page control is being clicked
    Advancing,

    /// The current page has no usable next-page control
    NoNext,

    // ===== Terminal States =====
    /// The walk finished; saved progress is no longer needed
    Done,

    /// The walk was cancelled; saved progress is kept for a later resume
    Interrupted,
}

impl WalkState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Interrupted)
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: WalkState) -> bool {
        use WalkState::*;
        matches!(
            (self, next),
            (Start, PageLoaded | Done | Interrupted)
                | (PageLoaded, Advancing | NoNext | Done | Interrupted)
                | (Advancing, PageLoaded | Done | Interrupted)
                | (NoNext, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PageLoaded => "page_loaded",
            Self::Advancing => "advancing",
            Self::NoNext => "no_next",
            Self::Done => "done",
            Self::Interrupted => "interrupted",
        }
    }

    /// Returns all walk states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::PageLoaded,
            Self::Advancing,
            Self::NoNext,
            Self::Done,
            Self::Interrupted,
        ]
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
