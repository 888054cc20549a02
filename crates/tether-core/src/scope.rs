//! Scope-end events delivered to end-of-scope observers.

use std::fmt;

/// How a memory context's scope ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeEnd {
    /// The context was reset. Every block it owned is reclaimed, but the
    /// context itself persists and may be allocated from (and reset) again.
    Reset,
    /// The context was deleted. Its id is dead once the delete completes.
    Delete,
}

impl ScopeEnd {
    /// Whether this event is a delete.
    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for ScopeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => write!(f, "reset"),
            Self::Delete => write!(f, "delete"),
        }
    }
}
