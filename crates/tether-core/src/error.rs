//! Arena error types.
//!
//! Shared by the host arena and everything layered over its dispatch
//! table, so it lives in the leaf crate.

use std::error::Error;
use std::fmt;

use crate::id::{BlockAddr, ContextId};

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The arena configuration is invalid.
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },
    /// Segment pool is full: no more segments can be allocated, or the
    /// request can never fit in a single segment.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Total capacity available across all segments.
        capacity: usize,
    },
    /// The context id does not name a live context (never created, or
    /// already deleted).
    UnknownContext {
        /// The unrecognised context.
        context: ContextId,
    },
    /// The root context has no parent scope and can never be deleted.
    CannotDeleteRoot {
        /// The root context.
        context: ContextId,
    },
    /// Every context slot is in use.
    TooManyContexts {
        /// Configured maximum number of live contexts.
        limit: u32,
    },
    /// The address does not name a live block of the given context.
    UnknownBlock {
        /// The unrecognised address.
        addr: BlockAddr,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "arena capacity exceeded: requested {requested} bytes, capacity {capacity} bytes"
                )
            }
            Self::UnknownContext { context } => write!(f, "unknown context: {context}"),
            Self::CannotDeleteRoot { context } => {
                write!(f, "cannot delete root context {context}")
            }
            Self::TooManyContexts { limit } => {
                write!(f, "too many live contexts (limit {limit})")
            }
            Self::UnknownBlock { addr } => write!(f, "unknown block: {addr}"),
        }
    }
}

impl Error for ArenaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_lowercase_and_specific() {
        let err = ArenaError::UnknownContext {
            context: ContextId::new(4, 2),
        };
        assert_eq!(err.to_string(), "unknown context: ctx4.2");

        let err = ArenaError::CapacityExceeded {
            requested: 10,
            capacity: 8,
        };
        assert!(err.to_string().contains("requested 10 bytes"));
    }
}
