//! Binding and scope-glue error types.

use std::error::Error;
use std::fmt;

use tether_core::ContextId;
use tether_intercept::InterceptError;

use crate::cache::CacheHandle;

/// Errors from the weak binding cache stack and wrapper access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindError {
    /// The wrapper's native block has been reclaimed (its scope ended, or
    /// it was released). The old address is never dereferenced.
    StaleNativeReference,
    /// The handle does not name a live cache.
    UnknownCache {
        /// The unrecognised handle.
        handle: CacheHandle,
    },
    /// A pop named a cache other than the one that was current when the
    /// top cache was pushed. Nothing was changed.
    StackMismatch {
        /// Handle recorded when the top cache was pushed; `None` for the
        /// root cache, which can never be popped.
        expected: Option<CacheHandle>,
        /// Handle the caller passed.
        found: CacheHandle,
    },
    /// A wrapper class with this name is already registered.
    DuplicateClass {
        /// The contested class name.
        name: String,
    },
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleNativeReference => {
                write!(f, "native reference is stale: its scope has ended")
            }
            Self::UnknownCache { handle } => write!(f, "unknown binding cache: {handle}"),
            Self::StackMismatch {
                expected: Some(expected),
                found,
            } => write!(f, "cache stack mismatch: expected {expected}, found {found}"),
            Self::StackMismatch {
                expected: None,
                found,
            } => write!(f, "cache stack mismatch: root cache cannot be popped (found {found})"),
            Self::DuplicateClass { name } => {
                write!(f, "wrapper class '{name}' is already registered")
            }
        }
    }
}

impl Error for BindError {}

/// Errors from attaching binding caches to memory-context scopes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeError {
    /// Installing or using the interceptor failed.
    Intercept(InterceptError),
    /// The cache stack rejected the operation.
    Bind(BindError),
    /// The context already carries a scope binding.
    AlreadyAttached {
        /// The context.
        context: ContextId,
    },
    /// The context carries no scope binding.
    NotAttached {
        /// The context.
        context: ContextId,
    },
    /// No result context has been designated on the tree.
    NoResultContext,
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intercept(err) => write!(f, "interceptor error: {err}"),
            Self::Bind(err) => write!(f, "binding error: {err}"),
            Self::AlreadyAttached { context } => {
                write!(f, "context {context} already has a binding cache attached")
            }
            Self::NotAttached { context } => {
                write!(f, "context {context} has no binding cache attached")
            }
            Self::NoResultContext => write!(f, "no result context designated"),
        }
    }
}

impl Error for ScopeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Intercept(err) => Some(err),
            Self::Bind(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InterceptError> for ScopeError {
    fn from(err: InterceptError) -> Self {
        Self::Intercept(err)
    }
}

impl From<BindError> for ScopeError {
    fn from(err: BindError) -> Self {
        Self::Bind(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_mismatch_message_names_root() {
        let err = BindError::StackMismatch {
            expected: None,
            found: CacheHandle::ROOT,
        };
        assert!(err.to_string().contains("root cache cannot be popped"));
    }

    #[test]
    fn scope_error_exposes_source() {
        let err = ScopeError::from(BindError::StaleNativeReference);
        assert!(err.source().is_some());
        assert!(ScopeError::NoResultContext.source().is_none());
    }
}
