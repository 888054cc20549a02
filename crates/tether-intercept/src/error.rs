//! Interceptor error types.

use std::error::Error;
use std::fmt;

use tether_core::{ArenaError, ContextId};

/// Errors from installing or using the interceptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterceptError {
    /// The context has no parent, so there is no scope that outlives it to
    /// own the interceptor's storage. This is an integration defect; there
    /// is no recovery path.
    RootContext {
        /// The parentless context.
        context: ContextId,
    },
    /// The host arena rejected an operation.
    Arena(ArenaError),
}

impl fmt::Display for InterceptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootContext { context } => {
                write!(f, "root context {context} cannot be callback enhanced")
            }
            Self::Arena(err) => write!(f, "arena error: {err}"),
        }
    }
}

impl Error for InterceptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Arena(err) => Some(err),
            Self::RootContext { .. } => None,
        }
    }
}

impl From<ArenaError> for InterceptError {
    fn from(err: ArenaError) -> Self {
        Self::Arena(err)
    }
}
