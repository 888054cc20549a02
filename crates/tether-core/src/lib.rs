//! Core types for the Tether workspace.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! identifiers shared by the host arena, the interceptor, and the binding
//! cache stack: context ids, block addresses, scope-end events, and the
//! arena error type.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod scope;

pub use error::ArenaError;
pub use id::{BlockAddr, ContextId};
pub use scope::ScopeEnd;
