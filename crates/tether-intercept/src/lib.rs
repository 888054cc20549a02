//! Composable scope-teardown observation for Tether memory contexts.
//!
//! A memory context exposes a single replaceable dispatch table. This crate
//! lets arbitrarily many independent features observe "scope ended"
//! (reset or delete) and "block freed" events on one context, without any
//! of them owning that table and without touching the arena's code.
//!
//! # Architecture
//!
//! ```text
//! ContextNode.methods ──► Interceptor ──► original table (delegated)
//!                          ├── observer chain (LIFO, storage in parent)
//!                          ├── free observer (0..1)
//!                          └── client data (0..1)
//! ```
//!
//! The first registration installs an [`Interceptor`] in place of the
//! context's table; later registrations find and reuse it. On delete, the
//! observers run, the original table is restored, and the original delete
//! runs, so the host never sees interceptor state.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod hooks;
pub mod interceptor;

pub use error::InterceptError;
pub use hooks::ScopeHooks;
pub use interceptor::{EndOfScopeObserver, FreeObserver, Interceptor};
