//! Scope-bound weak binding caches for Tether wrapper objects.
//!
//! A wrapper is a reference-counted value standing in for one block of a
//! memory context. The [`BindingStack`] keeps one cache per active scope,
//! mapping block addresses to weak references to their wrappers, so that
//!
//! - repeated lookups of an address yield the same wrapper while it lives;
//! - when the scope ends, every wrapper bound in it has its address
//!   cleared before the block is reclaimed.
//!
//! # Architecture
//!
//! ```text
//! BindingStack
//! ├── current: CacheHandle ──► top: WeakBindingCache
//! └── parked: CacheHandle → WeakBindingCache
//!                             └── BlockAddr → Weak<dyn NativeStruct>
//!
//! ScopeBinding::attach(ctx) ── push ──► stack
//!        └── end-of-scope observer on ctx ── pop (+ push on reset)
//! ```
//!
//! [`ScopeBinding`] wires a cache to a context through
//! [`tether_intercept`]; [`ResultStaging`] redirects bindings into the
//! long-lived result scope; [`ClassRegistry`] gives wrapper types a
//! default coercion.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod class;
pub mod error;
pub mod native;
pub mod scope;
pub mod stack;
pub mod staging;

pub use cache::CacheHandle;
pub use class::{ClassRegistry, Coerce, NativeStructClass};
pub use error::{BindError, ScopeError};
pub use native::{NativeHandle, NativeStruct};
pub use scope::{ScopeBinding, ScopeFrame};
pub use stack::BindingStack;
pub use staging::ResultStaging;
