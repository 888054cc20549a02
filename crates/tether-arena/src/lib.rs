//! Hierarchical, scope-based memory contexts for Tether.
//!
//! This crate plays the host execution engine: it owns a tree of memory
//! contexts whose blocks live until the owning context is reset or
//! deleted. There is no per-block collector.
//!
//! # Architecture
//!
//! ```text
//! ContextTree
//! ├── Slot[] (generation-checked, recycled after delete)
//! │   └── ContextNode
//! │       ├── Rc<dyn ContextMethods>   (replaceable dispatch table)
//! │       ├── SegmentList → Segment[]  (bump-allocated Vec<u8>)
//! │       └── IndexMap<BlockAddr, span> (live blocks)
//! └── current / result context
//! ```
//!
//! Every lifecycle operation ({alloc, free, reset, delete}) goes through the
//! context's [`ContextMethods`]. Layers that need to observe scope teardown
//! install a decorator table and delegate to the one they replaced; the
//! arena itself is never modified.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod methods;
pub mod segment;
pub mod tree;

pub use config::ArenaConfig;
pub use methods::{ContextMethods, StandardMethods};
pub use tree::ContextTree;

pub use tether_core::{ArenaError, BlockAddr, ContextId, ScopeEnd};
