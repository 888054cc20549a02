//! Tether: scope-bound weak bindings from managed wrappers to arena memory.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tether sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tether::prelude::*;
//!
//! struct Row {
//!     native: NativeHandle,
//! }
//!
//! impl NativeStruct for Row {
//!     fn native(&self) -> &NativeHandle {
//!         &self.native
//!     }
//! }
//!
//! let mut tree = ContextTree::new(ArenaConfig::new()).unwrap();
//! let stack = Rc::new(RefCell::new(BindingStack::new()));
//!
//! // Enter a call scope: its cache is popped when the context goes away.
//! let call = tree.create(tree.root(), "call").unwrap();
//! let _scope = ScopeBinding::attach(&mut tree, call, &stack).unwrap();
//!
//! let block = tree.alloc(call, 64).unwrap();
//! let row = Rc::new(Row { native: NativeHandle::new() });
//! Row::init(&row, &mut stack.borrow_mut(), block);
//! assert!(stack.borrow_mut().obtain::<Row>(block).is_some());
//!
//! tree.delete(call).unwrap();
//! assert_eq!(row.require_address(), Err(BindError::StaleNativeReference));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | Context ids, block addresses, `ArenaError` |
//! | [`arena`] | `tether-arena` | Context tree and replaceable dispatch tables |
//! | [`intercept`] | `tether-intercept` | End-of-scope and free observers |
//! | [`bind`] | `tether-bind` | Weak binding cache stack and wrapper protocol |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers and the shared arena error (`tether-core`).
pub use tether_core as types;

/// Hierarchical memory contexts (`tether-arena`).
///
/// [`arena::ContextTree`] owns the contexts; every lifecycle operation goes
/// through the context's [`arena::ContextMethods`].
pub use tether_arena as arena;

/// Scope-teardown observation (`tether-intercept`).
///
/// [`intercept::ScopeHooks`] lets any number of features observe one
/// context without owning its dispatch table.
pub use tether_intercept as intercept;

/// Weak binding caches (`tether-bind`).
///
/// [`bind::BindingStack`] maps block addresses to wrappers per scope;
/// [`bind::ScopeBinding`] ties a cache to a context.
pub use tether_bind as bind;

/// Common imports for typical Tether usage.
pub mod prelude {
    // Core types
    pub use tether_core::{ArenaError, BlockAddr, ContextId, ScopeEnd};

    // Arena
    pub use tether_arena::{ArenaConfig, ContextMethods, ContextTree};

    // Interceptor
    pub use tether_intercept::{EndOfScopeObserver, FreeObserver, InterceptError, ScopeHooks};

    // Bindings
    pub use tether_bind::{
        BindError, BindingStack, CacheHandle, ClassRegistry, NativeHandle, NativeStruct,
        ResultStaging, ScopeBinding, ScopeError,
    };
}
