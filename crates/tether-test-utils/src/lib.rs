//! Test utilities and fixture types for Tether development.
//!
//! Provides tracing setup for tests, small context trees, an [`EventLog`]
//! that hands out recording observers, and fixture wrapper types
//! ([`TupleRef`], [`DescRef`]) in [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use tether_arena::{ArenaConfig, ContextTree};
use tether_bind::BindingStack;
use tether_core::{BlockAddr, ContextId, ScopeEnd};
use tether_intercept::{EndOfScopeObserver, FreeObserver};
use tracing_subscriber::EnvFilter;

pub use fixtures::{DescRef, TupleRef};

static INIT: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn` for the tether crates.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tether_arena=warn,tether_intercept=warn,tether_bind=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Config with 1 KiB segments, so capacity limits are easy to reach.
pub fn small_config() -> ArenaConfig {
    ArenaConfig {
        segment_size: 1024,
        max_segments: 8,
        max_contexts: 64,
    }
}

/// A tree built from [`small_config`].
pub fn small_tree() -> ContextTree {
    init_tracing();
    ContextTree::new(small_config()).unwrap()
}

/// A binding stack shared the way scope glue shares it.
pub fn shared_stack() -> Rc<RefCell<BindingStack>> {
    Rc::new(RefCell::new(BindingStack::new()))
}

/// One observed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// An end-of-scope observer fired.
    ScopeEnded {
        label: &'static str,
        context: ContextId,
        end: ScopeEnd,
    },
    /// A free observer fired.
    Freed {
        label: &'static str,
        context: ContextId,
        addr: BlockAddr,
    },
}

/// Shared, ordered record of observer invocations.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An end-of-scope observer that records under `label`.
    pub fn scope_observer(&self, label: &'static str) -> EndOfScopeObserver {
        let events = Rc::clone(&self.events);
        Rc::new(move |_: &mut ContextTree, context: ContextId, end: ScopeEnd| {
            events.borrow_mut().push(Event::ScopeEnded {
                label,
                context,
                end,
            });
        })
    }

    /// A free observer that records under `label`.
    pub fn free_observer(&self, label: &'static str) -> FreeObserver {
        let events = Rc::clone(&self.events);
        Rc::new(move |_: &ContextTree, context: ContextId, addr: BlockAddr| {
            events.borrow_mut().push(Event::Freed {
                label,
                context,
                addr,
            });
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Labels of scope-end events, in firing order.
    pub fn scope_labels(&self) -> Vec<&'static str> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::ScopeEnded { label, .. } => Some(*label),
                Event::Freed { .. } => None,
            })
            .collect()
    }

    /// Number of events recorded under `label`.
    pub fn count(&self, label: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| match event {
                Event::ScopeEnded { label: l, .. } | Event::Freed { label: l, .. } => *l == label,
            })
            .count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
