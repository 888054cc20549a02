//! The interceptor record and its dispatch handlers.
//!
//! An [`Interceptor`] is a decorator over a context's [`ContextMethods`]:
//! it keeps the table it replaced, an end-of-scope observer chain, at most
//! one free observer, and one client-data slot. Its own storage, and that
//! of every chain link, is charged to the context's parent so it stays
//! valid while the context tears itself down.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tether_arena::{ContextMethods, ContextTree};
use tether_core::{ArenaError, BlockAddr, ContextId, ScopeEnd};
use tracing::{debug, trace, warn};

/// Observer invoked when a context's scope ends.
///
/// Identity is pointer identity of the `Rc`: keep a clone of the observer
/// you registered to unregister it later.
pub type EndOfScopeObserver = Rc<dyn Fn(&mut ContextTree, ContextId, ScopeEnd)>;

/// Observer invoked before a single block of a context is freed.
pub type FreeObserver = Rc<dyn Fn(&ContextTree, ContextId, BlockAddr)>;

/// Bytes charged to the parent for the interceptor record itself.
pub(crate) const RECORD_FOOTPRINT: usize = std::mem::size_of::<Interceptor>();

/// Bytes charged to the parent for each chain link.
pub(crate) const LINK_FOOTPRINT: usize = std::mem::size_of::<ObserverLink>();

pub(crate) struct ObserverLink {
    pub(crate) observer: EndOfScopeObserver,
    /// Block in the parent context paying for this link.
    pub(crate) storage: BlockAddr,
}

/// Extension state for exactly one memory context.
///
/// Installed lazily by
/// [`ScopeHooks::ensure_capability`](crate::ScopeHooks::ensure_capability)
/// and reused by every later registration, so the dispatch depth never
/// grows.
pub struct Interceptor {
    /// The table this interceptor replaced.
    original: Rc<dyn ContextMethods>,
    /// Context whose storage pays for the record and its links.
    parent: ContextId,
    storage: BlockAddr,
    /// Observer chain. The head (most recently added) is the last element.
    chain: RefCell<SmallVec<[ObserverLink; 4]>>,
    free_observer: RefCell<Option<FreeObserver>>,
    client_data: RefCell<Option<Rc<dyn Any>>>,
}

impl Interceptor {
    pub(crate) fn new(
        original: Rc<dyn ContextMethods>,
        parent: ContextId,
        storage: BlockAddr,
    ) -> Self {
        Self {
            original,
            parent,
            storage,
            chain: RefCell::new(SmallVec::new()),
            free_observer: RefCell::new(None),
            client_data: RefCell::new(None),
        }
    }

    /// The dispatch table that was installed before this interceptor.
    pub fn original(&self) -> &Rc<dyn ContextMethods> {
        &self.original
    }

    /// The context whose storage owns this record.
    pub fn storage_context(&self) -> ContextId {
        self.parent
    }

    /// Number of registered end-of-scope observers.
    pub fn observer_count(&self) -> usize {
        self.chain.borrow().len()
    }

    /// Whether a free observer is installed.
    pub fn has_free_observer(&self) -> bool {
        self.free_observer.borrow().is_some()
    }

    pub(crate) fn push_link(&self, link: ObserverLink) {
        self.chain.borrow_mut().push(link);
    }

    /// Unlink the observer closest to the head that is `observer`.
    pub(crate) fn unlink(&self, observer: &EndOfScopeObserver) -> Option<ObserverLink> {
        let mut chain = self.chain.borrow_mut();
        let pos = chain
            .iter()
            .rposition(|link| Rc::ptr_eq(&link.observer, observer))?;
        Some(chain.remove(pos))
    }

    pub(crate) fn replace_free_observer(
        &self,
        observer: Option<FreeObserver>,
    ) -> Option<FreeObserver> {
        self.free_observer.replace(observer)
    }

    pub(crate) fn client_data(&self) -> Option<Rc<dyn Any>> {
        self.client_data.borrow().clone()
    }

    pub(crate) fn replace_client_data(&self, value: Option<Rc<dyn Any>>) -> Option<Rc<dyn Any>> {
        self.client_data.replace(value)
    }

    /// Return a block charged to the parent.
    pub(crate) fn release(&self, tree: &mut ContextTree, storage: BlockAddr) {
        if let Err(err) = tree.free(self.parent, storage) {
            warn!(parent = %self.parent, %storage, %err, "failed to release interceptor storage");
        }
    }

    /// Observers from head to tail. No borrow is held afterwards, so the
    /// observers may modify the chain while they run.
    fn observers(&self) -> SmallVec<[EndOfScopeObserver; 4]> {
        self.chain
            .borrow()
            .iter()
            .rev()
            .map(|link| Rc::clone(&link.observer))
            .collect()
    }
}

impl ContextMethods for Interceptor {
    fn alloc(
        &self,
        tree: &mut ContextTree,
        ctx: ContextId,
        size: usize,
    ) -> Result<BlockAddr, ArenaError> {
        self.original.alloc(tree, ctx, size)
    }

    fn free(
        &self,
        tree: &mut ContextTree,
        ctx: ContextId,
        addr: BlockAddr,
    ) -> Result<(), ArenaError> {
        let observer = self.free_observer.borrow().clone();
        if let Some(observer) = observer {
            observer(&*tree, ctx, addr);
        }
        self.original.free(tree, ctx, addr)
    }

    fn reset(&self, tree: &mut ContextTree, ctx: ContextId) -> Result<(), ArenaError> {
        let observers = self.observers();
        trace!(context = %ctx, observers = observers.len(), "scope reset");
        for observer in observers {
            observer(&mut *tree, ctx, ScopeEnd::Reset);
        }
        self.original.reset(tree, ctx)
    }

    fn delete(&self, tree: &mut ContextTree, ctx: ContextId) -> Result<(), ArenaError> {
        trace!(context = %ctx, observers = self.observer_count(), "scope delete");
        // Consume the chain one link at a time so that observers may unlink
        // later links while the walk is in progress.
        loop {
            let link = self.chain.borrow_mut().pop();
            let Some(link) = link else { break };
            (link.observer)(&mut *tree, ctx, ScopeEnd::Delete);
            self.release(tree, link.storage);
        }

        // Downstream delete logic must never see interceptor state.
        if let Err(err) = tree.set_methods(ctx, Rc::clone(&self.original)) {
            warn!(context = %ctx, %err, "failed to restore original methods");
        }
        self.free_observer.take();
        self.client_data.take();
        self.release(tree, self.storage);
        debug!(context = %ctx, "interceptor detached");

        self.original.delete(tree, ctx)
    }

    fn kind(&self) -> &'static str {
        "interceptor"
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("original", &self.original.kind())
            .field("parent", &self.parent)
            .field("storage", &self.storage)
            .field("observers", &self.observer_count())
            .field("free_observer", &self.has_free_observer())
            .finish()
    }
}
