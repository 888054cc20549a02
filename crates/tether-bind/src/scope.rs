//! Tying binding caches to memory-context scopes.
//!
//! [`ScopeBinding::attach`] pushes a fresh cache for a context and
//! registers an end-of-scope observer on it. When the context is reset the
//! observer pops the cache and pushes a fresh one, because the context will
//! be reused; when it is deleted the observer pops. Sibling contexts may
//! end in any order, so a scope whose cache is no longer current discards
//! it in place instead. Either way, every wrapper bound while the scope was
//! current loses its address before the context's blocks are reclaimed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether_arena::ContextTree;
use tether_core::{ContextId, ScopeEnd};
use tether_intercept::{EndOfScopeObserver, ScopeHooks};
use tracing::{debug, error, warn};

use crate::cache::CacheHandle;
use crate::error::{BindError, ScopeError};
use crate::stack::BindingStack;

/// Per-context state kept in the interceptor's client-data slot.
#[derive(Debug)]
pub struct ScopeFrame {
    previous: Cell<CacheHandle>,
    cache: Cell<CacheHandle>,
}

impl ScopeFrame {
    /// The cache that was current when this scope's cache was pushed.
    pub fn previous(&self) -> CacheHandle {
        self.previous.get()
    }

    /// The scope's own cache. Changes after every reset.
    pub fn cache(&self) -> CacheHandle {
        self.cache.get()
    }
}

/// A binding cache attached to one memory context.
pub struct ScopeBinding {
    context: ContextId,
    frame: Rc<ScopeFrame>,
    observer: EndOfScopeObserver,
}

impl ScopeBinding {
    /// Push a cache for `ctx` and arrange for it to be popped when the
    /// context's scope ends.
    ///
    /// Fails without touching the stack when `ctx` is the root context or
    /// already has a binding attached. The stack must not be borrowed when
    /// the context is later reset or deleted; the observer panics if it is.
    pub fn attach(
        tree: &mut ContextTree,
        ctx: ContextId,
        stack: &Rc<RefCell<BindingStack>>,
    ) -> Result<Self, ScopeError> {
        if tree.client_data_as::<ScopeFrame>(ctx).is_some() {
            return Err(ScopeError::AlreadyAttached { context: ctx });
        }
        tree.ensure_capability(ctx)?;

        let (previous, cache) = {
            let mut stack = stack.borrow_mut();
            let previous = stack.push();
            (previous, stack.current())
        };
        let frame = Rc::new(ScopeFrame {
            previous: Cell::new(previous),
            cache: Cell::new(cache),
        });
        tree.set_client_data(ctx, Some(Rc::clone(&frame) as _))?;

        let observer = scope_end_observer(Rc::clone(stack));
        tree.add_end_of_scope_observer(ctx, Rc::clone(&observer))?;
        debug!(context = %ctx, %cache, %previous, "binding cache attached");

        Ok(Self {
            context: ctx,
            frame,
            observer,
        })
    }

    /// The context this binding is attached to.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// The per-context frame.
    pub fn frame(&self) -> &ScopeFrame {
        &self.frame
    }

    /// End the binding before the scope does: pop its cache and unregister
    /// the observer.
    ///
    /// If the pop is rejected (another cache was pushed on top and not yet
    /// popped) the binding is handed back unchanged.
    pub fn detach(
        self,
        tree: &mut ContextTree,
        stack: &mut BindingStack,
    ) -> Result<(), (Self, ScopeError)> {
        let cache = self.frame.cache();
        if stack.current() != cache {
            let err = BindError::StackMismatch {
                expected: stack.below_current(),
                found: self.frame.previous(),
            };
            return Err((self, err.into()));
        }
        if let Err(err) = stack.discard(cache) {
            return Err((self, err.into()));
        }
        tree.remove_end_of_scope_observer(self.context, &self.observer);
        if let Err(err) = tree.set_client_data(self.context, None) {
            warn!(context = %self.context, %err, "failed to clear scope frame");
        }
        debug!(context = %self.context, "binding cache detached");
        Ok(())
    }
}

impl std::fmt::Debug for ScopeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeBinding")
            .field("context", &self.context)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

/// The observer that ends a scope's cache.
///
/// The scope's own cache is discarded wherever it sits on the stack, so a
/// context deleted out of attach order still invalidates its wrappers.
///
/// # Panics
///
/// Panics if the binding stack is borrowed while the scope ends. Carrying
/// on would reclaim the scope's blocks under wrappers that still hold
/// their addresses.
fn scope_end_observer(stack: Rc<RefCell<BindingStack>>) -> EndOfScopeObserver {
    Rc::new(move |tree: &mut ContextTree, ctx: ContextId, end: ScopeEnd| {
        let Some(frame) = tree.client_data_as::<ScopeFrame>(ctx) else {
            warn!(context = %ctx, %end, "scope ended without a frame");
            return;
        };
        let Ok(mut stack) = stack.try_borrow_mut() else {
            error!(
                context = %ctx, %end, cache = %frame.cache(),
                "binding stack busy at scope end"
            );
            panic!("binding stack is borrowed while the scope of {ctx} ends");
        };
        let ended = frame.cache();
        if stack.current() != ended {
            debug!(
                context = %ctx, %end, cache = %ended, current = %stack.current(),
                "scope ended out of order"
            );
        }
        if let Err(err) = stack.discard(ended) {
            warn!(context = %ctx, %end, %err, "scope cache already gone");
        }
        if !end.is_delete() {
            frame.previous.set(stack.push());
            frame.cache.set(stack.current());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeHandle, NativeStruct};
    use tether_arena::ArenaConfig;
    use tether_core::BlockAddr;

    #[derive(Default)]
    struct Row {
        native: NativeHandle,
    }

    impl NativeStruct for Row {
        fn native(&self) -> &NativeHandle {
            &self.native
        }
    }

    fn setup() -> (ContextTree, Rc<RefCell<BindingStack>>) {
        (
            ContextTree::new(ArenaConfig::new()).unwrap(),
            Rc::new(RefCell::new(BindingStack::new())),
        )
    }

    #[test]
    fn delete_pops_scope_cache() {
        let (mut tree, stack) = setup();
        let ctx = tree.create(tree.root(), "call").unwrap();
        let binding = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
        assert_eq!(stack.borrow().current(), binding.frame().cache());

        let block = tree.alloc(ctx, 16).unwrap();
        let w = Rc::new(Row::default());
        stack.borrow_mut().bind(block, &w);

        tree.delete(ctx).unwrap();
        assert!(!w.has_valid_address());
        assert_eq!(stack.borrow().current(), CacheHandle::ROOT);
    }

    #[test]
    fn reset_pops_and_pushes_fresh_cache() {
        let (mut tree, stack) = setup();
        let ctx = tree.create(tree.root(), "call").unwrap();
        let binding = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
        let first = binding.frame().cache();

        let w = Rc::new(Row::default());
        stack.borrow_mut().bind(BlockAddr::from_raw(0x40), &w);
        tree.reset(ctx).unwrap();

        assert!(!w.has_valid_address());
        let second = binding.frame().cache();
        assert_ne!(first, second);
        assert_eq!(stack.borrow().current(), second);
        assert_eq!(stack.borrow().depth(), 2);
    }

    #[test]
    fn root_context_is_rejected_before_push() {
        let (mut tree, stack) = setup();
        let root = tree.root();
        let err = ScopeBinding::attach(&mut tree, root, &stack).unwrap_err();
        assert!(matches!(err, ScopeError::Intercept(_)));
        assert_eq!(stack.borrow().depth(), 1);
    }

    #[test]
    fn second_attach_is_rejected() {
        let (mut tree, stack) = setup();
        let ctx = tree.create(tree.root(), "call").unwrap();
        let _binding = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
        let err = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap_err();
        assert_eq!(err, ScopeError::AlreadyAttached { context: ctx });
        assert_eq!(stack.borrow().depth(), 2);
    }

    #[test]
    fn detach_pops_early_and_unregisters() {
        let (mut tree, stack) = setup();
        let ctx = tree.create(tree.root(), "call").unwrap();
        let binding = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
        let w = Rc::new(Row::default());
        stack.borrow_mut().bind(BlockAddr::from_raw(0x40), &w);

        binding
            .detach(&mut tree, &mut stack.borrow_mut())
            .map_err(|(_, err)| err)
            .unwrap();
        assert!(!w.has_valid_address());
        assert_eq!(tree.interceptor(ctx).unwrap().observer_count(), 0);

        // Deleting later must not pop anything else.
        let outer = stack.borrow_mut().push();
        tree.delete(ctx).unwrap();
        assert_eq!(stack.borrow().depth(), 2);
        stack.borrow_mut().pop(outer).unwrap();
    }

    #[test]
    fn detach_out_of_order_returns_binding() {
        let (mut tree, stack) = setup();
        let ctx = tree.create(tree.root(), "call").unwrap();
        let binding = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
        let _inner = stack.borrow_mut().push();

        let (binding, err) = binding
            .detach(&mut tree, &mut stack.borrow_mut())
            .unwrap_err();
        assert!(matches!(err, ScopeError::Bind(_)));
        assert_eq!(binding.context(), ctx);
    }
}
