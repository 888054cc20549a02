//! Registration API over a [`ContextTree`].
//!
//! [`ScopeHooks`] is implemented for [`ContextTree`] so that any number of
//! independent features can observe scope teardown on the same context
//! without owning its dispatch table:
//!
//! ```ignore
//! let observer: EndOfScopeObserver = Rc::new(|tree, ctx, end| { /* ... */ });
//! tree.add_end_of_scope_observer(ctx, Rc::clone(&observer))?;
//! // later, if the feature shuts down before the scope does:
//! tree.remove_end_of_scope_observer(ctx, &observer);
//! ```

use std::any::Any;
use std::rc::Rc;

use tether_arena::ContextTree;
use tether_core::ContextId;
use tracing::debug;

use crate::error::InterceptError;
use crate::interceptor::{
    EndOfScopeObserver, FreeObserver, Interceptor, ObserverLink, LINK_FOOTPRINT,
    RECORD_FOOTPRINT,
};

/// Scope-teardown and block-free observation on memory contexts.
pub trait ScopeHooks {
    /// Install the interceptor on `ctx` unless it is already installed, and
    /// return it.
    ///
    /// Idempotent: repeated calls return the same record. Fails with
    /// [`InterceptError::RootContext`] when `ctx` has no parent to own the
    /// record's storage.
    fn ensure_capability(&mut self, ctx: ContextId) -> Result<Rc<Interceptor>, InterceptError>;

    /// Whether `ctx`'s dispatch table is currently the interceptor.
    fn has_capability(&self, ctx: ContextId) -> bool;

    /// The installed interceptor, without installing one.
    fn interceptor(&self, ctx: ContextId) -> Option<Rc<Interceptor>>;

    /// Register `observer` for the end of `ctx`'s scope. The most recently
    /// added observer runs first.
    fn add_end_of_scope_observer(
        &mut self,
        ctx: ContextId,
        observer: EndOfScopeObserver,
    ) -> Result<(), InterceptError>;

    /// Unregister the most recently added registration of `observer`.
    ///
    /// Returns whether a registration was removed. Unknown observers,
    /// already-consumed chains and contexts without the capability are
    /// silently ignored.
    fn remove_end_of_scope_observer(&mut self, ctx: ContextId, observer: &EndOfScopeObserver)
        -> bool;

    /// Install (`Some`) or uninstall (`None`) the single free observer,
    /// returning the previous one.
    ///
    /// Uninstalling never installs the capability.
    fn set_free_observer(
        &mut self,
        ctx: ContextId,
        observer: Option<FreeObserver>,
    ) -> Result<Option<FreeObserver>, InterceptError>;

    /// The opaque client-data value of `ctx`, or `None` when no interceptor
    /// is installed.
    fn client_data(&self, ctx: ContextId) -> Option<Rc<dyn Any>>;

    /// Store an opaque client-data value on `ctx`, returning the previous one.
    fn set_client_data(
        &mut self,
        ctx: ContextId,
        value: Option<Rc<dyn Any>>,
    ) -> Result<Option<Rc<dyn Any>>, InterceptError>;

    /// [`client_data`](Self::client_data) downcast to a concrete type.
    fn client_data_as<T: Any>(&self, ctx: ContextId) -> Option<Rc<T>>
    where
        Self: Sized,
    {
        self.client_data(ctx)?.downcast::<T>().ok()
    }
}

impl ScopeHooks for ContextTree {
    fn ensure_capability(&mut self, ctx: ContextId) -> Result<Rc<Interceptor>, InterceptError> {
        if let Some(existing) = self.interceptor(ctx) {
            return Ok(existing);
        }

        let parent = self
            .parent(ctx)?
            .ok_or(InterceptError::RootContext { context: ctx })?;
        let storage = self.alloc(parent, RECORD_FOOTPRINT)?;
        let original = self.methods(ctx)?;
        let record = Rc::new(Interceptor::new(original, parent, storage));
        self.set_methods(ctx, Rc::clone(&record) as _)?;
        debug!(context = %ctx, parent = %parent, "interceptor installed");
        Ok(record)
    }

    fn has_capability(&self, ctx: ContextId) -> bool {
        self.interceptor(ctx).is_some()
    }

    fn interceptor(&self, ctx: ContextId) -> Option<Rc<Interceptor>> {
        let methods: Rc<dyn Any> = self.methods(ctx).ok()?;
        methods.downcast::<Interceptor>().ok()
    }

    fn add_end_of_scope_observer(
        &mut self,
        ctx: ContextId,
        observer: EndOfScopeObserver,
    ) -> Result<(), InterceptError> {
        let record = self.ensure_capability(ctx)?;
        let storage = self.alloc(record.storage_context(), LINK_FOOTPRINT)?;
        record.push_link(ObserverLink { observer, storage });
        Ok(())
    }

    fn remove_end_of_scope_observer(
        &mut self,
        ctx: ContextId,
        observer: &EndOfScopeObserver,
    ) -> bool {
        let Some(record) = self.interceptor(ctx) else {
            return false;
        };
        match record.unlink(observer) {
            Some(link) => {
                record.release(self, link.storage);
                true
            }
            None => false,
        }
    }

    fn set_free_observer(
        &mut self,
        ctx: ContextId,
        observer: Option<FreeObserver>,
    ) -> Result<Option<FreeObserver>, InterceptError> {
        match observer {
            Some(observer) => {
                let record = self.ensure_capability(ctx)?;
                Ok(record.replace_free_observer(Some(observer)))
            }
            None => Ok(self
                .interceptor(ctx)
                .and_then(|record| record.replace_free_observer(None))),
        }
    }

    fn client_data(&self, ctx: ContextId) -> Option<Rc<dyn Any>> {
        self.interceptor(ctx)?.client_data()
    }

    fn set_client_data(
        &mut self,
        ctx: ContextId,
        value: Option<Rc<dyn Any>>,
    ) -> Result<Option<Rc<dyn Any>>, InterceptError> {
        let record = self.ensure_capability(ctx)?;
        Ok(record.replace_client_data(value))
    }
}
