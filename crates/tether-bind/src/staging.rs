//! Redirecting bindings into the designated result scope.
//!
//! Values handed back to the host outlive the call that produced them, so
//! their wrappers must be registered in the cache of the long-lived result
//! context rather than the call's own. [`ResultStaging::stage`] switches
//! the top of the stack to that cache for the duration of a closure.

use std::ops::{Deref, DerefMut};

use tether_arena::ContextTree;
use tether_core::ContextId;
use tether_intercept::ScopeHooks;
use tracing::warn;

use crate::cache::CacheHandle;
use crate::error::ScopeError;
use crate::scope::ScopeFrame;
use crate::stack::BindingStack;

/// Handle on the result context's binding cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResultStaging {
    context: ContextId,
}

impl ResultStaging {
    /// Stage into the tree's designated result context, which must have a
    /// [`ScopeBinding`](crate::ScopeBinding) attached.
    pub fn new(tree: &ContextTree) -> Result<Self, ScopeError> {
        let context = tree.result_context().ok_or(ScopeError::NoResultContext)?;
        Self::for_context(tree, context)
    }

    /// Stage into an arbitrary scope-bound context.
    pub fn for_context(tree: &ContextTree, context: ContextId) -> Result<Self, ScopeError> {
        if tree.client_data_as::<ScopeFrame>(context).is_none() {
            return Err(ScopeError::NotAttached { context });
        }
        Ok(Self { context })
    }

    /// The context whose cache receives staged bindings.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Run `f` with the result scope's cache on top of `stack`.
    ///
    /// The previous top is restored when `f` returns, whether it returns a
    /// value, an error, or unwinds.
    pub fn stage<R>(
        &self,
        tree: &ContextTree,
        stack: &mut BindingStack,
        f: impl FnOnce(&mut BindingStack) -> R,
    ) -> Result<R, ScopeError> {
        let frame = tree
            .client_data_as::<ScopeFrame>(self.context)
            .ok_or(ScopeError::NotAttached {
                context: self.context,
            })?;
        let restore = stack.switch_top(frame.cache())?;
        let mut guard = StagingGuard { stack, restore };
        Ok(f(&mut *guard))
    }
}

/// Switches the stack back to the call's cache on drop.
struct StagingGuard<'a> {
    stack: &'a mut BindingStack,
    restore: CacheHandle,
}

impl Deref for StagingGuard<'_> {
    type Target = BindingStack;

    fn deref(&self) -> &BindingStack {
        self.stack
    }
}

impl DerefMut for StagingGuard<'_> {
    fn deref_mut(&mut self) -> &mut BindingStack {
        self.stack
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.stack.switch_top(self.restore) {
            warn!(restore = %self.restore, %err, "staged cache could not be switched back");
        }
    }
}
