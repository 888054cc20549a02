//! The replaceable per-context dispatch table.
//!
//! Every lifecycle operation on a [`ContextTree`] is routed through the
//! context's current [`ContextMethods`] object. The host installs
//! [`StandardMethods`] at creation; other layers may replace the table with
//! a decorator that holds on to the original and delegates to it.

use std::any::Any;

use tether_core::{ArenaError, BlockAddr, ContextId};

use crate::tree::ContextTree;

/// Dispatch table of a memory context.
///
/// Implementations receive the whole tree so that decorators can delegate
/// to a wrapped table and so that teardown can recurse into children.
/// Callers never hold a borrow of the table while it runs: the tree clones
/// the `Rc` out of the context before dispatching, so an implementation may
/// replace the context's table from inside its own call.
///
/// The `Any` supertrait lets layers recognise their own decorators with
/// `Rc::downcast`.
pub trait ContextMethods: Any {
    /// Allocate `size` bytes owned by `ctx`.
    fn alloc(
        &self,
        tree: &mut ContextTree,
        ctx: ContextId,
        size: usize,
    ) -> Result<BlockAddr, ArenaError>;

    /// Release one block owned by `ctx`.
    fn free(&self, tree: &mut ContextTree, ctx: ContextId, addr: BlockAddr)
        -> Result<(), ArenaError>;

    /// Reclaim every block of `ctx`. The context itself stays usable.
    ///
    /// The tree has already deleted `ctx`'s children when this runs.
    fn reset(&self, tree: &mut ContextTree, ctx: ContextId) -> Result<(), ArenaError>;

    /// Delete `ctx` and every block it owns.
    ///
    /// The tree has already deleted `ctx`'s children when this runs.
    fn delete(&self, tree: &mut ContextTree, ctx: ContextId) -> Result<(), ArenaError>;

    /// Short name used in diagnostics.
    fn kind(&self) -> &'static str;
}

/// The host's own implementation: bump allocation over the context's
/// segment list.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardMethods;

impl ContextMethods for StandardMethods {
    fn alloc(
        &self,
        tree: &mut ContextTree,
        ctx: ContextId,
        size: usize,
    ) -> Result<BlockAddr, ArenaError> {
        tree.alloc_storage(ctx, size)
    }

    fn free(
        &self,
        tree: &mut ContextTree,
        ctx: ContextId,
        addr: BlockAddr,
    ) -> Result<(), ArenaError> {
        tree.free_storage(ctx, addr)
    }

    fn reset(&self, tree: &mut ContextTree, ctx: ContextId) -> Result<(), ArenaError> {
        tree.reset_storage(ctx)
    }

    fn delete(&self, tree: &mut ContextTree, ctx: ContextId) -> Result<(), ArenaError> {
        tree.delete_storage(ctx)
    }

    fn kind(&self) -> &'static str {
        "standard"
    }
}
