//! The context tree: hierarchical, scope-based memory contexts.
//!
//! [`ContextTree`] owns every context. Contexts form a tree rooted at a
//! parentless root context. A context owns the blocks allocated from it;
//! blocks live until the context is reset or deleted. Allocating from a
//! context's parent therefore yields memory that survives the context's own
//! teardown.
//!
//! ```text
//! root (never deleted)
//! ├── call scope A
//! │   └── nested scope A.1
//! └── result context (designated, long-lived)
//! ```
//!
//! Lifecycle operations dispatch through each context's [`ContextMethods`];
//! the storage primitives they eventually reach are crate-private and only
//! [`StandardMethods`] calls them.

use std::rc::Rc;

use indexmap::IndexMap;
use tether_core::{ArenaError, BlockAddr, ContextId};
use tracing::{debug, trace, warn};

use crate::config::ArenaConfig;
use crate::methods::{ContextMethods, StandardMethods};
use crate::segment::SegmentList;

/// Where a live block sits inside its context's segments.
#[derive(Clone, Copy, Debug)]
struct BlockSpan {
    segment: u8,
    offset: u32,
    /// Requested length (the reservation is rounded up to the alignment).
    len: u32,
}

struct ContextNode {
    name: String,
    parent: Option<ContextId>,
    children: Vec<ContextId>,
    methods: Rc<dyn ContextMethods>,
    segments: SegmentList,
    blocks: IndexMap<BlockAddr, BlockSpan>,
}

struct Slot {
    generation: u32,
    node: Option<ContextNode>,
}

/// Owner of a hierarchy of memory contexts.
///
/// Single-threaded: dispatch tables are `Rc`-shared and may run arbitrary
/// callbacks, so the tree is neither `Send` nor `Sync`.
pub struct ContextTree {
    config: ArenaConfig,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    root: ContextId,
    current: ContextId,
    result_context: Option<ContextId>,
    live: usize,
}

impl ContextTree {
    /// Create a tree holding only the root context.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let root = ContextId::new(0, 0);
        let node = ContextNode {
            name: "root".into(),
            parent: None,
            children: Vec::new(),
            methods: Rc::new(StandardMethods),
            segments: SegmentList::new(config.segment_size, config.max_segments),
            blocks: IndexMap::new(),
        };
        Ok(Self {
            config,
            slots: vec![Slot {
                generation: 0,
                node: Some(node),
            }],
            free_slots: Vec::new(),
            root,
            current: root,
            result_context: None,
            live: 1,
        })
    }

    /// The root context. It has no parent and cannot be deleted.
    pub fn root(&self) -> ContextId {
        self.root
    }

    /// The tree's configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Number of live contexts, root included.
    pub fn live_contexts(&self) -> usize {
        self.live
    }

    /// Create a child of `parent` using the host's standard dispatch table.
    pub fn create(&mut self, parent: ContextId, name: &str) -> Result<ContextId, ArenaError> {
        self.create_with_methods(parent, name, Rc::new(StandardMethods))
    }

    /// Create a child of `parent` with a caller-supplied dispatch table.
    ///
    /// The table must eventually reach [`StandardMethods`] for storage to be
    /// reclaimed.
    pub fn create_with_methods(
        &mut self,
        parent: ContextId,
        name: &str,
        methods: Rc<dyn ContextMethods>,
    ) -> Result<ContextId, ArenaError> {
        self.node(parent)?;

        let node = ContextNode {
            name: name.to_owned(),
            parent: Some(parent),
            children: Vec::new(),
            methods,
            segments: SegmentList::new(self.config.segment_size, self.config.max_segments),
            blocks: IndexMap::new(),
        };

        let slot = if let Some(slot) = self.free_slots.pop() {
            slot
        } else if self.slots.len() < self.config.max_contexts as usize {
            self.slots.push(Slot {
                generation: 0,
                node: None,
            });
            (self.slots.len() - 1) as u32
        } else {
            return Err(ArenaError::TooManyContexts {
                limit: self.config.max_contexts,
            });
        };

        let entry = &mut self.slots[slot as usize];
        entry.node = Some(node);
        let id = ContextId::new(slot, entry.generation);
        self.live += 1;
        self.node_mut(parent)?.children.push(id);
        trace!(context = %id, parent = %parent, name, "context created");
        Ok(id)
    }

    /// Whether `ctx` names a live context.
    pub fn contains(&self, ctx: ContextId) -> bool {
        self.node(ctx).is_ok()
    }

    /// Parent of `ctx`, or `None` for the root.
    pub fn parent(&self, ctx: ContextId) -> Result<Option<ContextId>, ArenaError> {
        Ok(self.node(ctx)?.parent)
    }

    /// Direct children of `ctx`, oldest first.
    pub fn children(&self, ctx: ContextId) -> Result<&[ContextId], ArenaError> {
        Ok(&self.node(ctx)?.children)
    }

    /// Diagnostic name of `ctx`.
    pub fn name(&self, ctx: ContextId) -> Result<&str, ArenaError> {
        Ok(&self.node(ctx)?.name)
    }

    /// The context's current dispatch table.
    pub fn methods(&self, ctx: ContextId) -> Result<Rc<dyn ContextMethods>, ArenaError> {
        Ok(Rc::clone(&self.node(ctx)?.methods))
    }

    /// Replace the context's dispatch table, returning the previous one.
    pub fn set_methods(
        &mut self,
        ctx: ContextId,
        methods: Rc<dyn ContextMethods>,
    ) -> Result<Rc<dyn ContextMethods>, ArenaError> {
        let node = self.node_mut(ctx)?;
        Ok(std::mem::replace(&mut node.methods, methods))
    }

    /// The context that unqualified allocations go to.
    pub fn current(&self) -> ContextId {
        self.current
    }

    /// Make `ctx` current, returning the previously current context.
    pub fn switch_to(&mut self, ctx: ContextId) -> Result<ContextId, ArenaError> {
        self.node(ctx)?;
        Ok(std::mem::replace(&mut self.current, ctx))
    }

    /// Designate the long-lived context used to stage values that must
    /// survive the current call.
    pub fn designate_result_context(&mut self, ctx: ContextId) -> Result<(), ArenaError> {
        self.node(ctx)?;
        self.result_context = Some(ctx);
        Ok(())
    }

    /// The designated result context, if one is set and still alive.
    pub fn result_context(&self) -> Option<ContextId> {
        self.result_context
    }

    /// Make the designated result context current, returning the previously
    /// current context.
    pub fn switch_to_result_context(&mut self) -> Result<ContextId, ArenaError> {
        let ctx = self.result_context.ok_or(ArenaError::InvalidConfig {
            reason: "no result context designated".into(),
        })?;
        self.switch_to(ctx)
    }

    // ── Dispatching operations ──────────────────────────────────

    /// Allocate `size` bytes from `ctx`.
    pub fn alloc(&mut self, ctx: ContextId, size: usize) -> Result<BlockAddr, ArenaError> {
        let methods = self.methods(ctx)?;
        methods.alloc(self, ctx, size)
    }

    /// Allocate `size` bytes from the current context.
    pub fn alloc_current(&mut self, size: usize) -> Result<BlockAddr, ArenaError> {
        self.alloc(self.current, size)
    }

    /// Release a single block of `ctx`.
    pub fn free(&mut self, ctx: ContextId, addr: BlockAddr) -> Result<(), ArenaError> {
        let methods = self.methods(ctx)?;
        methods.free(self, ctx, addr)
    }

    /// Reset `ctx`: delete its children, then reclaim all of its blocks.
    ///
    /// Children are deleted before `ctx`'s own table runs, so nested scopes
    /// always end before their enclosing scope does.
    pub fn reset(&mut self, ctx: ContextId) -> Result<(), ArenaError> {
        self.delete_children(ctx)?;
        let methods = self.methods(ctx)?;
        methods.reset(self, ctx)
    }

    /// Delete `ctx` together with its children and their blocks.
    ///
    /// Children are deleted first, youngest first, each through its own
    /// table.
    pub fn delete(&mut self, ctx: ContextId) -> Result<(), ArenaError> {
        if ctx == self.root {
            return Err(ArenaError::CannotDeleteRoot { context: ctx });
        }
        self.delete_children(ctx)?;
        let methods = self.methods(ctx)?;
        methods.delete(self, ctx)
    }

    // ── Block access ────────────────────────────────────────────

    /// Contents of a live block.
    pub fn block(&self, addr: BlockAddr) -> Option<&[u8]> {
        let node = self.node_by_slot(addr.slot())?;
        let span = node.blocks.get(&addr)?;
        Some(node.segments.slice(span.segment, span.offset, span.len))
    }

    /// Mutable contents of a live block.
    pub fn block_mut(&mut self, addr: BlockAddr) -> Option<&mut [u8]> {
        let node = self
            .slots
            .get_mut(addr.slot() as usize)?
            .node
            .as_mut()?;
        let span = *node.blocks.get(&addr)?;
        Some(node.segments.slice_mut(span.segment, span.offset, span.len))
    }

    /// Whether `addr` names a live block.
    pub fn contains_block(&self, addr: BlockAddr) -> bool {
        self.owner_of(addr).is_some()
    }

    /// The context owning the live block at `addr`.
    pub fn owner_of(&self, addr: BlockAddr) -> Option<ContextId> {
        let entry = self.slots.get(addr.slot() as usize)?;
        let node = entry.node.as_ref()?;
        node.blocks
            .contains_key(&addr)
            .then(|| ContextId::new(addr.slot(), entry.generation))
    }

    /// Number of live blocks owned by `ctx`.
    pub fn block_count(&self, ctx: ContextId) -> Result<usize, ArenaError> {
        Ok(self.node(ctx)?.blocks.len())
    }

    /// Bytes reserved from `ctx`'s segments since its last reset.
    pub fn used_bytes(&self, ctx: ContextId) -> Result<usize, ArenaError> {
        Ok(self.node(ctx)?.segments.total_used())
    }

    // ── Storage primitives (reached only through StandardMethods) ──

    pub(crate) fn alloc_storage(
        &mut self,
        ctx: ContextId,
        size: usize,
    ) -> Result<BlockAddr, ArenaError> {
        let segment_size = self.config.segment_size;
        let len = u32::try_from(size)
            .ok()
            .filter(|&len| len <= segment_size)
            .ok_or(ArenaError::CapacityExceeded {
                requested: size,
                capacity: segment_size as usize,
            })?;
        let reserved = len.max(1).next_multiple_of(ArenaConfig::ALIGN);

        let node = self.node_mut(ctx)?;
        let (segment, offset) = node.segments.alloc(reserved)?;
        let addr = BlockAddr::new(ctx.slot(), segment, offset);
        node.blocks.insert(
            addr,
            BlockSpan {
                segment,
                offset,
                len,
            },
        );
        Ok(addr)
    }

    pub(crate) fn free_storage(
        &mut self,
        ctx: ContextId,
        addr: BlockAddr,
    ) -> Result<(), ArenaError> {
        // Bump storage is only reclaimed on reset; freeing just retires the
        // address.
        self.node_mut(ctx)?
            .blocks
            .swap_remove(&addr)
            .map(|_| ())
            .ok_or(ArenaError::UnknownBlock { addr })
    }

    pub(crate) fn reset_storage(&mut self, ctx: ContextId) -> Result<(), ArenaError> {
        // Normally a no-op; catches children created by teardown callbacks.
        self.delete_children(ctx)?;
        let node = self.node_mut(ctx)?;
        node.segments.reset();
        node.blocks.clear();
        trace!(context = %ctx, "context reset");
        Ok(())
    }

    pub(crate) fn delete_storage(&mut self, ctx: ContextId) -> Result<(), ArenaError> {
        if ctx == self.root {
            return Err(ArenaError::CannotDeleteRoot { context: ctx });
        }
        self.delete_children(ctx)?;

        let entry = &mut self.slots[ctx.slot() as usize];
        let node = entry
            .node
            .take()
            .ok_or(ArenaError::UnknownContext { context: ctx })?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free_slots.push(ctx.slot());
        self.live -= 1;

        let parent = node.parent.unwrap_or(self.root);
        if let Ok(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != ctx);
        }
        if self.current == ctx {
            self.current = parent;
        }
        if self.result_context == Some(ctx) {
            self.result_context = None;
        }
        debug!(context = %ctx, name = %node.name, "context deleted");
        Ok(())
    }

    /// Delete every child of `ctx`, youngest first, each through its own
    /// dispatch table.
    fn delete_children(&mut self, ctx: ContextId) -> Result<(), ArenaError> {
        while let Some(child) = self.node(ctx)?.children.last().copied() {
            self.delete(child)?;
            if self.contains(child) {
                // The child's table swallowed the delete. Unlink it so the
                // loop terminates; its storage is leaked to the host.
                warn!(context = %child, "delete did not reclaim child context");
                self.node_mut(ctx)?.children.retain(|&c| c != child);
            }
        }
        Ok(())
    }

    fn node(&self, ctx: ContextId) -> Result<&ContextNode, ArenaError> {
        self.slots
            .get(ctx.slot() as usize)
            .filter(|s| s.generation == ctx.generation())
            .and_then(|s| s.node.as_ref())
            .ok_or(ArenaError::UnknownContext { context: ctx })
    }

    fn node_mut(&mut self, ctx: ContextId) -> Result<&mut ContextNode, ArenaError> {
        self.slots
            .get_mut(ctx.slot() as usize)
            .filter(|s| s.generation == ctx.generation())
            .and_then(|s| s.node.as_mut())
            .ok_or(ArenaError::UnknownContext { context: ctx })
    }

    fn node_by_slot(&self, slot: u32) -> Option<&ContextNode> {
        self.slots.get(slot as usize)?.node.as_ref()
    }
}

impl Drop for ContextTree {
    /// Tear down every scope through its dispatch table so observers see the
    /// end of each scope before the storage disappears.
    fn drop(&mut self) {
        if let Err(err) = self.delete_children(self.root) {
            warn!(%err, "context tree teardown incomplete");
        }
    }
}
