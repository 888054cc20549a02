//! A single weak binding cache and the handle callers hold for it.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tether_core::BlockAddr;
use tracing::trace;

use crate::native::NativeStruct;

/// Opaque handle naming one cache of a [`BindingStack`](crate::BindingStack).
///
/// Handles are never reused, so a handle kept past its cache's pop is
/// reported as unknown rather than silently naming a newer cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheHandle(pub(crate) u64);

impl CacheHandle {
    /// The cache every stack starts with.
    pub const ROOT: Self = Self(0);

    /// The raw counter value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache#{}", self.0)
    }
}

/// Map from native block address to a weak reference to its wrapper.
pub(crate) struct WeakBindingCache {
    /// The cache that was current when this one was pushed.
    pushed_over: Option<CacheHandle>,
    entries: IndexMap<BlockAddr, Weak<dyn NativeStruct>>,
}

impl WeakBindingCache {
    pub(crate) fn new(pushed_over: Option<CacheHandle>, capacity: usize) -> Self {
        Self {
            pushed_over,
            entries: IndexMap::with_capacity(capacity),
        }
    }

    pub(crate) fn pushed_over(&self) -> Option<CacheHandle> {
        self.pushed_over
    }

    pub(crate) fn set_pushed_over(&mut self, pushed_over: Option<CacheHandle>) {
        self.pushed_over = pushed_over;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries whose wrapper is still alive.
    pub(crate) fn live_len(&self) -> usize {
        self.entries.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Upgrade the entry for `addr`, pruning it if the wrapper is gone.
    pub(crate) fn lookup(&mut self, addr: BlockAddr) -> Option<Rc<dyn NativeStruct>> {
        let weak = self.entries.get(&addr)?;
        match weak.upgrade() {
            Some(wrapper) => Some(wrapper),
            None => {
                self.entries.swap_remove(&addr);
                trace!(%addr, "pruned lapsed binding");
                None
            }
        }
    }

    /// Store `weak` under `addr`, returning the entry it displaced.
    pub(crate) fn insert(
        &mut self,
        addr: BlockAddr,
        weak: Weak<dyn NativeStruct>,
    ) -> Option<Weak<dyn NativeStruct>> {
        self.entries.insert(addr, weak)
    }

    /// Remove the entry for `addr` only if it refers to `wrapper`.
    pub(crate) fn remove_if_bound<T: NativeStruct + ?Sized>(
        &mut self,
        addr: BlockAddr,
        wrapper: &T,
    ) -> bool {
        let bound = self
            .entries
            .get(&addr)
            .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), wrapper as *const T));
        if bound {
            self.entries.swap_remove(&addr);
        }
        bound
    }

    /// Every wrapper that is still alive.
    pub(crate) fn live(&self) -> impl Iterator<Item = Rc<dyn NativeStruct>> + '_ {
        self.entries.values().filter_map(|weak| weak.upgrade())
    }
}
