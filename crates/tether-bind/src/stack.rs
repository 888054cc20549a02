//! The stack of weak binding caches.
//!
//! Exactly one cache is current. Callers entering a scope push a fresh
//! cache and keep the returned handle; when the scope ends they pop back to
//! it, which clears the address of every wrapper still registered in the
//! popped cache. Caches that are not current are parked here and named by
//! their [`CacheHandle`].

use std::any::Any;
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tether_core::BlockAddr;
use tracing::{debug, trace, warn};

use crate::cache::{CacheHandle, WeakBindingCache};
use crate::error::BindError;
use crate::native::NativeStruct;

/// Owner of every live binding cache.
pub struct BindingStack {
    current: CacheHandle,
    top: WeakBindingCache,
    parked: IndexMap<CacheHandle, WeakBindingCache>,
    next_handle: u64,
    capacity: usize,
}

impl BindingStack {
    /// A stack holding only the root cache.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A stack whose caches are presized for `capacity` bindings each.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            current: CacheHandle::ROOT,
            top: WeakBindingCache::new(None, capacity),
            parked: IndexMap::new(),
            next_handle: CacheHandle::ROOT.0 + 1,
            capacity,
        }
    }

    /// Handle of the current cache.
    pub fn current(&self) -> CacheHandle {
        self.current
    }

    /// The cache the current one was pushed over; `None` for the root.
    pub(crate) fn below_current(&self) -> Option<CacheHandle> {
        self.top.pushed_over()
    }

    /// Number of live caches, the current one included.
    pub fn depth(&self) -> usize {
        self.parked.len() + 1
    }

    /// Whether `handle` names a live cache.
    pub fn is_live(&self, handle: CacheHandle) -> bool {
        handle == self.current || self.parked.contains_key(&handle)
    }

    /// Number of entries in the cache named by `handle`, lapsed ones
    /// included.
    pub fn cache_len(&self, handle: CacheHandle) -> Option<usize> {
        self.cache(handle).map(WeakBindingCache::len)
    }

    /// Entries of the current cache whose wrapper is still alive.
    pub fn live_entries(&self) -> usize {
        self.top.live_len()
    }

    /// Make a new empty cache current and return the previous current.
    pub fn push(&mut self) -> CacheHandle {
        let handle = CacheHandle(self.next_handle);
        self.next_handle += 1;

        let fresh = WeakBindingCache::new(Some(self.current), self.capacity);
        let previous = mem::replace(&mut self.current, handle);
        let below = mem::replace(&mut self.top, fresh);
        self.parked.insert(previous, below);
        debug!(cache = %handle, previous = %previous, depth = self.depth(), "cache pushed");
        previous
    }

    /// Discard the current cache and make `previous` current again.
    ///
    /// Every wrapper still registered in the discarded cache loses its
    /// address. `previous` must be the handle [`push`](Self::push)
    /// returned for the current cache; anything else is rejected with
    /// [`BindError::StackMismatch`] and the stack is left untouched.
    pub fn pop(&mut self, previous: CacheHandle) -> Result<(), BindError> {
        let expected = self.top.pushed_over();
        if expected != Some(previous) {
            warn!(current = %self.current, ?expected, found = %previous, "rejected cache pop");
            return Err(BindError::StackMismatch {
                expected,
                found: previous,
            });
        }
        let Some(restored) = self.parked.swap_remove(&previous) else {
            warn!(current = %self.current, found = %previous, "pop target no longer live");
            return Err(BindError::UnknownCache { handle: previous });
        };

        // Addresses go first, before the stack changes shape.
        let popped = self.current;
        let invalidated = invalidate_members(popped, &self.top);
        self.current = previous;
        self.top = restored;
        self.relink(popped, previous);
        debug!(cache = %popped, current = %previous, invalidated, "cache popped");
        Ok(())
    }

    /// Invalidate and discard the cache named by `handle`, wherever it sits.
    ///
    /// This is how a scope that ends out of order gives up its cache. Every
    /// wrapper still registered in the cache loses its address. Caches that
    /// were pushed over it are relinked to the cache it was pushed over, so
    /// their own pops still succeed. Discarding the current cache is a
    /// [`pop`](Self::pop) to the cache below it. The root cache cannot be
    /// discarded.
    pub fn discard(&mut self, handle: CacheHandle) -> Result<(), BindError> {
        if handle == self.current {
            let Some(below) = self.top.pushed_over() else {
                return Err(BindError::StackMismatch {
                    expected: None,
                    found: handle,
                });
            };
            return self.pop(below);
        }
        let Some(below) = self.parked.get(&handle).map(WeakBindingCache::pushed_over) else {
            return Err(BindError::UnknownCache { handle });
        };
        let Some(below) = below else {
            return Err(BindError::StackMismatch {
                expected: None,
                found: handle,
            });
        };
        let invalidated = self
            .parked
            .swap_remove(&handle)
            .map_or(0, |cache| invalidate_members(handle, &cache));
        self.relink(handle, below);
        debug!(cache = %handle, below = %below, invalidated, "cache discarded out of order");
        Ok(())
    }

    /// Make `new_top` current without invalidating anything, returning the
    /// old current.
    ///
    /// The old current stays live and can be switched back to. Switching
    /// to the cache that is already current is a no-op.
    pub fn switch_top(&mut self, new_top: CacheHandle) -> Result<CacheHandle, BindError> {
        if new_top == self.current {
            return Ok(self.current);
        }
        let Some(next) = self.parked.swap_remove(&new_top) else {
            warn!(current = %self.current, requested = %new_top, "rejected cache switch");
            return Err(BindError::UnknownCache { handle: new_top });
        };

        let old = mem::replace(&mut self.current, new_top);
        let old_cache = mem::replace(&mut self.top, next);
        self.parked.insert(old, old_cache);
        trace!(from = %old, to = %new_top, "cache switched");
        Ok(old)
    }

    /// The wrapper bound to `address` in the current cache.
    ///
    /// A lapsed weak reference, a missing entry, and an entry whose wrapper
    /// is of another type all read as not found.
    pub fn obtain<T: NativeStruct>(&mut self, address: BlockAddr) -> Option<Rc<T>> {
        let found: Rc<dyn Any> = self.top.lookup(address)?;
        found.downcast::<T>().ok()
    }

    /// Bind `wrapper` to `address` in the current cache and set its address.
    ///
    /// The last bind of an address wins: a wrapper displaced from the entry
    /// loses its membership but keeps its address. A wrapper already
    /// registered elsewhere is moved.
    pub fn bind<T: NativeStruct>(&mut self, address: BlockAddr, wrapper: &Rc<T>) {
        self.detach(&**wrapper);

        let weak: Weak<dyn NativeStruct> = Rc::<T>::downgrade(wrapper);
        if let Some(displaced) = self.top.insert(address, weak).and_then(|w| w.upgrade()) {
            displaced.native().set_membership(None);
            trace!(%address, cache = %self.current, "binding displaced");
        }
        let native = wrapper.native();
        native.set_address(Some(address));
        native.set_membership(Some(self.current));
        trace!(%address, cache = %self.current, "wrapper bound");
    }

    /// Set a wrapper's address without registering it in any cache.
    ///
    /// The wrapper will not be invalidated by any pop; use this only for
    /// blocks whose lifetime is not tied to a scope.
    pub fn set_address_only<T: NativeStruct + ?Sized>(&mut self, wrapper: &T, address: BlockAddr) {
        self.detach(wrapper);
        wrapper.native().set_address(Some(address));
    }

    /// The wrapper's current address.
    pub fn address<T: NativeStruct + ?Sized>(&self, wrapper: &T) -> Option<BlockAddr> {
        wrapper.native().address()
    }

    /// Clear the wrapper's address and remove it from whichever live cache
    /// holds it, returning the old address.
    pub fn release<T: NativeStruct + ?Sized>(&mut self, wrapper: &T) -> Option<BlockAddr> {
        self.detach(wrapper);
        let address = wrapper.native().address();
        wrapper.native().set_address(None);
        address
    }

    /// Drop the wrapper's cache entry, if it still has one.
    fn detach<T: NativeStruct + ?Sized>(&mut self, wrapper: &T) {
        let native = wrapper.native();
        let (Some(handle), Some(address)) = (native.membership(), native.address()) else {
            native.set_membership(None);
            return;
        };
        if let Some(cache) = self.cache_mut(handle) {
            cache.remove_if_bound(address, wrapper);
        }
        native.set_membership(None);
    }

    /// Point every cache pushed over `gone` at `below` instead.
    fn relink(&mut self, gone: CacheHandle, below: CacheHandle) {
        let caches = self.parked.values_mut().chain(std::iter::once(&mut self.top));
        for cache in caches.filter(|cache| cache.pushed_over() == Some(gone)) {
            cache.set_pushed_over(Some(below));
        }
    }

    fn cache(&self, handle: CacheHandle) -> Option<&WeakBindingCache> {
        if handle == self.current {
            Some(&self.top)
        } else {
            self.parked.get(&handle)
        }
    }

    fn cache_mut(&mut self, handle: CacheHandle) -> Option<&mut WeakBindingCache> {
        if handle == self.current {
            Some(&mut self.top)
        } else {
            self.parked.get_mut(&handle)
        }
    }
}

/// Clear the address of every live wrapper whose membership is `handle`.
fn invalidate_members(handle: CacheHandle, cache: &WeakBindingCache) -> usize {
    let mut invalidated = 0usize;
    for wrapper in cache.live() {
        let native = wrapper.native();
        if native.membership() == Some(handle) {
            native.invalidate();
            invalidated += 1;
        }
    }
    invalidated
}

impl Default for BindingStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingStack")
            .field("current", &self.current)
            .field("depth", &self.depth())
            .field("entries", &self.top.len())
            .finish()
    }
}
