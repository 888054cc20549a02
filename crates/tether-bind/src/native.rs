//! The wrapper-object protocol.
//!
//! A wrapper is a managed value (`Rc<T>`) standing in for one block of a
//! memory context. It embeds a [`NativeHandle`] holding the block address
//! and the cache it is registered in. The address is cleared when the
//! block's scope ends, so reads through a wrapper either see a live block
//! or fail with [`BindError::StaleNativeReference`].

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use tether_core::BlockAddr;

use crate::cache::CacheHandle;
use crate::error::BindError;
use crate::stack::BindingStack;

/// Address field and cache membership embedded in every wrapper.
#[derive(Debug, Default)]
pub struct NativeHandle {
    address: Cell<Option<BlockAddr>>,
    membership: Cell<Option<CacheHandle>>,
}

impl NativeHandle {
    /// A handle with no address and no cache membership.
    pub fn new() -> Self {
        Self::default()
    }

    /// The native address, or `None` once invalidated or released.
    pub fn address(&self) -> Option<BlockAddr> {
        self.address.get()
    }

    /// Whether the address is present.
    pub fn has_valid_address(&self) -> bool {
        self.address.get().is_some()
    }

    /// The native address, or [`BindError::StaleNativeReference`].
    pub fn require_address(&self) -> Result<BlockAddr, BindError> {
        self.address.get().ok_or(BindError::StaleNativeReference)
    }

    /// The cache this wrapper is registered in, if any.
    pub fn membership(&self) -> Option<CacheHandle> {
        self.membership.get()
    }

    pub(crate) fn set_address(&self, address: Option<BlockAddr>) {
        self.address.set(address);
    }

    pub(crate) fn set_membership(&self, membership: Option<CacheHandle>) {
        self.membership.set(membership);
    }

    /// Clear both the address and the membership.
    pub(crate) fn invalidate(&self) {
        self.address.set(None);
        self.membership.set(None);
    }
}

/// A managed value bound to a native block.
///
/// Implementors only provide [`native`](NativeStruct::native); the rest of
/// the protocol is inherited.
///
/// ```ignore
/// struct Tuple {
///     native: NativeHandle,
/// }
///
/// impl NativeStruct for Tuple {
///     fn native(&self) -> &NativeHandle {
///         &self.native
///     }
/// }
/// ```
pub trait NativeStruct: Any {
    /// The embedded address field.
    fn native(&self) -> &NativeHandle;

    /// Bind a fresh wrapper to `address` in the stack's current cache.
    fn init(this: &Rc<Self>, stack: &mut BindingStack, address: BlockAddr)
    where
        Self: Sized,
    {
        stack.bind(address, this);
    }

    /// The native address, or `None` once the scope has ended.
    fn address(&self) -> Option<BlockAddr> {
        self.native().address()
    }

    /// Whether the native address is still present.
    fn has_valid_address(&self) -> bool {
        self.native().has_valid_address()
    }

    /// The native address, or [`BindError::StaleNativeReference`].
    fn require_address(&self) -> Result<BlockAddr, BindError> {
        self.native().require_address()
    }

    /// Clear the address and drop the cache entry, returning the old
    /// address.
    fn release(&self, stack: &mut BindingStack) -> Option<BlockAddr>
    where
        Self: Sized,
    {
        stack.release(self)
    }
}
