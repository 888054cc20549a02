//! Fixture wrapper types.
//!
//! - [`TupleRef`] reads and writes the bytes of its block through the tree
//!   and fails with [`BindError::StaleNativeReference`] once invalidated.
//! - [`DescRef`] is a second wrapper type, for lookups of the wrong type.

use std::rc::Rc;

use tether_arena::ContextTree;
use tether_bind::{BindError, BindingStack, NativeHandle, NativeStruct};
use tether_core::BlockAddr;

/// Wrapper over a row-like block.
#[derive(Debug, Default)]
pub struct TupleRef {
    native: NativeHandle,
}

impl TupleRef {
    /// Return the wrapper cached for `addr`, or bind a new one.
    pub fn obtain_or_bind(stack: &mut BindingStack, addr: BlockAddr) -> Rc<Self> {
        if let Some(existing) = stack.obtain::<Self>(addr) {
            return existing;
        }
        let wrapper = Rc::new(Self::default());
        Self::init(&wrapper, stack, addr);
        wrapper
    }

    /// Copy of the block's bytes.
    pub fn read(&self, tree: &ContextTree) -> Result<Vec<u8>, BindError> {
        let addr = self.require_address()?;
        tree.block(addr)
            .map(<[u8]>::to_vec)
            .ok_or(BindError::StaleNativeReference)
    }

    /// Overwrite the start of the block with `bytes`.
    pub fn write(&self, tree: &mut ContextTree, bytes: &[u8]) -> Result<(), BindError> {
        let addr = self.require_address()?;
        let block = tree
            .block_mut(addr)
            .ok_or(BindError::StaleNativeReference)?;
        let n = bytes.len().min(block.len());
        block[..n].copy_from_slice(&bytes[..n]);
        Ok(())
    }
}

impl NativeStruct for TupleRef {
    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

/// Wrapper over a descriptor block.
#[derive(Debug, Default)]
pub struct DescRef {
    native: NativeHandle,
}

impl NativeStruct for DescRef {
    fn native(&self) -> &NativeHandle {
        &self.native
    }
}
