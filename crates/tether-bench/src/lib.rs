//! Benchmark workloads for Tether.
//!
//! - [`call_scope`]: one simulated function-manager call that binds
//!   `rows` wrappers in a fresh scope and tears it down.
//! - [`BenchRow`]: minimal wrapper type used by the workloads.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::cell::RefCell;
use std::rc::Rc;

use tether_arena::{ArenaError, ContextId, ContextTree};
use tether_bind::{BindingStack, NativeHandle, NativeStruct, ScopeBinding, ScopeError};

/// Minimal wrapper with no payload.
#[derive(Default)]
pub struct BenchRow {
    native: NativeHandle,
}

impl NativeStruct for BenchRow {
    fn native(&self) -> &NativeHandle {
        &self.native
    }
}

/// Errors surfaced by the workloads.
#[derive(Debug)]
pub enum WorkloadError {
    /// Arena operation failed.
    Arena(ArenaError),
    /// Scope glue failed.
    Scope(ScopeError),
}

impl From<ArenaError> for WorkloadError {
    fn from(err: ArenaError) -> Self {
        Self::Arena(err)
    }
}

impl From<ScopeError> for WorkloadError {
    fn from(err: ScopeError) -> Self {
        Self::Scope(err)
    }
}

/// Run one call under `parent`: attach a cache, bind `rows` wrappers (each
/// looked up twice), then delete the call context.
///
/// Returns the wrappers so callers can check they were invalidated.
pub fn call_scope(
    tree: &mut ContextTree,
    stack: &Rc<RefCell<BindingStack>>,
    parent: ContextId,
    rows: usize,
) -> Result<Vec<Rc<BenchRow>>, WorkloadError> {
    let call = tree.create(parent, "call")?;
    let _scope = ScopeBinding::attach(tree, call, stack)?;

    let mut wrappers = Vec::with_capacity(rows);
    for _ in 0..rows {
        let block = tree.alloc(call, 16)?;
        let mut stack = stack.borrow_mut();
        let row = match stack.obtain::<BenchRow>(block) {
            Some(row) => row,
            None => {
                let row = Rc::new(BenchRow::default());
                BenchRow::init(&row, &mut stack, block);
                row
            }
        };
        let again = stack.obtain::<BenchRow>(block);
        debug_assert!(again.is_some_and(|w| Rc::ptr_eq(&w, &row)));
        wrappers.push(row);
    }

    tree.delete(call)?;
    Ok(wrappers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_arena::ArenaConfig;

    #[test]
    fn call_scope_invalidates_every_row() {
        let mut tree = ContextTree::new(ArenaConfig::new()).unwrap();
        let stack = Rc::new(RefCell::new(BindingStack::new()));
        let root = tree.root();

        let rows = call_scope(&mut tree, &stack, root, 32).unwrap();
        assert_eq!(rows.len(), 32);
        assert!(rows.iter().all(|row| !row.has_valid_address()));
        assert_eq!(stack.borrow().depth(), 1);
        assert_eq!(tree.live_contexts(), 1);
    }
}
