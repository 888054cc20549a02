//! Wrapper invalidation driven by real scope teardown.

use std::cell::Cell;
use std::rc::Rc;

use tether_arena::{ContextId, ContextTree, ScopeEnd};
use tether_bind::{BindError, NativeStruct, ResultStaging, ScopeBinding};
use tether_intercept::{EndOfScopeObserver, ScopeHooks};
use tether_test_utils::{shared_stack, small_tree, DescRef, TupleRef};

#[test]
fn scope_teardown_invalidates_bound_wrapper() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let ctx = tree.create(tree.root(), "call").unwrap();

    let previous = stack.borrow_mut().push();
    let fired = Rc::new(Cell::new(0));
    let observer: EndOfScopeObserver = {
        let stack = Rc::clone(&stack);
        let fired = Rc::clone(&fired);
        Rc::new(move |_: &mut ContextTree, _: ContextId, _: ScopeEnd| {
            fired.set(fired.get() + 1);
            stack.borrow_mut().pop(previous).unwrap();
        })
    };
    tree.add_end_of_scope_observer(ctx, observer).unwrap();

    let block = tree.alloc(ctx, 16).unwrap();
    let wrapper = Rc::new(TupleRef::default());
    stack.borrow_mut().bind(block, &wrapper);
    assert_eq!(wrapper.address(), Some(block));

    tree.delete(ctx).unwrap();
    assert_eq!(fired.get(), 1);
    assert_eq!(wrapper.address(), None);
    assert_eq!(wrapper.read(&tree), Err(BindError::StaleNativeReference));
}

#[test]
fn one_wrapper_per_address_until_release() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let ctx = tree.create(tree.root(), "call").unwrap();
    let _scope = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
    let block = tree.alloc(ctx, 16).unwrap();

    let first = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block);
    let second = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block);
    assert!(Rc::ptr_eq(&first, &second));

    assert_eq!(first.release(&mut stack.borrow_mut()), Some(block));
    assert!(stack.borrow_mut().obtain::<TupleRef>(block).is_none());
    assert!(!second.has_valid_address());
}

#[test]
fn wrapper_reads_live_block_then_goes_stale() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let ctx = tree.create(tree.root(), "call").unwrap();
    let _scope = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
    let block = tree.alloc(ctx, 8).unwrap();

    let tuple = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block);
    tuple.write(&mut tree, b"rowdata!").unwrap();
    assert_eq!(tuple.read(&tree).unwrap(), b"rowdata!".to_vec());

    // The same address comes back after a reset; the old wrapper must not
    // see the new block.
    tree.reset(ctx).unwrap();
    let reused = tree.alloc(ctx, 8).unwrap();
    assert_eq!(reused, block);
    assert_eq!(tuple.read(&tree), Err(BindError::StaleNativeReference));
    assert!(stack.borrow_mut().obtain::<TupleRef>(reused).is_none());
}

#[test]
fn lookup_of_other_wrapper_type_is_not_found() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let ctx = tree.create(tree.root(), "call").unwrap();
    let _scope = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
    let block = tree.alloc(ctx, 8).unwrap();

    let _tuple = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block);
    assert!(stack.borrow_mut().obtain::<DescRef>(block).is_none());
}

#[test]
fn nested_scopes_unwind_in_order_on_parent_delete() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let outer = tree.create(tree.root(), "outer").unwrap();
    let _outer = ScopeBinding::attach(&mut tree, outer, &stack).unwrap();
    let a = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), tree.alloc(outer, 8).unwrap());

    let first = tree.create(outer, "first").unwrap();
    let _first = ScopeBinding::attach(&mut tree, first, &stack).unwrap();
    let b = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), tree.alloc(first, 8).unwrap());

    let second = tree.create(outer, "second").unwrap();
    let _second = ScopeBinding::attach(&mut tree, second, &stack).unwrap();
    let c = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), tree.alloc(second, 8).unwrap());
    assert_eq!(stack.borrow().depth(), 4);

    tree.delete(outer).unwrap();
    assert_eq!(stack.borrow().depth(), 1);
    assert!(!a.has_valid_address());
    assert!(!b.has_valid_address());
    assert!(!c.has_valid_address());
}

#[test]
fn staged_result_outlives_call() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let result_ctx = tree.create(tree.root(), "result").unwrap();
    tree.designate_result_context(result_ctx).unwrap();
    let _result = ScopeBinding::attach(&mut tree, result_ctx, &stack).unwrap();

    let call = tree.create(result_ctx, "call").unwrap();
    let _call = ScopeBinding::attach(&mut tree, call, &stack).unwrap();
    let scratch = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), tree.alloc(call, 8).unwrap());

    let staging = ResultStaging::new(&tree).unwrap();
    let out_block = tree.alloc(result_ctx, 8).unwrap();
    let out = staging
        .stage(&tree, &mut stack.borrow_mut(), |stack| {
            TupleRef::obtain_or_bind(stack, out_block)
        })
        .unwrap();

    tree.delete(call).unwrap();
    assert!(!scratch.has_valid_address());
    assert_eq!(out.require_address(), Ok(out_block));
    assert!(tree.has_capability(result_ctx));
}

#[test]
fn sibling_scopes_deleted_out_of_attach_order_both_invalidate() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let root = tree.root();
    let a = tree.create(root, "a").unwrap();
    let b = tree.create(root, "b").unwrap();

    let _scope_a = ScopeBinding::attach(&mut tree, a, &stack).unwrap();
    let block_a = tree.alloc(a, 16).unwrap();
    let in_a = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block_a);
    let scope_b = ScopeBinding::attach(&mut tree, b, &stack).unwrap();

    tree.delete(a).unwrap();
    assert!(!tree.contains_block(block_a));
    assert_eq!(in_a.address(), None);
    assert_eq!(stack.borrow().current(), scope_b.frame().cache());
    assert_eq!(stack.borrow().depth(), 2);

    let block_b = tree.alloc(b, 16).unwrap();
    let in_b = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block_b);
    tree.delete(b).unwrap();
    assert_eq!(in_b.address(), None);

    // The dead scope's cache never comes back as current.
    let stack = stack.borrow();
    assert_eq!(stack.current(), tether_bind::CacheHandle::ROOT);
    assert_eq!(stack.depth(), 1);
}

#[test]
fn reset_out_of_order_invalidates_and_keeps_stack_consistent() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let root = tree.root();
    let a = tree.create(root, "a").unwrap();
    let b = tree.create(root, "b").unwrap();

    let scope_a = ScopeBinding::attach(&mut tree, a, &stack).unwrap();
    let block_a = tree.alloc(a, 16).unwrap();
    let in_a = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block_a);
    let _scope_b = ScopeBinding::attach(&mut tree, b, &stack).unwrap();

    tree.reset(a).unwrap();
    assert_eq!(in_a.address(), None);
    assert_eq!(stack.borrow().current(), scope_a.frame().cache());
    assert_eq!(stack.borrow().depth(), 3);

    tree.delete(b).unwrap();
    assert_eq!(stack.borrow().depth(), 2);
    tree.delete(a).unwrap();
    assert_eq!(stack.borrow().current(), tether_bind::CacheHandle::ROOT);
    assert_eq!(stack.borrow().depth(), 1);
}

#[test]
#[should_panic(expected = "binding stack is borrowed")]
fn scope_end_with_stack_borrowed_fails_loudly() {
    let mut tree = small_tree();
    let stack = shared_stack();
    let ctx = tree.create(tree.root(), "call").unwrap();
    let _scope = ScopeBinding::attach(&mut tree, ctx, &stack).unwrap();
    let block = tree.alloc(ctx, 16).unwrap();
    let _wrapper = TupleRef::obtain_or_bind(&mut stack.borrow_mut(), block);

    let _held = stack.borrow_mut();
    let _ = tree.delete(ctx);
}
