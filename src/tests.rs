use crate::*;
use std::cell::RefCell;
use std::ops::Deref;

#[test]
fn test_simple_untracked() {
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    static DROPPED: AtomicBool = AtomicBool::new(false);
    struct X(&'static str);
    crate::untrack!(X);
    impl Drop for X {
        fn drop(&mut self) {
            DROPPED.store(true, SeqCst);
        }
    }
    {
        let v1 = Cc::new(X("abc"));
        {
            let v2 = v1.clone();
            assert_eq!(v1.deref().0, v2.deref().0);
        }
        assert!(!DROPPED.load(SeqCst));
    }
    assert!(DROPPED.load(SeqCst));
}

#[test]
fn test_simple_tracked() {
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    static DROPPED: AtomicBool = AtomicBool::new(false);
    struct X(&'static str);
    impl Trace for X {}
    impl Drop for X {
        fn drop(&mut self) {
            DROPPED.store(true, SeqCst);
        }
    }
    {
        let v1 = Cc::new(X("abc"));
        {
            let v2 = v1.clone();
            assert_eq!(v1.deref().0, v2.deref().0);
        }
        assert!(!DROPPED.load(SeqCst));
    }
    assert!(DROPPED.load(SeqCst));
}

#[test]
fn test_simple_cycles() {
    assert_eq!(collect::collect_thread_cycles(), 0);
    {
        let a: Cc<RefCell<Vec<Box<dyn Trace>>>> = Cc::new(RefCell::new(Vec::new()));
        let b: Cc<RefCell<Vec<Box<dyn Trace>>>> = Cc::new(RefCell::new(Vec::new()));
        assert_eq!(collect::collect_thread_cycles(), 0);
        {
            let mut a = a.borrow_mut();
            a.push(Box::new(b.clone()));
        }
        {
            let mut b = b.borrow_mut();
            b.push(Box::new(a.clone()));
        }
        assert_eq!(collect::collect_thread_cycles(), 0);
    }
    assert_eq!(collect::collect_thread_cycles(), 2);
}

/// SPEC_FULL.md §8 scenario 2: a self-cycle (`L = [L]`) is freed by a
/// single `collect()`, and `Trace::finalize` (the `tp_clear`-equivalent
/// path, via the node's own `Drop`) runs on it.
#[test]
fn test_self_cycle() {
    use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
    static DROPPED: AtomicBool = AtomicBool::new(false);
    struct Node(RefCell<Vec<Box<dyn Trace>>>);
    impl Trace for Node {
        fn trace(&self, tracer: &mut Tracer) {
            for child in self.0.borrow().iter() {
                child.trace(tracer);
            }
        }
    }
    impl Drop for Node {
        fn drop(&mut self) {
            DROPPED.store(true, SeqCst);
        }
    }

    assert_eq!(collect::collect_thread_cycles(), 0);
    {
        let l: Cc<Node> = Cc::new(Node(RefCell::new(Vec::new())));
        l.0.borrow_mut().push(Box::new(l.clone()));
        assert!(!DROPPED.load(SeqCst));
    }
    assert_eq!(collect::collect_thread_cycles(), 1);
    assert!(DROPPED.load(SeqCst));
}

/// SPEC_FULL.md §8 scenario 3: a cycle where one member has a legacy
/// (`tp_del`-style) finalizer is never dropped automatically -- it (and
/// its cycle-mate) surface on `gc::garbage` instead, and `collect()`
/// reports 0 reclaimed.
#[test]
fn test_legacy_finalizer_publishes_to_garbage() {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    static LEGACY_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Legacy(RefCell<Vec<Box<dyn Trace>>>);
    impl Trace for Legacy {
        fn trace(&self, tracer: &mut Tracer) {
            for child in self.0.borrow().iter() {
                child.trace(tracer);
            }
        }
        fn legacy_finalize(&self) {
            LEGACY_CALLS.fetch_add(1, SeqCst);
        }
        fn has_legacy_finalizer() -> bool {
            true
        }
    }
    struct Plain(RefCell<Vec<Box<dyn Trace>>>);
    impl Trace for Plain {
        fn trace(&self, tracer: &mut Tracer) {
            for child in self.0.borrow().iter() {
                child.trace(tracer);
            }
        }
    }

    crate::gc::garbage(); // drain leftovers from any earlier test on this thread
    let a: Cc<Legacy> = Cc::new(Legacy(RefCell::new(Vec::new())));
    let b: Cc<Plain> = Cc::new(Plain(RefCell::new(Vec::new())));
    a.0.borrow_mut().push(Box::new(b.clone()));
    b.0.borrow_mut().push(Box::new(a.clone()));
    drop(a);
    drop(b);

    assert_eq!(crate::gc::collect(0).unwrap(), 0);
    assert_eq!(LEGACY_CALLS.load(SeqCst), 1);
    assert_eq!(crate::gc::garbage().len(), 2);
}

/// SPEC_FULL.md §8 scenario 4: a finalizer that resurrects the cycle by
/// publishing a reference to one of its members to a thread-local keeps
/// the whole cycle alive through that `collect()`; once the stash is
/// cleared, a second `collect()` frees both and never re-runs `finalize`
/// on either (invariant 6).
#[test]
fn test_resurrection_survives_one_collection() {
    thread_local! {
        static STASH: RefCell<Option<Cc<Resurrecting>>> = RefCell::new(None);
    }
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    static FINALIZE_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Resurrecting {
        name: &'static str,
        next: RefCell<Option<Cc<Resurrecting>>>,
    }
    impl Trace for Resurrecting {
        fn trace(&self, tracer: &mut Tracer) {
            self.next.trace(tracer);
        }
        fn finalize(&self) {
            FINALIZE_CALLS.fetch_add(1, SeqCst);
            // Only the designated node resurrects; it does so by handing
            // out a strong reference to its neighbor (which transitively
            // keeps itself alive too, via the neighbor's own `next`).
            if self.name == "a" {
                if let Some(neighbor) = self.next.borrow().clone() {
                    STASH.with(|s| *s.borrow_mut() = Some(neighbor));
                }
            }
        }
        fn has_finalizer() -> bool {
            true
        }
    }

    let a: Cc<Resurrecting> = Cc::new(Resurrecting {
        name: "a",
        next: RefCell::new(None),
    });
    let b: Cc<Resurrecting> = Cc::new(Resurrecting {
        name: "b",
        next: RefCell::new(None),
    });
    *a.next.borrow_mut() = Some(b.clone());
    *b.next.borrow_mut() = Some(a.clone());
    drop(a);
    drop(b);

    assert_eq!(crate::gc::collect(0).unwrap(), 0);
    assert_eq!(FINALIZE_CALLS.load(SeqCst), 2);
    assert_eq!(collect::count_thread_tracked(), 2);

    STASH.with(|s| *s.borrow_mut() = None);
    assert_eq!(crate::gc::collect(0).unwrap(), 2);
    assert_eq!(FINALIZE_CALLS.load(SeqCst), 2, "finalize must not run a second time");
}

/// SPEC_FULL.md §8 scenario 5: a weak reference with a callback, pointing
/// at a member of an otherwise-unreachable cycle, has its callback fire
/// exactly once and is cleared; the cycle is still freed.
#[test]
fn test_weakref_callback_fires_once() {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Node(RefCell<Vec<Box<dyn Trace>>>);
    impl Trace for Node {
        fn trace(&self, tracer: &mut Tracer) {
            for child in self.0.borrow().iter() {
                child.trace(tracer);
            }
        }
    }

    let a: Cc<Node> = Cc::new(Node(RefCell::new(Vec::new())));
    let b: Cc<Node> = Cc::new(Node(RefCell::new(Vec::new())));
    a.0.borrow_mut().push(Box::new(b.clone()));
    b.0.borrow_mut().push(Box::new(a.clone()));
    let w = a.downgrade_with_callback(|| {
        CALLS.fetch_add(1, SeqCst);
    });
    drop(a);
    drop(b);

    assert_eq!(collect::collect_thread_cycles(), 2);
    assert_eq!(CALLS.load(SeqCst), 1);
    assert!(w.upgrade().is_none());
}

/// SPEC_FULL.md §8 scenario 6: when both the weak reference holder and its
/// target are members of the same unreachable cycle, the callback is
/// discarded rather than invoked (both parties are trash together).
#[test]
fn test_weakref_callback_discarded_when_holder_also_unreachable() {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Node(RefCell<Vec<Box<dyn Trace>>>, RefCell<Option<Weak<Node>>>);
    impl Trace for Node {
        fn trace(&self, tracer: &mut Tracer) {
            for child in self.0.borrow().iter() {
                child.trace(tracer);
            }
        }
    }

    let a: Cc<Node> = Cc::new(Node(RefCell::new(Vec::new()), RefCell::new(None)));
    let b: Cc<Node> = Cc::new(Node(RefCell::new(Vec::new()), RefCell::new(None)));
    // `b` holds a weak reference (with callback) to `a`; `b` is itself only
    // reachable through the `a <-> b` strong cycle, so both are unreachable
    // together once the local bindings are dropped.
    let w = a.downgrade_with_callback(|| {
        CALLS.fetch_add(1, SeqCst);
    });
    *b.1.borrow_mut() = Some(w);
    a.0.borrow_mut().push(Box::new(b.clone()));
    b.0.borrow_mut().push(Box::new(a.clone()));
    drop(a);
    drop(b);

    assert_eq!(collect::collect_thread_cycles(), 2);
    assert_eq!(CALLS.load(SeqCst), 0);
}
