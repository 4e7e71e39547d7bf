//! Intrusive doubly-linked list primitives built on [`GcHeader`]-shaped
//! anchors (SPEC_FULL.md §4.1). Shared by every list the collector needs:
//! an `ObjectSpace`'s tracked set, the sweep's `young`/`unreachable`
//! working lists, and the finalization pipeline's `finalizers`,
//! `wrcb_to_call`, `final_unreachable` and `dead` lists.
use crate::header::GcHeader;

/// Types that behave like a [`GcHeader`] node in an intrusive list. Kept
/// generic (rather than hard-coding `GcHeader`) so the same list code runs
/// over `ObjectSpace`'s plain header and `sync::AccHeader`'s
/// lock-carrying header.
pub trait Linked: Sized {
    fn next(&self) -> *const Self;
    fn prev(&self) -> *const Self;
    fn set_next(&self, other: *const Self);
    fn set_prev(&self, other: *const Self);

    /// Get the trait object used to operate on the actual boxed value.
    fn value(&self) -> &dyn crate::cc::CcDyn;
}

impl Linked for GcHeader {
    #[inline]
    fn next(&self) -> *const Self {
        self.next.get()
    }
    #[inline]
    fn prev(&self) -> *const Self {
        self.prev.get()
    }
    #[inline]
    fn set_next(&self, other: *const Self) {
        self.next.set(other)
    }
    #[inline]
    fn set_prev(&self, other: *const Self) {
        self.prev.set(other)
    }
    #[inline]
    fn value(&self) -> &dyn crate::cc::CcDyn {
        GcHeader::value(self)
    }
}

/// Initialize `header` as an empty, self-looping list sentinel.
pub(crate) fn init<L: Linked>(header: &L) {
    header.set_next(header);
    header.set_prev(header);
}

#[inline]
pub(crate) fn is_empty<L: Linked>(header: &L) -> bool {
    header.next() as *const _ == header as *const _
}

/// Append `node` immediately before `sentinel` (i.e. at the tail of the
/// list `sentinel` anchors). O(1).
pub(crate) fn append<L: Linked>(sentinel: &L, node: &L) {
    let prev = sentinel.prev();
    debug_assert!(node.next() as *const _ == node as *const _ || node.next().is_null());
    node.set_prev(prev);
    node.set_next(sentinel);
    // safety: `prev` is either `sentinel` itself or a live node in the
    // same list; both are valid for the lifetime of the list.
    unsafe { (*prev).set_next(node) };
    sentinel.set_prev(node);
}

/// Unlink `node` from whatever list it is currently part of. O(1). Does
/// not touch `node`'s flags; callers preserve durable bits separately
/// (see `header::GcHeader::end_collecting`).
pub(crate) fn unlink<L: Linked>(node: &L) {
    let next = node.next();
    let prev = node.prev();
    debug_assert!(!next.is_null());
    debug_assert!(!prev.is_null());
    // safety: list pointers are maintained; both are valid.
    unsafe {
        (*prev).set_next(next);
        (*next).set_prev(prev);
    }
    node.set_next(std::ptr::null());
    node.set_prev(std::ptr::null());
}

/// Move `node` from its current list to the tail of `dest`. O(1).
pub(crate) fn move_to<L: Linked>(node: &L, dest: &L) {
    unlink(node);
    append(dest, node);
}

/// Visit every node of the list anchored by `sentinel`, skipping the
/// sentinel itself. Safe to unlink the *current* node from within `func`;
/// unsafe to unlink any other node, since the traversal pointer is
/// captured before `func` runs.
pub(crate) fn visit<'a, L: Linked>(sentinel: &'a L, mut func: impl FnMut(&'a L)) {
    let mut ptr = sentinel.next();
    while ptr as *const _ != sentinel as *const _ {
        // safety: list pointers are maintained; live nodes are valid.
        let header: &L = unsafe { &*ptr };
        ptr = header.next();
        func(header);
    }
}

/// Count nodes in the list anchored by `sentinel`. O(n); used only to
/// pre-size a `Vec` before a destructive drain (see `finalize::drop_final`).
pub(crate) fn len<L: Linked>(sentinel: &L) -> usize {
    let mut n = 0;
    visit(sentinel, |_| n += 1);
    n
}

/// Detach every node from the list anchored by `sentinel`, zeroing each
/// node's pointers, and reset `sentinel` to empty.
pub(crate) fn clear<L: Linked>(sentinel: &L) {
    let mut ptr = sentinel.next();
    while ptr as *const _ != sentinel as *const _ {
        // safety: see `visit`.
        let header: &L = unsafe { &*ptr };
        let next = header.next();
        header.set_next(std::ptr::null());
        header.set_prev(std::ptr::null());
        ptr = next;
    }
    init(sentinel);
}
