//! Deferred-RC adjuster (SPEC_FULL.md §4.3): the crate's model of
//! stack-rooted references to objects whose ordinary strong count would
//! otherwise have to be bumped and dropped on every frame push/pop.
//!
//! A [`Deferred<T>`] wraps a [`Cc<T>`](crate::Cc) and flags its allocation
//! `DEFERRED` (`ref_count::RefCount::is_deferred`). A `DEFERRED` object's
//! strong count is allowed to *read* as zero between collections --
//! invariant 3 in SPEC_FULL.md §3 -- without being freed: `Drop for RawCc`
//! parks it instead (see that impl). The thread's [`Roots`] registry is
//! what lets a later collection tell a merely-parked object (still a live
//! root, or referenced by one) from a genuinely dead one.
use crate::cc::RawCc;
use crate::collect::ObjectSpace;
use crate::ref_count::RefCount;
use crate::trace::Trace;
use std::cell::Cell;
use std::cell::RefCell;
use std::mem::ManuallyDrop;
use std::ops::Deref;

/// Whether a strong count reaching zero on a `DEFERRED` object should park
/// it (`true`, the default, "outside a collection") or free it for real
/// (`false`, set by [`retain_all`] for the duration of a collection and
/// restored by [`release_all`]).
thread_local! {
    static USE_DEFERRED_RC: Cell<bool> = Cell::new(true);
    static ROOTS: RefCell<Vec<Box<dyn RootOps>>> = RefCell::new(Vec::new());
}

/// Read by `Drop for RawCc` to decide whether a `DEFERRED` object's count
/// reaching zero should park it or actually free it.
#[inline]
pub(crate) fn is_deferred_rc_active() -> bool {
    USE_DEFERRED_RC.with(|flag| flag.get())
}

/// Type-erased operations `Roots` needs on a registered deferred root,
/// without requiring `T: 'static` bounds to leak into the registry's own
/// type or the registry to know `T` at all.
trait RootOps {
    fn raw_ptr(&self) -> *const ();
    fn inc_ref(&self);
    fn dec_ref(&self);
    fn ref_count(&self) -> usize;
    fn force_free_parked(&self);
}

struct RootSlot<T: Trace + 'static>(ManuallyDrop<RawCc<T, ObjectSpace>>);

impl<T: Trace + 'static> RootOps for RootSlot<T> {
    fn raw_ptr(&self) -> *const () {
        self.0.raw_ptr()
    }
    fn inc_ref(&self) {
        self.0.inc_ref();
    }
    fn dec_ref(&self) {
        self.0.dec_ref();
    }
    fn ref_count(&self) -> usize {
        self.0.ref_count()
    }
    fn force_free_parked(&self) {
        self.0.force_free_parked();
    }
}

/// A [`Cc<T>`](crate::Cc) marking a stack-rooted, deferred-counted
/// reference (SPEC_FULL.md §4.3). Behaves like `Cc<T>` for dereferencing
/// and cloning; the only difference is how the collector accounts for it.
///
/// Typical use is a local variable that outlives many individual
/// operations within a single call (the generator/coroutine-frame case
/// `deferred::task::SuspendedTask` builds on) where paying a strong-count
/// bump and drop on every access would be wasted work the collector can
/// account for in bulk instead, once per collection.
pub struct Deferred<T: Trace + 'static>(crate::Cc<T>);

impl<T: Trace + 'static> Deferred<T> {
    /// Wrap `value` in a new deferred-counted root on the current thread.
    pub fn new(value: T) -> Self {
        let cc = crate::Cc::new(value);
        cc.mark_deferred();
        ROOTS.with(|roots| {
            roots
                .borrow_mut()
                .push(Box::new(RootSlot(cc.duplicate_for_deferred())));
        });
        Deferred(cc)
    }

    /// Get the underlying `Cc<T>`, e.g. to store it inside another tracked
    /// value. Cloning the result is ordinary, counted `Cc` cloning; only
    /// the original `Deferred` registration is accounted for specially.
    pub fn get(&self) -> &crate::Cc<T> {
        &self.0
    }
}

impl<T: Trace + 'static> Deref for Deferred<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0.deref()
    }
}

impl<T: Trace + 'static> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        // A second `Deferred` over the same value is a second independent
        // root: register it too rather than sharing one registry slot.
        let cc = self.0.clone();
        ROOTS.with(|roots| {
            roots
                .borrow_mut()
                .push(Box::new(RootSlot(cc.duplicate_for_deferred())));
        });
        Deferred(cc)
    }
}

/// Pass A′ (dead pickup, SPEC_FULL.md §4.3/§4.4): free every registered
/// root whose target's strong count has already fallen to zero -- these
/// are `DEFERRED` objects every ordinary (non-root) handle has already
/// dropped, parked rather than freed by `Drop for RawCc` because this
/// thread wasn't mid-collection at the time.
///
/// Must run before [`retain_all`]: retaining first would mask a dead root
/// behind an artificial +1, the same object `retain_all` is about to add
/// a count to on the assumption it is a live stack reference.
pub(crate) fn collect_dead() {
    ROOTS.with(|roots| {
        roots.borrow_mut().retain(|root| {
            if root.ref_count() == 0 {
                root.force_free_parked();
                false
            } else {
                true
            }
        });
    });
}

/// Retain phase: add one strong count per registered root so the cycle
/// kernel sees deferred roots as real external references for the
/// duration of this collection, then suspend parking so any count that
/// *does* reach zero mid-collection is freed immediately.
pub(crate) fn retain_all() {
    ROOTS.with(|roots| {
        for root in roots.borrow().iter() {
            root.inc_ref();
        }
    });
    USE_DEFERRED_RC.with(|flag| flag.set(false));
}

/// Release phase: restore parking first, then undo exactly the counts
/// `retain_all` added. Order matters (SPEC_FULL.md §4.3): flipping the
/// flag back before decrementing means a `Drop for RawCc` racing with
/// this function (on `sync::Acc`, from another thread mid-release) always
/// sees the correct, restored parking behavior rather than observing the
/// flag still cleared for a nonzero count it happens to drop through.
pub(crate) fn release_all() {
    USE_DEFERRED_RC.with(|flag| flag.set(true));
    ROOTS.with(|roots| {
        for root in roots.borrow().iter() {
            root.dec_ref();
        }
    });
}

/// Number of roots currently registered on this thread. Exposed for tests
/// and `gc::get_count`-style introspection.
pub(crate) fn root_count() -> usize {
    ROOTS.with(|roots| roots.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect;

    struct Leaf(u32);
    impl Trace for Leaf {}

    #[test]
    fn test_deferred_root_survives_collection() {
        let d = Deferred::new(Leaf(1));
        assert_eq!(root_count(), 1);
        collect::collect_thread_cycles();
        assert_eq!(d.deref().0, 1);
    }
}
