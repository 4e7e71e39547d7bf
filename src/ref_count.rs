//! Reference-count storage shared by `Cc<T>` (single-threaded). The
//! thread-safe `Acc<T>` counterpart has its own, differently-shaped
//! refcount word; see `sync::ref_count`.
use std::cell::Cell;

/// Whether a `GcHeader` exists before the `CcBox<T>`.
pub(crate) const REF_COUNT_MASK_TRACKED: usize = 0b001;

/// Whether `T` in the `CcBox<T>` has been dropped.
pub(crate) const REF_COUNT_MASK_DROPPED: usize = 0b010;

/// Whether this object is a [`Deferred`](crate::deferred::Deferred) root:
/// stack-held references to it are not counted until a collection makes
/// them explicit (§4.3, §3 invariant 3).
pub(crate) const REF_COUNT_MASK_DEFERRED: usize = 0b100;

/// Number of low bits used for metadata in the strong-count word.
pub(crate) const REF_COUNT_SHIFT: i32 = 3;

/// Operations the collector and `RawCc`/`RawWeak` need on a refcount word.
/// Implemented once for `Cc<T>`'s single-threaded storage; `Acc<T>`
/// implements the analogous, atomic version in `sync::ref_count`.
pub trait RefCount: 'static {
    /// What `locked()` hands back while held. A plain `()` for
    /// single-threaded storage (nothing to actually lock); a real
    /// `parking_lot` read-guard for `sync::ThreadedRefCount`, tying its
    /// lifetime to the borrow of `&self`.
    type LockGuard<'a>
    where
        Self: 'a;

    fn is_tracked(&self) -> bool;
    fn is_dropped(&self) -> bool;
    fn is_deferred(&self) -> bool;

    /// Flip on the `DEFERRED_RC` bit (SPEC_FULL §4.3) after construction.
    /// Used by [`crate::Deferred`] to mark an already-constructed `Cc<T>`
    /// as a stack-rooted value whose refcount reaching zero does not, by
    /// itself, free the value -- see `deferred::retain_all`/`release_all`
    /// and `RawCc::drop`'s `USE_DEFERRED_RC` check.
    fn set_deferred(&self);

    fn inc_ref(&self) -> usize;
    fn dec_ref(&self) -> usize;
    fn ref_count(&self) -> usize;
    fn set_dropped(&self) -> bool;
    fn weak_count(&self) -> usize;
    fn inc_weak(&self) -> usize;
    fn dec_weak(&self) -> usize;

    /// Block the cycle collector from observing a half-finished update.
    /// Single-threaded storage never contends with a collector running on
    /// the same thread, so this is a no-op; `Acc`'s implementation returns
    /// a real guard.
    #[inline]
    fn locked(&self) -> Option<Self::LockGuard<'_>> {
        None
    }
}

/// Packed single-threaded refcount: three flag bits (`TRACKED`, `DROPPED`,
/// `DEFERRED`) plus a shifted strong count, and a separate weak count. This
/// mirrors the teacher crate's `Cell<usize>` packing for the strong count
/// exactly; the weak count is split into its own cell because `Cc<T>`'s
/// durable flags must survive independently of weak-handle churn.
pub(crate) struct SingleThreadRefCount {
    state: Cell<usize>,
    weak: Cell<usize>,
}

impl SingleThreadRefCount {
    #[inline]
    pub(crate) fn new(tracked: bool) -> Self {
        let flags = if tracked { REF_COUNT_MASK_TRACKED } else { 0 };
        Self {
            state: Cell::new((1 << REF_COUNT_SHIFT) | flags),
            weak: Cell::new(0),
        }
    }

}

impl RefCount for SingleThreadRefCount {
    type LockGuard<'a> = ();

    #[inline]
    fn is_tracked(&self) -> bool {
        self.state.get() & REF_COUNT_MASK_TRACKED != 0
    }

    #[inline]
    fn is_dropped(&self) -> bool {
        self.state.get() & REF_COUNT_MASK_DROPPED != 0
    }

    #[inline]
    fn is_deferred(&self) -> bool {
        self.state.get() & REF_COUNT_MASK_DEFERRED != 0
    }

    #[inline]
    fn set_deferred(&self) {
        self.state.set(self.state.get() | REF_COUNT_MASK_DEFERRED);
    }

    #[inline]
    fn set_dropped(&self) -> bool {
        let value = self.state.get();
        self.state.set(value | REF_COUNT_MASK_DROPPED);
        value & REF_COUNT_MASK_DROPPED != 0
    }

    #[inline]
    fn ref_count(&self) -> usize {
        self.state.get() >> REF_COUNT_SHIFT
    }

    #[inline]
    fn inc_ref(&self) -> usize {
        let value = self.state.get();
        self.state.set(value + (1 << REF_COUNT_SHIFT));
        value >> REF_COUNT_SHIFT
    }

    #[inline]
    fn dec_ref(&self) -> usize {
        let value = self.state.get();
        self.state.set(value - (1 << REF_COUNT_SHIFT));
        value >> REF_COUNT_SHIFT
    }

    #[inline]
    fn weak_count(&self) -> usize {
        self.weak.get()
    }

    #[inline]
    fn inc_weak(&self) -> usize {
        let value = self.weak.get();
        self.weak.set(value + 1);
        value
    }

    #[inline]
    fn dec_weak(&self) -> usize {
        let value = self.weak.get();
        self.weak.set(value - 1);
        value
    }
}
