//! Atomic counterpart of [`crate::ref_count::SingleThreadRefCount`], used
//! by [`super::Acc`]'s `AccObjectSpace` (SPEC_FULL.md §3's "local/shared
//! refcount split" collapses here to a single atomic word plus a shared
//! `collecting` read/write lock, since this crate's `Acc` does not model
//! cross-thread queued/merged deltas the way a biased-refcounting runtime
//! would -- see `sync` module docs).
use crate::ref_count::{
    RefCount, REF_COUNT_MASK_DEFERRED, REF_COUNT_MASK_DROPPED, REF_COUNT_MASK_TRACKED,
    REF_COUNT_SHIFT,
};
use parking_lot::lock_api::RwLockReadGuard;
use parking_lot::RawRwLock;
use parking_lot::RwLock;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};
use std::sync::Arc;

/// Atomic refcount word for [`super::Acc`], with a separate atomic weak
/// count and a handle to the space-wide `collecting` lock every
/// allocation in the same `AccObjectSpace` shares (see
/// [`RefCount::locked`]).
pub struct ThreadedRefCount {
    ref_count: AtomicUsize,
    weak_count: AtomicUsize,
    pub(crate) collecting: Arc<RwLock<()>>,
}

impl ThreadedRefCount {
    #[inline]
    pub(crate) fn new(tracked: bool, collecting: Arc<RwLock<()>>) -> Self {
        Self {
            collecting,
            ref_count: AtomicUsize::new(
                (1 << REF_COUNT_SHIFT) | if tracked { REF_COUNT_MASK_TRACKED } else { 0 },
            ),
            weak_count: AtomicUsize::new(0),
        }
    }
}

impl RefCount for ThreadedRefCount {
    type LockGuard<'a> = RwLockReadGuard<'a, RawRwLock, ()>;

    #[inline]
    fn is_tracked(&self) -> bool {
        self.ref_count.load(Relaxed) & REF_COUNT_MASK_TRACKED != 0
    }

    #[inline]
    fn is_dropped(&self) -> bool {
        self.ref_count.load(Acquire) & REF_COUNT_MASK_DROPPED != 0
    }

    #[inline]
    fn is_deferred(&self) -> bool {
        self.ref_count.load(Relaxed) & REF_COUNT_MASK_DEFERRED != 0
    }

    #[inline]
    fn set_deferred(&self) {
        self.ref_count.fetch_or(REF_COUNT_MASK_DEFERRED, AcqRel);
    }

    #[inline]
    fn set_dropped(&self) -> bool {
        let old_value = self.ref_count.fetch_or(REF_COUNT_MASK_DROPPED, AcqRel);
        old_value & REF_COUNT_MASK_DROPPED != 0
    }

    #[inline]
    fn ref_count(&self) -> usize {
        self.ref_count.load(Acquire) >> REF_COUNT_SHIFT
    }

    #[inline]
    fn inc_ref(&self) -> usize {
        self.ref_count.fetch_add(1 << REF_COUNT_SHIFT, AcqRel) >> REF_COUNT_SHIFT
    }

    #[inline]
    fn dec_ref(&self) -> usize {
        self.ref_count.fetch_sub(1 << REF_COUNT_SHIFT, AcqRel) >> REF_COUNT_SHIFT
    }

    #[inline]
    fn weak_count(&self) -> usize {
        self.weak_count.load(Acquire)
    }

    #[inline]
    fn inc_weak(&self) -> usize {
        self.weak_count.fetch_add(1, AcqRel)
    }

    #[inline]
    fn dec_weak(&self) -> usize {
        self.weak_count.fetch_sub(1, AcqRel)
    }

    #[inline]
    fn locked(&self) -> Option<RwLockReadGuard<'_, RawRwLock, ()>> {
        Some(self.collecting.read_recursive())
    }
}
