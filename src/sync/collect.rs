//! `AccObjectSpace`: the multi-threaded counterpart of
//! `collect::ObjectSpace`, trading the default space's `RefCell`-guarded
//! single list for a space-wide re-entrant mutex that doubles as the
//! stop-the-world barrier described in SPEC_FULL.md §4.6/§5.
//!
//! The mutex is re-entrant rather than a plain `parking_lot::Mutex`
//! because a finalizer or `Drop` impl running inside `collect_cycles`
//! (itself holding the lock) is free to allocate new `Acc<T>`s in the
//! same space; `AccObjectSpace::insert`/`remove` take the identical lock,
//! and a plain mutex would deadlock the collecting thread against itself.
//! Other threads calling `insert`/`remove`/`collect_cycles` concurrently
//! still block on it exactly as a non-reentrant mutex would.
use super::ref_count::ThreadedRefCount;
use super::Acc;
use crate::cc::{CcDummy, CcDyn, GcClone};
use crate::collect::kernel;
use crate::collect::list::{self, Linked};
use crate::collect::AbstractObjectSpace;
use crate::finalize;
use crate::Trace;
use parking_lot::ReentrantMutex;
use parking_lot::RwLock;
use std::cell::Cell;
use std::cell::RefCell;
use std::mem;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;

/// Header prefix-compatible with [`crate::header::GcHeader`] (same field
/// order and types for `next`/`prev`/`flags`/`ccdyn_vptr`), so
/// `collect::kernel::as_gc_header` can reinterpret an `&AccHeader` as an
/// `&GcHeader` and reuse every bit-packed flag accessor
/// (`TRACKED`/`FINALIZED`/`UNREACHABLE`/.../`gc_refs`) without
/// duplicating that logic for the threaded case.
#[repr(C)]
pub struct AccHeader {
    next: Cell<*const AccHeader>,
    prev: Cell<*const AccHeader>,
    flags: Cell<usize>,
    ccdyn_vptr: Cell<*const ()>,

    /// Shared with every other header in the same space; also the space's
    /// stop-the-world lock (see module docs).
    lock: Arc<ReentrantMutex<()>>,
}

impl AccHeader {
    fn empty(lock: Arc<ReentrantMutex<()>>) -> Self {
        Self {
            next: Cell::new(std::ptr::null()),
            prev: Cell::new(std::ptr::null()),
            flags: Cell::new(0),
            ccdyn_vptr: Cell::new(CcDummy::ccdyn_vptr()),
            lock,
        }
    }
}

impl Linked for AccHeader {
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
    fn value(&self) -> &dyn CcDyn {
        // safety: see `header::GcHeader::value`; `ccdyn_vptr` was set from
        // a real `&dyn CcDyn` fat pointer whose data half is always
        // exactly one `AccHeader` past `self`.
        unsafe {
            let fat_ptr: (*const (), *const ()) =
                ((self as *const Self).offset(1) as _, self.ccdyn_vptr.get());
            mem::transmute(fat_ptr)
        }
    }
}

/// Multi-threaded [`AbstractObjectSpace`]: the storage [`Acc<T>`] uses.
///
/// Unlike `collect::ObjectSpace`, this space may be shared (via `Arc`)
/// across threads; `Acc::new_in_space`/`drop`/`collect_cycles` may all run
/// concurrently from different threads and serialize through `list.lock`.
pub struct AccObjectSpace {
    /// Sentinel of the tracked-objects list; its `lock` field is the
    /// space-wide re-entrant mutex every header created in this space
    /// clones a handle to.
    list: Pin<Box<AccHeader>>,

    /// Shared by every `ThreadedRefCount` created in this space; read-
    /// locked by ordinary refcount operations via `RefCount::locked`
    /// while a `Cc`/`Weak` handle is being read or dropped (see
    /// `cc::RawCc::drop`/`RawWeak::upgrade`).
    collecting_lock: Arc<RwLock<()>>,

    /// Objects whose `LegacyFinalize` ran but could not be dropped
    /// outright; only ever touched while `list.lock` is held.
    garbage: RefCell<Vec<Box<dyn GcClone>>>,

    /// Logical reentrancy guard: a finalizer that calls `collect_cycles`
    /// again on the same thread (the re-entrant mutex alone would allow
    /// the nested call through) gets 0 back instead of re-running the
    /// algorithm over a heap already mid-collection (SPEC_FULL.md §4.6).
    collecting: Cell<bool>,
}

// safety: every field is only mutated while `list.lock` (or, for
// `collecting_lock`, its own lock) is held; see the field docs.
unsafe impl Send for AccObjectSpace {}
unsafe impl Sync for AccObjectSpace {}

impl AbstractObjectSpace for AccObjectSpace {
    type RefCount = ThreadedRefCount;
    type Header = AccHeader;

    fn insert(&self, header: &mut Self::Header, value: &dyn CcDyn) {
        let _locked = self.list.lock.lock();
        let prev: &AccHeader = &self.list;
        debug_assert!(header.next.get().is_null());
        let next = prev.next.get();
        header.prev.set(prev.deref());
        header.next.set(next);
        // safety: the list is maintained; `next` is valid.
        unsafe { (*next).prev.set(header) };
        // safety: to recover the vtable pointer; see `AccHeader::value`.
        let fat_ptr: [*const (); 2] = unsafe { mem::transmute(value) };
        header.ccdyn_vptr.set(fat_ptr[1]);
        kernel::as_gc_header(header).set_tracked();
        prev.next.set(header);
    }

    #[inline]
    fn remove(header: &Self::Header) {
        let _locked = header.lock.lock();
        list::unlink(header);
    }

    #[inline]
    fn new_ref_count(&self, tracked: bool) -> Self::RefCount {
        ThreadedRefCount::new(tracked, self.collecting_lock.clone())
    }

    #[inline]
    fn empty_header(&self) -> Self::Header {
        AccHeader::empty(self.list.lock.clone())
    }

    #[inline]
    fn mark_legacy(&self, header: &mut Self::Header) {
        kernel::as_gc_header(header).set_legacy();
    }
}

impl Default for AccObjectSpace {
    fn default() -> Self {
        let lock = Arc::new(ReentrantMutex::new(()));
        let list = new_acc_list(lock);
        Self {
            list,
            collecting_lock: Arc::new(RwLock::new(())),
            garbage: RefCell::new(Vec::new()),
            collecting: Cell::new(false),
        }
    }
}

impl AccObjectSpace {
    /// Count objects tracked by this space. Takes the space lock so a
    /// concurrent `collect_cycles` cannot observe a half-linked list.
    pub fn count_tracked(&self) -> usize {
        let _locked = self.list.lock.lock();
        let list: &AccHeader = &self.list;
        list::len(list)
    }

    /// Count objects currently held in `garbage`.
    pub fn count_garbage(&self) -> usize {
        let _locked = self.list.lock.lock();
        self.garbage.borrow().len()
    }

    /// Run one full collection over this space, blocking every other
    /// thread's `insert`/`remove`/`collect_cycles` on the same space for
    /// the duration (the stop-the-world barrier of SPEC_FULL.md §4.6,
    /// modeled here as mutual exclusion rather than cooperative
    /// suspension). Returns the number of objects reclaimed.
    pub fn collect_cycles(&self) -> usize {
        let _locked = self.list.lock.lock();
        if self.collecting.replace(true) {
            // A finalizer running inside this very collection tried to
            // collect again; the re-entrant mutex would let it through,
            // but re-running the algorithm over a heap mid-collection
            // would corrupt the scratch bits. Report nothing collected,
            // matching the single-threaded space's reentrancy guard.
            self.collecting.set(true);
            return 0;
        }
        let result = (|| {
            let young: &AccHeader = &self.list;
            kernel::update_refs(young);
            let unreachable = new_acc_list(self.list.lock.clone());
            let unreachable_ref: &AccHeader = &unreachable;
            kernel::deduce_unreachable(young, unreachable_ref);
            let dead = new_acc_list(self.list.lock.clone());
            let dead_ref: &AccHeader = &dead;
            let collected =
                finalize::finalize_unreachable(young, unreachable_ref, dead_ref, &self.garbage);
            list::visit(young, |header| kernel::as_gc_header(header).end_collecting());
            collected
        })();
        self.collecting.set(false);
        result
    }

    /// Constructs a new `Acc<T>` in this space.
    pub fn create<T: Trace>(&self, value: T) -> Acc<T> {
        Acc::new_in_space(value, self)
    }
}

/// Create an empty linked list with a dummy `AccHeader` sentinel, sharing
/// `lock` with whatever space it scopes a working list for.
fn new_acc_list(lock: Arc<ReentrantMutex<()>>) -> Pin<Box<AccHeader>> {
    let pinned = Box::pin(AccHeader::empty(lock));
    let header: &AccHeader = pinned.deref();
    list::init(header);
    pinned
}
