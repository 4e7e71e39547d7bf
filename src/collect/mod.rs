//! The single-generation cycle collector: `ObjectSpace`, the thread-local
//! default space, and the top-level `collect_cycles` driver that threads
//! the `kernel` passes together with `crate::finalize`'s finalization
//! pipeline (SPEC_FULL.md §4.2, §4.4, §4.5).
use crate::cc::CcDyn;
use crate::debug;
use crate::finalize;
use crate::header::GcHeader;
use crate::ref_count::RefCount;
use crate::ref_count::SingleThreadRefCount;
use crate::Cc;
use crate::Trace;
use std::cell::Cell;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::pin::Pin;

pub(crate) mod kernel;
pub(crate) mod list;

pub use list::Linked;

/// Provides advanced explicit control about where to store [`Cc`] objects.
///
/// An `ObjectSpace` is an alternative place to store `Cc<T>` objects,
/// isolated from the default thread-local space used by `Cc::new`. Objects
/// in a space should not refer to objects in a different space, or the
/// collector may fail to reclaim them.
pub struct ObjectSpace {
    /// Sentinel of the tracked-objects list.
    pub(crate) list: RefCell<Pin<Box<GcHeader>>>,

    /// Set for the duration of `collect_cycles`. `Trace`/`Drop` code that
    /// (incorrectly) tries to reenter the collector on the same thread
    /// hits this guard instead of reentrant-borrowing `list` and panicking
    /// with a less useful message.
    collecting: Cell<bool>,

    /// Objects whose `Finalize`/`LegacyFinalize` ran but could not be
    /// dropped outright because the collector could not prove them dead
    /// (PEP-442 `gc.garbage`-equivalent; see `finalize::publish_garbage`).
    pub(crate) garbage: RefCell<Vec<Box<dyn crate::cc::GcClone>>>,

    /// Marks `ObjectSpace` as `!Send`/`!Sync`, enforcing thread-exclusive
    /// access so methods take `&self` and rely on interior mutability.
    _phantom: PhantomData<Cc<()>>,
}

/// This is a private type.
pub trait AbstractObjectSpace: 'static + Sized {
    type RefCount: RefCount;
    type Header;

    /// Insert `header` (and the vtable of `value`) into the space's list.
    fn insert(&self, header: &mut Self::Header, value: &dyn CcDyn);

    /// Remove from the list.
    fn remove(header: &Self::Header);

    /// Create a `RefCount` object.
    fn new_ref_count(&self, tracked: bool) -> Self::RefCount;

    fn empty_header(&self) -> Self::Header;

    /// Flag `header` as belonging to a type with a legacy (`tp_del`-style)
    /// finalizer, set once at construction time (see `RawCc::new_in_space`).
    fn mark_legacy(&self, header: &mut Self::Header);
}

impl AbstractObjectSpace for ObjectSpace {
    type RefCount = SingleThreadRefCount;
    type Header = GcHeader;

    fn insert(&self, header: &mut Self::Header, value: &dyn CcDyn) {
        let prev: &GcHeader = &self.list.borrow();
        debug_assert!(header.next.get().is_null());
        let next = prev.next.get();
        header.prev.set(prev.deref());
        header.next.set(next);
        // safety: the list is maintained; `next` is valid.
        unsafe { (*next).prev.set(header) };
        // safety: to recover the vtable pointer; see `GcHeader::value`.
        let fat_ptr: [*const (); 2] = unsafe { mem::transmute(value) };
        header.ccdyn_vptr.set(fat_ptr[1]);
        header.set_tracked();
        prev.next.set(header);
    }

    #[inline]
    fn remove(header: &Self::Header) {
        debug_assert!(!header.next.get().is_null());
        debug_assert!(!header.prev.get().is_null());
        list::unlink(header);
    }

    #[inline]
    fn new_ref_count(&self, tracked: bool) -> Self::RefCount {
        SingleThreadRefCount::new(tracked)
    }

    #[inline]
    fn empty_header(&self) -> Self::Header {
        GcHeader::empty()
    }

    #[inline]
    fn mark_legacy(&self, header: &mut Self::Header) {
        header.set_legacy();
    }
}

impl Default for ObjectSpace {
    fn default() -> Self {
        let header = new_gc_list();
        Self {
            list: RefCell::new(header),
            collecting: Cell::new(false),
            garbage: RefCell::new(Vec::new()),
            _phantom: PhantomData,
        }
    }
}

impl ObjectSpace {
    /// Count objects tracked by this space.
    pub fn count_tracked(&self) -> usize {
        let list: &GcHeader = &self.list.borrow();
        list::len(list)
    }

    /// Count objects currently held in `garbage` (finalized but unfreeable).
    pub fn count_garbage(&self) -> usize {
        self.garbage.borrow().len()
    }

    /// Drain every object currently published to `garbage`, handing
    /// ownership to the caller (mirrors CPython's `gc.garbage` being a
    /// plain mutable list the embedder can empty).
    pub(crate) fn take_garbage(&self) -> Vec<Box<dyn crate::cc::GcClone>> {
        std::mem::take(&mut *self.garbage.borrow_mut())
    }

    /// Run one full collection over this space. Returns the number of
    /// objects reclaimed (mirrors CPython's `gc.collect()` return value).
    pub fn collect_cycles(&self) -> usize {
        if self.collecting.replace(true) {
            debug::log(|| ("collect", "reentrant collect_cycles ignored"));
            return 0;
        }
        let result = (|| {
            // Pass A′: free deferred-RC roots whose target already fell to
            // zero (SPEC_FULL.md §4.3) before `retain_all` adds its
            // artificial counts, so a genuinely dead root cannot hide
            // behind them.
            crate::deferred::collect_dead();
            crate::deferred::retain_all();
            let young: &GcHeader = &self.list.borrow();
            kernel::update_refs(young);
            let unreachable = new_gc_list();
            let unreachable_ref: &GcHeader = &unreachable;
            kernel::deduce_unreachable(young, unreachable_ref);
            let dead = new_gc_list();
            let dead_ref: &GcHeader = &dead;
            let collected =
                finalize::finalize_unreachable(young, unreachable_ref, dead_ref, &self.garbage);
            // Every survivor is, by construction, reachable; clear the
            // scratch bits a future collection's `begin_collecting` assert
            // requires to be zero.
            list::visit(young, |header| header.end_collecting());
            collected
        })();
        crate::deferred::release_all();
        self.collecting.set(false);
        result
    }

    /// Constructs a new `Cc<T>` in this space.
    pub fn create<T: Trace>(&self, value: T) -> Cc<T> {
        Cc::new_in_space(value, self)
    }

    /// Leak all objects allocated in this space.
    pub fn leak(&self) {
        *self.list.borrow_mut() = new_gc_list();
    }

    /// Visit every tracked object's header exactly once, in list order.
    /// Used by `gc::get_objects`/`gc::get_referrers`/`gc::get_referents`,
    /// whose Rust signatures trade CPython's ambient-GC-state object list
    /// for an explicit callback over `&dyn CcDyn` (see SPEC_FULL.md §4.7).
    pub(crate) fn for_each_header(&self, mut f: impl FnMut(&GcHeader)) {
        let sentinel: &GcHeader = &self.list.borrow();
        list::visit(sentinel, |header| f(header));
    }
}

impl Drop for ObjectSpace {
    fn drop(&mut self) {
        self.collect_cycles();
    }
}

/// Create an empty linked list with a dummy `GcHeader` sentinel.
pub(crate) fn new_gc_list() -> Pin<Box<GcHeader>> {
    let pinned = Box::pin(GcHeader::empty());
    let header: &GcHeader = pinned.deref();
    list::init(header);
    pinned
}

/// Collect cyclic garbage in the current thread created by `Cc::new`.
/// Return the number of objects collected.
pub fn collect_thread_cycles() -> usize {
    debug::log(|| ("collect", "collect_thread_cycles"));
    THREAD_OBJECT_SPACE.with(|space| space.collect_cycles())
}

/// Count objects tracked by the collector in the current thread.
pub fn count_thread_tracked() -> usize {
    THREAD_OBJECT_SPACE.with(|space| space.count_tracked())
}

thread_local!(pub(crate) static THREAD_OBJECT_SPACE: ObjectSpace = ObjectSpace::default());

/// Acquire a reference to the thread-local default object space.
pub fn with_thread_object_space<R>(handler: impl FnOnce(&ObjectSpace) -> R) -> R {
    THREAD_OBJECT_SPACE.with(handler)
}
