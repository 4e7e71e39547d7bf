//! The cycle kernel: `update_refs`, `subtract_refs`, `move_unreachable`,
//! and the `deduce_unreachable` composition of the latter two
//! (SPEC_FULL.md §4.4). Generic over `Linked` so the same code runs for
//! `ObjectSpace` and, with the `sync` feature, `sync::AccObjectSpace`.
//!
//! The algorithm is untouched from `cygc::collect` (itself a port of
//! CPython 3.8's `cygc.c`); what differs is where the scratch refcount
//! lives. CPython, and the teacher crate following it, steal bits out of
//! the list `prev` pointer for `gc_refs` because that pointer is otherwise
//! unused while a "young" list is only ever walked forward. This crate
//! keeps `prev` valid throughout (see `header::GcHeader`'s dedicated
//! `flags` word) and does not need an equivalent `restore_prev` step.
use super::list::{self, Linked};
use crate::header::GcHeader;

/// Pass A: copy every tracked object's effective refcount into its header
/// scratch field and thread it into `young`.
pub(crate) fn update_refs<L: Linked>(young: &L) {
    list::visit(young, |header| {
        let header = as_gc_header(header);
        let refs = header.value().gc_ref_count();
        // A refcount can observe 0 transiently in a multi-threaded context
        // (another thread's drop is mid-flight, blocked on this space's
        // lock). Such objects are not marked COLLECTING and fall out of
        // the kernel entirely; the in-flight drop will free them directly.
        if refs > 0 {
            header.begin_collecting(refs);
        }
    });
}

/// Pass B: walk each object in `young`, decrementing the `gc_refs` of every
/// tracked child it visits. Self-loops are safe (decrement, not zero).
pub(crate) fn subtract_refs<L: Linked>(young: &L) {
    let mut tracer = move |ptr: *const ()| {
        // safety: the tracer is only ever handed pointers produced by
        // `RawCcBox::trace_t`, which always point at a `GcHeader`.
        let header = unsafe { &*(ptr as *const GcHeader) };
        if header.is_collecting() {
            debug_assert!(
                !header.is_unreachable(),
                "bug: object became unreachable while subtracting refs (is Trace impl correct?)"
            );
            header.edit_gc_refs(-1);
        }
    };
    list::visit(young, |header| {
        let gc_header = as_gc_header(header);
        debug_assert!(!gc_header.is_visited(), "bug: double visit (is Trace impl correct?)");
        gc_header.set_visited();
        gc_header.value().gc_traverse(&mut tracer);
    });
}

/// Pass C: partition `young` into objects proven reachable (left of the
/// scan cursor, implicitly) and tentatively unreachable (moved to
/// `unreachable`), per the distilled spec's left-to-right algorithm.
pub(crate) fn move_unreachable<L: Linked>(young: &L, unreachable: &L) {
    fn revive(ptr: *const (), unreachable: *const ()) {
        // safety: see `subtract_refs`.
        let header = unsafe { &*(ptr as *const GcHeader) };
        let unreachable = unsafe { &*(unreachable as *const GcHeader) };
        if header.is_unreachable() {
            list::move_to(header, unreachable_as::<GcHeader>(unreachable));
            header.clear_unreachable();
            header.edit_gc_refs(1);
        } else if header.is_collecting() && header.gc_refs() == 0 {
            header.edit_gc_refs(1);
        }
    }
    // A second pass re-traverses objects promoted back from `unreachable`
    // so that their own children are also re-proven reachable. We cannot
    // recurse through `Trace::trace` a second time for an object already
    // visited in this scan without double-decrementing, so promoted
    // objects are simply appended to `young`'s remaining tail and picked
    // up by the ongoing `visit` below (see `cygc::move_unreachable`,
    // whose `visit_reachable` does exactly this).
    let young_ptr = young as *const L as *const ();
    let _ = young_ptr;
    let mut ptr = young.next();
    while ptr as *const _ != young as *const L as *const _ {
        let header: &L = unsafe { &*ptr };
        let next = header.next();
        let gc_header = as_gc_header(header);
        if gc_header.gc_refs() > 0 {
            let mut tracer = |child: *const ()| {
                revive(child, unreachable as *const L as *const ());
            };
            gc_header.value().gc_traverse(&mut tracer);
            ptr = next;
        } else {
            list::move_to(header, unreachable);
            gc_header.mark_unreachable();
            ptr = next;
        }
    }
}

/// `update_refs` + `subtract_refs` + `move_unreachable` composed: used
/// both for the initial sweep and for the post-finalization resurrection
/// check (§4.5 Step 4), which is exactly this composition re-run over
/// whatever survived `Finalize::finalize`.
pub(crate) fn deduce_unreachable<L: Linked>(young: &L, unreachable: &L) {
    subtract_refs(young);
    move_unreachable(young, unreachable);
}

/// Reinterpret any `Linked` header as the `GcHeader`-shaped prefix every
/// implementor carries, to reach the flag-word operations that live on
/// `GcHeader` itself rather than the `Linked` trait. Shared with
/// `finalize`, whose finalization pipeline runs the same flag bookkeeping
/// over `sync::AccHeader` lists as it does over `GcHeader` ones.
#[inline]
pub(crate) fn as_gc_header<L: Linked>(header: &L) -> &GcHeader {
    // safety: every `Linked` implementor in this crate is `#[repr(C)]` with
    // a `GcHeader`-shaped prefix (see `header.rs`, `sync::collect::AccHeader`).
    unsafe { &*(header as *const L as *const GcHeader) }
}

#[inline]
fn unreachable_as<L: Linked>(header: &GcHeader) -> &L {
    unsafe { &*(header as *const GcHeader as *const L) }
}
