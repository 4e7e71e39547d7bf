//! Finalization pipeline run over the tentatively-unreachable set produced
//! by `collect::kernel::deduce_unreachable` (SPEC_FULL.md §4.5).
//!
//! Order, mirroring `delete_garbage`/`handle_weakrefs`/`handle_legacy_finalizers`
//! in CPython's `cygc.c`:
//!
//! 1. Weak-reference callbacks fire for every member of the unreachable set.
//! 2. `Trace::finalize` runs once per member (invariant 6).
//! 3. The set is re-scanned for resurrection: a finalizer that stashed a
//!    clone somewhere externally reachable shows up as a nonzero refcount
//!    here, same mechanism as the first pass. Resurrected objects and
//!    whatever they keep alive go back to the live set; only genuinely
//!    dead objects continue to step 4.
//! 4. `Trace::legacy_finalize` runs on what's left. Members flagged
//!    `LEGACY` are *not* dropped here -- ordering between two legacy
//!    finalizers in the same cycle can't be made safe in general, so they
//!    are published to `ObjectSpace::garbage` instead, same escape hatch
//!    CPython uses for uncollectable `tp_del` cycles. Everything else is
//!    dropped.
use crate::cc::GcClone;
use crate::collect::kernel;
use crate::collect::list::{self, Linked};
use crate::debug;
use std::cell::RefCell;

/// Run the finalization pipeline over `unreachable`, a list already
/// partitioned out of `young` by `kernel::deduce_unreachable`. `dead` is an
/// empty, caller-owned scratch list (its concrete construction differs
/// between `ObjectSpace`, which needs none, and `sync::AccObjectSpace`,
/// whose header carries a lock handle back to the space it belongs to).
pub(crate) fn finalize_unreachable<L: Linked>(
    young: &L,
    unreachable: &L,
    dead: &L,
    garbage: &RefCell<Vec<Box<dyn GcClone>>>,
) -> usize {
    if list::is_empty(unreachable) {
        return 0;
    }

    clear_weakrefs(unreachable);
    run_finalizers(unreachable);
    rescue_resurrected(young, unreachable, dead);

    let count = list::len(dead);
    debug::log(|| ("collect", format!("{} unreachable objects", count)));

    drop_dead(dead, garbage);
    count
}

/// Step 1: drain and invoke weak-reference callbacks for every member.
fn clear_weakrefs<L: Linked>(unreachable: &L) {
    list::visit(unreachable, |header| {
        header.value().gc_call_weak_callbacks();
    });
}

/// Step 2: run `Trace::finalize` once per member (invariant 6: `FINALIZED`
/// is durable and monotonic, so a second collection finding the same
/// surviving object skips it).
fn run_finalizers<L: Linked>(unreachable: &L) {
    list::visit(unreachable, |header| {
        if !kernel::as_gc_header(header).set_finalized() {
            header.value().gc_finalize();
        }
    });
}

/// Step 3: recompute real refcounts over `unreachable` (a finalizer may
/// have resurrected members by cloning a handle into something outside
/// this collection's view), then re-run the same reachability deduction
/// used for the initial sweep. Anything still standing in `unreachable`
/// afterwards is genuinely dead and moves to `dead`; anything moved back
/// out by `deduce_unreachable` is reachable again and rejoins `young`.
fn rescue_resurrected<L: Linked>(young: &L, unreachable: &L, dead: &L) {
    kernel::update_refs(unreachable);
    kernel::deduce_unreachable(unreachable, dead);
    list::visit(unreachable, |header| {
        debug::log(|| ("collect", "resurrected"));
        list::move_to(header, young);
        kernel::as_gc_header(header).end_collecting();
    });
}

/// Step 4: legacy-finalize, then either publish to `garbage` (types with a
/// `LegacyFinalize` impl, whose drop order this collector cannot
/// guarantee) or actually drop (everything else).
fn drop_dead<L: Linked>(dead: &L, garbage: &RefCell<Vec<Box<dyn GcClone>>>) {
    list::visit(dead, |header| header.value().gc_legacy_finalize());

    let mut to_drop: Vec<Box<dyn GcClone>> = Vec::with_capacity(list::len(dead));
    list::visit(dead, |header| {
        let handle = header.value().gc_clone();
        if kernel::as_gc_header(header).is_legacy() {
            garbage.borrow_mut().push(handle);
        } else {
            to_drop.push(handle);
        }
    });

    #[cfg(feature = "debug")]
    {
        crate::debug::GC_DROPPING.with(|d| d.set(true));
    }

    for value in to_drop.iter() {
        value.gc_drop_t();
    }
    for value in to_drop.iter() {
        let ref_count = value.gc_ref_count();
        assert_eq!(
            ref_count, 1,
            concat!(
                "bug: unexpected ref-count after dropping cycles\n",
                "This usually indicates a buggy Trace or Drop implementation."
            )
        );
    }

    #[cfg(feature = "debug")]
    {
        crate::debug::GC_DROPPING.with(|d| d.set(false));
    }
}
