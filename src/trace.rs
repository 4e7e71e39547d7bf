//! The `Trace` capability: the only thing the collector asks of the object
//! model it augments (Design Note: "Cyclic heap graphs ... represent as a
//! capability on each variant").

/// Callback invoked by [`Trace::trace`] once per outgoing reference. The
/// collector supplies the closure; implementations never construct one.
pub type Tracer<'a> = dyn FnMut(*const ()) + 'a;

/// Types that can be stored inside a [`Cc`](crate::Cc)/[`Acc`](crate::sync::Acc)
/// must implement `Trace` so the collector can enumerate their outgoing
/// references without knowing anything else about them.
pub trait Trace {
    /// Call `tracer` once for every `Cc<_>`/`Acc<_>` (or other tracked
    /// handle) this value owns a reference to. The default does nothing,
    /// which is correct for leaf types that hold no tracked references.
    ///
    /// A `trace` that misses an outgoing reference causes the collector to
    /// under-count and can leak a cycle. A `trace` that visits more than it
    /// should (a reference twice, or one it does not own) is detected by
    /// debug assertions in the collector and panics rather than
    /// corrupting memory.
    fn trace(&self, tracer: &mut Tracer) {
        let _ = tracer;
    }

    /// Whether values of this type can participate in reference cycles and
    /// therefore need a [`GcHeader`](crate::header::GcHeader) and tracking
    /// by the collector at all.
    ///
    /// This is an associated function rather than a method: whether `T` is
    /// trackable is a property of the type, not of any particular value, so
    /// it is decided once at `Cc::<T>::new` and never re-queried per value.
    /// It would ideally be an associated `const`, but that is impossible
    /// for a trait used as a trait object (`dyn Trace`); see
    /// https://doc.rust-lang.org/error-index.html#E0038.
    fn is_type_tracked() -> bool
    where
        Self: Sized,
    {
        true
    }

    /// PEP-442-style finalizer: called at most once, before the collector
    /// decides whether an unreachable cycle is actually dead (a finalizer
    /// that stashes `self` somewhere reachable resurrects the whole
    /// cycle). Default is a no-op, which is correct for the overwhelming
    /// majority of types.
    ///
    /// Folded into `Trace` rather than a standalone `Finalize` trait for
    /// the same reason `is_type_tracked` is: `RawCcBox<T, O>`'s `CcDyn`
    /// impl is generic over `T: Trace` alone, and giving finalization its
    /// own trait would need either specialization or a second
    /// vtable-transmute trick (see `CcDummy::ccdyn_vptr`) to type-erase.
    fn finalize(&self) {}

    /// Whether `finalize` does anything other than the default no-op.
    /// Checked once at `Cc::new` to set `GcHeader`'s durable `FINALIZED`-
    /// eligibility bookkeeping; see `header::GcHeader`'s `LEGACY` bit for
    /// the analogous legacy-finalizer flag.
    fn has_finalizer() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// `tp_del`-style legacy finalizer: unlike `finalize`, may be called
    /// more than once is never correct to rely on, and a call does not by
    /// itself prevent the object from being judged garbage -- only a
    /// live reference found by the post-finalization reachability rescan
    /// does. Types should prefer `finalize` over this; it exists for
    /// compatibility with object models that distinguish the two (see
    /// SPEC_FULL.md's `finalize` module notes).
    fn legacy_finalize(&self) {}

    fn has_legacy_finalizer() -> bool
    where
        Self: Sized,
    {
        false
    }
}
