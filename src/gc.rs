//! Policy and external interfaces (SPEC_FULL.md §4.7, §6): a thin,
//! script-surface-shaped wrapper over collector state, deliberately named
//! and shaped after CPython's `gc` module.
use crate::collect;
use crate::header::GcHeader;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Once;

/// Failure modes `gc`'s functions can report. Hand-written rather than via
/// `thiserror`: the teacher's own `Cargo.toml` carries no such dependency,
/// and the collector itself has exactly one fallible argument-validation
/// path, not enough to justify pulling one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcError {
    /// `collect()`/`set_threshold()` was asked about a generation outside
    /// `[0, 3)`.
    InvalidGeneration(usize),
}

impl fmt::Display for GcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcError::InvalidGeneration(n) => {
                write!(f, "invalid generation {} (must be 0, 1, or 2)", n)
            }
        }
    }
}

impl std::error::Error for GcError {}

/// Hand-rolled bitflags, matching CPython's `gc.DEBUG_*` constants. Built
/// by hand rather than via the `bitflags` crate for the same reason
/// `GcError` skips `thiserror`: the teacher stack doesn't carry it, and a
/// newtype over `u32` with associated consts is the idiom this pack's
/// config-flag code (e.g. the `octofhir-otter` example) already uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugFlags(pub u32);

impl DebugFlags {
    /// Print per-collection statistics.
    pub const STATS: DebugFlags = DebugFlags(1);
    /// Print collectable objects found.
    pub const COLLECTABLE: DebugFlags = DebugFlags(2);
    /// Print uncollectable objects found (those that end up in `garbage`).
    pub const UNCOLLECTABLE: DebugFlags = DebugFlags(4);
    /// Save all unreachable objects in `garbage`, even ones the collector
    /// could otherwise free outright.
    pub const SAVEALL: DebugFlags = DebugFlags(32);
    /// `COLLECTABLE | UNCOLLECTABLE | SAVEALL`.
    pub const LEAK: DebugFlags = DebugFlags(2 | 4 | 32);
    /// No flags set.
    pub const NONE: DebugFlags = DebugFlags(0);

    /// Whether every bit of `other` is also set in `self`.
    pub fn contains(self, other: DebugFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DebugFlags {
    type Output = DebugFlags;
    fn bitor(self, rhs: DebugFlags) -> DebugFlags {
        DebugFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for DebugFlags {
    type Output = DebugFlags;
    fn bitand(self, rhs: DebugFlags) -> DebugFlags {
        DebugFlags(self.0 & rhs.0)
    }
}

/// Per-generation bookkeeping, one slot per (nominal) generation; the
/// single-generation engine behind it updates all three identically.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationStats {
    /// Number of times `collect()` targeted this generation.
    pub collections: usize,
    /// Total objects freed across those collections.
    pub collected: usize,
    /// Total objects that ended up published to `garbage` instead.
    pub uncollectable: usize,
}

/// `(threshold0, threshold1, threshold2)`, read back by `get_threshold()`.
/// Stored for API compatibility; only `threshold0` (via [`should_collect`])
/// gates the single-generation engine this crate actually runs.
#[derive(Debug, Clone, Copy)]
pub struct Threshold(pub usize, pub usize, pub usize);

impl Default for Threshold {
    fn default() -> Self {
        Threshold(700, 10, 10)
    }
}

/// Point in a collection a [`Callback`] is invoked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// About to run `ObjectSpace::collect_cycles`.
    Start,
    /// `ObjectSpace::collect_cycles` just returned.
    Stop,
}

/// Passed to every registered [`Callback`] around a collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectInfo {
    /// Generation requested (always report-compatible with `[0, 3)`; the
    /// engine itself does not distinguish generations).
    pub generation: usize,
    /// Objects collected so far this phase (`0` at `Phase::Start`).
    pub collected: usize,
    /// Objects currently sitting in `garbage`.
    pub uncollectable: usize,
}

/// A per-phase collection hook, mirroring `gc.callbacks`.
pub type Callback = Box<dyn Fn(Phase, &CollectInfo)>;

/// Registerable, mutable list of [`Callback`]s, returned by [`callbacks`].
#[derive(Default)]
pub struct CallbackList(RefCell<Vec<Callback>>);

impl CallbackList {
    /// Register `callback` to run around every future collection on this
    /// thread.
    pub fn register(&self, callback: Callback) {
        self.0.borrow_mut().push(callback);
    }

    /// Remove every registered callback.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn fire(&self, phase: Phase, info: &CollectInfo) {
        for callback in self.0.borrow().iter() {
            callback(phase, info);
        }
    }
}

struct State {
    enabled: Cell<bool>,
    debug: Cell<DebugFlags>,
    threshold: Cell<Threshold>,
    stats: RefCell<[GenerationStats; 3]>,
    shutting_down: Cell<bool>,
    callbacks: CallbackList,
}

impl Default for State {
    fn default() -> Self {
        State {
            enabled: Cell::new(true),
            debug: Cell::new(DebugFlags::NONE),
            threshold: Cell::new(Threshold::default()),
            stats: RefCell::new([GenerationStats::default(); 3]),
            shutting_down: Cell::new(false),
            callbacks: CallbackList::default(),
        }
    }
}

thread_local! {
    static STATE: State = State::default();
}

static GROWTH_SCALE_INIT: Once = Once::new();
static GROWTH_SCALE: AtomicUsize = AtomicUsize::new(100);

/// `GCMODULE_GROWTH_SCALE` environment variable, an integer percent by
/// which `threshold()` grows the live count after each collection,
/// defaulting to 100 and read exactly once (no `once_cell` dependency in
/// the teacher stack, so `std::sync::Once` stands in, same idiom the
/// `octofhir-otter` example repo uses for lazy global config).
fn growth_scale() -> usize {
    GROWTH_SCALE_INIT.call_once(|| {
        if let Ok(value) = std::env::var("GCMODULE_GROWTH_SCALE") {
            if let Ok(scale) = value.parse::<usize>() {
                GROWTH_SCALE.store(scale, Ordering::Relaxed);
            }
        }
    });
    GROWTH_SCALE.load(Ordering::Relaxed)
}

const THRESHOLD_FLOOR: usize = 700;

/// Enable automatic collection (the default state).
pub fn enable() {
    STATE.with(|s| s.enabled.set(true));
}

/// Disable automatic collection. `collect()` called directly still runs.
pub fn disable() {
    STATE.with(|s| s.enabled.set(false));
}

/// Whether automatic collection is currently enabled.
pub fn is_enabled() -> bool {
    STATE.with(|s| s.enabled.get())
}

/// Whether the live count exceeds the current threshold, i.e. whether an
/// automatic collection should run now. `threshold()` itself is
/// recomputed after every `collect()` call; see [`collect`].
pub fn should_collect() -> bool {
    is_enabled() && collect::count_thread_tracked() >= STATE.with(|s| s.threshold.get().0)
}

/// Force a collection of the current thread's default `ObjectSpace`,
/// returning the number of objects reclaimed. `generation` is validated
/// (must be `< 3`) but otherwise ignored: every collection walks the
/// entire tracked set, there being only one generation in this engine.
pub fn collect(generation: usize) -> Result<usize, GcError> {
    if generation >= 3 {
        return Err(GcError::InvalidGeneration(generation));
    }
    let info_before = CollectInfo {
        generation,
        collected: 0,
        uncollectable: collect::with_thread_object_space(|space| space.count_garbage()),
    };
    STATE.with(|s| {
        if !s.shutting_down.get() {
            s.callbacks.fire(Phase::Start, &info_before);
        }
    });
    let collected = collect::collect_thread_cycles();
    let uncollectable = collect::with_thread_object_space(|space| space.count_garbage());
    STATE.with(|s| {
        {
            let mut stats = s.stats.borrow_mut();
            let slot = &mut stats[generation];
            slot.collections += 1;
            slot.collected += collected;
            slot.uncollectable = uncollectable;
        }
        let live = collect::count_thread_tracked();
        let scale = growth_scale();
        let new_t0 = std::cmp::max(THRESHOLD_FLOOR, live + live * scale / 100);
        let old = s.threshold.get();
        s.threshold.set(Threshold(new_t0, old.1, old.2));
        if !s.shutting_down.get() {
            let info_after = CollectInfo {
                generation,
                collected,
                uncollectable,
            };
            s.callbacks.fire(Phase::Stop, &info_after);
        }
    });
    Ok(collected)
}

/// Set the diagnostic flags future collections report under.
pub fn set_debug(flags: DebugFlags) {
    STATE.with(|s| s.debug.set(flags));
}

/// Get the currently active diagnostic flags.
pub fn get_debug() -> DebugFlags {
    STATE.with(|s| s.debug.get())
}

/// Set `(threshold0, threshold1, threshold2)`. Only `threshold0` gates
/// [`should_collect`]; the others are stored for API compatibility.
pub fn set_threshold(t0: usize, t1: usize, t2: usize) {
    STATE.with(|s| s.threshold.set(Threshold(t0, t1, t2)));
}

/// Get `(threshold0, threshold1, threshold2)`.
pub fn get_threshold() -> (usize, usize, usize) {
    STATE.with(|s| {
        let t = s.threshold.get();
        (t.0, t.1, t.2)
    })
}

/// `(live, 0, 0)`: the live tracked count, with the two always-zero
/// younger-generation slots CPython's `gc.get_count()` also reports.
pub fn get_count() -> (usize, usize, usize) {
    (collect::count_thread_tracked(), 0, 0)
}

/// One [`GenerationStats`] per (nominal) generation.
pub fn get_stats() -> Vec<GenerationStats> {
    STATE.with(|s| s.stats.borrow().to_vec())
}

/// An opaque handle to a tracked object, returned by [`get_objects`],
/// [`get_referrers`], and [`get_referents`]. Holds a real strong reference
/// (like a `Cc<T>` clone would), without exposing `T`: CPython's
/// `gc.get_objects()` returns live Python objects directly, which has no
/// sound equivalent in a statically-typed `dyn Trace` without either
/// leaking `T` or requiring every tracked type to also implement `Any`;
/// this type is the adaptation to Rust idioms SPEC_FULL.md's external
/// interfaces section anticipates.
pub struct TrackedObject(Box<dyn crate::cc::GcClone>);

impl TrackedObject {
    /// Strong reference count, including the one this handle itself holds.
    pub fn ref_count(&self) -> usize {
        self.0.gc_ref_count()
    }

    /// Whether this object is tracked by the collector (has a `GcHeader`).
    /// Always `true` for a `TrackedObject` obtained from [`get_objects`];
    /// kept as a method (rather than assumed) because [`get_referents`]
    /// can surface an untracked child reached from a tracked parent.
    pub fn is_tracked(&self) -> bool {
        self.0.gc_header_ptr().is_some()
    }

    /// Whether this object's finalizer has already run. `false` for an
    /// untracked object (it has no `GcHeader` to carry the bit).
    pub fn is_finalized(&self) -> bool {
        match self.0.gc_header_ptr() {
            Some(ptr) => header_at(ptr).is_finalized(),
            None => false,
        }
    }

    fn header_ptr(&self) -> Option<*const ()> {
        self.0.gc_header_ptr()
    }
}

impl fmt::Debug for TrackedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedObject")
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

fn header_at(ptr: *const ()) -> &'static GcHeader {
    // safety: every pointer returned by `GcClone::gc_header_ptr` comes
    // from `RawCcBox::header_ptr`, which points at a live `GcHeader` for
    // as long as the `TrackedObject` holding the reference is alive.
    unsafe { &*(ptr as *const GcHeader) }
}

/// Snapshot every object currently tracked by the thread's default space.
/// `generation` is accepted for API compatibility and otherwise ignored,
/// same as [`collect`]. The returned `Vec` itself is not tracked, so it
/// never inflates the count it reports.
pub fn get_objects(_generation: Option<usize>) -> Vec<TrackedObject> {
    let mut out = Vec::new();
    collect::with_thread_object_space(|space| {
        space.for_each_header(|header: &GcHeader| {
            out.push(TrackedObject(header.value().gc_clone()));
        });
    });
    out
}

/// Every tracked object whose `Trace::trace` visits any of `targets`.
pub fn get_referrers(targets: &[&TrackedObject]) -> Vec<TrackedObject> {
    let target_ptrs: Vec<*const ()> = targets.iter().filter_map(|t| t.header_ptr()).collect();
    let mut out = Vec::new();
    collect::with_thread_object_space(|space| {
        space.for_each_header(|header: &GcHeader| {
            let mut found = false;
            let mut tracer = |ptr: *const ()| {
                if target_ptrs.contains(&ptr) {
                    found = true;
                }
            };
            header.value().gc_traverse(&mut tracer);
            if found {
                out.push(TrackedObject(header.value().gc_clone()));
            }
        });
    });
    out
}

/// Every object directly referred to by any of `targets`.
pub fn get_referents(targets: &[&TrackedObject]) -> Vec<TrackedObject> {
    let mut out = Vec::new();
    for target in targets {
        let mut tracer = |ptr: *const ()| {
            out.push(TrackedObject(header_at(ptr).value().gc_clone()));
        };
        target.0.gc_traverse(&mut tracer);
    }
    out
}

/// Whether `obj` is tracked by the collector (has a `GcHeader`).
pub fn is_tracked(obj: &TrackedObject) -> bool {
    obj.is_tracked()
}

/// Whether `obj`'s finalizer has already run.
pub fn is_finalized(obj: &TrackedObject) -> bool {
    obj.is_finalized()
}

/// No-op: this engine has no generation to freeze out of automatic
/// collection. Present for API compatibility with callers porting from a
/// generational collector.
pub fn freeze() {}

/// No-op counterpart to [`freeze`].
pub fn unfreeze() {}

/// Always `0`: see [`freeze`].
pub fn get_freeze_count() -> usize {
    0
}

/// Objects whose `LegacyFinalize` ran but could not be safely dropped
/// (ordering between two legacy finalizers in the same cycle cannot be
/// guaranteed); mutable and user-visible, mirroring `gc.garbage`. Draining
/// empties the underlying `ObjectSpace::garbage` list, same as assigning
/// `gc.garbage = []` would in CPython.
pub fn garbage() -> Vec<TrackedObject> {
    collect::with_thread_object_space(|space| {
        space.take_garbage().into_iter().map(TrackedObject).collect()
    })
}

/// The thread's registerable list of per-phase collection hooks.
pub fn callbacks() -> &'static CallbackList {
    thread_local! {
        static LEAKED: &'static CallbackList = {
            let boxed: Box<CallbackList> = Box::new(CallbackList::default());
            Box::leak(boxed)
        };
    }
    LEAKED.with(|r| *r)
}

/// Enter shutdown mode: subsequent [`report_unraisable`] calls are
/// silently dropped instead of logged, matching CPython's interpreter
/// teardown behavior where reporting machinery itself may no longer be
/// available.
pub fn begin_shutdown() {
    STATE.with(|s| s.shutting_down.set(true));
}

/// Report a panic caught while running a finalizer, weakref callback, or
/// collection hook, mirroring CPython's "unraisable exception" channel.
/// Logged through `tracing` unless [`begin_shutdown`] has already run.
pub fn report_unraisable(context: &str, payload: &(dyn std::any::Any + Send)) {
    if STATE.with(|s| s.shutting_down.get()) {
        return;
    }
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(context, message, "unraisable exception during collection");
}
