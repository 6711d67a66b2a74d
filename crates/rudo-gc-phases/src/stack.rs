//! The phase nesting primitive.
//!
//! # Current Phase
//!
//! [`PhaseState`] holds one atomic byte naming the innermost open phase. It
//! has a single writer, the coordinating thread bound with
//! [`PhaseState::bind_coordinator`], and any number of readers: worker
//! threads tag their trace events with whatever phase is current while they
//! run.
//!
//! # Nesting
//!
//! A [`PhaseStack`] frame remembers the phase that was current when it was
//! opened and restores it when dropped. Frames are values owned by the
//! guards built on them, so Rust's drop order makes the implicit stack
//! strictly LIFO, unwinding included:
//!
//! ```ignore
//! let _binding = inst.phase_state().bind_coordinator();
//! {
//!     let _outer = PhaseStack::new(&inst, Phase::FinalMark, false);
//!     {
//!         let _inner = PhaseStack::new(&inst, Phase::FinishMark, false);
//!         assert_eq!(inst.phase_state().current(), Some(Phase::FinishMark));
//!     }
//!     assert_eq!(inst.phase_state().current(), Some(Phase::FinalMark));
//! }
//! assert!(!inst.phase_state().is_active());
//! ```

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

use crate::instrumentation::Instrumentation;
use crate::phase::{Phase, INVALID_PHASE};

/// Token value meaning "no thread".
const NO_THREAD: u64 = 0;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique token of the calling thread.
fn thread_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

/// Stable identifier for a GC cycle.
///
/// Assigned by the cycle session, starting at 1. `GcId(0)` means no cycle
/// has started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GcId(pub u64);

/// The cycle-wide current phase and the thread allowed to change it.
#[derive(Debug)]
pub struct PhaseState {
    current: AtomicU8,
    coordinator: AtomicU64,
    gc_id: AtomicU64,
    in_cycle: AtomicBool,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseState {
    /// No phase active, no coordinator bound.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: AtomicU8::new(INVALID_PHASE),
            coordinator: AtomicU64::new(NO_THREAD),
            gc_id: AtomicU64::new(0),
            in_cycle: AtomicBool::new(false),
        }
    }

    /// Raw value of the current phase; `INVALID_PHASE` when none is open.
    #[inline]
    #[must_use]
    pub fn current_raw(&self) -> u8 {
        self.current.load(Ordering::Acquire)
    }

    /// The innermost open phase.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<Phase> {
        Phase::from_raw(self.current_raw())
    }

    /// Whether any phase guard is open.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current_raw() < INVALID_PHASE
    }

    /// Make the calling thread the coordinating thread.
    ///
    /// The binding lasts until the returned guard is dropped.
    ///
    /// # Panics
    ///
    /// Panics if another thread is already bound.
    #[must_use = "the coordinator is unbound as soon as the binding is dropped"]
    pub fn bind_coordinator(&self) -> CoordinatorBinding<'_> {
        let me = thread_token();
        let bound = self
            .coordinator
            .compare_exchange(NO_THREAD, me, Ordering::AcqRel, Ordering::Acquire);
        assert!(
            bound.is_ok(),
            "a coordinating thread is already bound to this phase state"
        );
        CoordinatorBinding {
            state: self,
            _not_send: PhantomData,
        }
    }

    /// Whether the calling thread is the bound coordinating thread.
    #[inline]
    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.coordinator.load(Ordering::Acquire) == thread_token()
    }

    /// Id of the most recently started cycle.
    #[inline]
    #[must_use]
    pub fn current_gc_id(&self) -> GcId {
        GcId(self.gc_id.load(Ordering::Acquire))
    }

    /// Whether a cycle session is open.
    #[inline]
    #[must_use]
    pub fn in_cycle(&self) -> bool {
        self.in_cycle.load(Ordering::Acquire)
    }

    /// Mark a cycle as open; `None` if one already is.
    #[allow(clippy::unnecessary_lazy_evaluations)]
    pub(crate) fn enter_cycle(&self) -> Option<CycleEntry<'_>> {
        let was_open = self.in_cycle.swap(true, Ordering::AcqRel);
        // Built lazily: a dropped entry clears the flag.
        (!was_open).then(|| CycleEntry { state: self })
    }

    pub(crate) fn next_gc_id(&self) -> GcId {
        GcId(self.gc_id.fetch_add(1, Ordering::AcqRel) + 1)
    }

    fn push(&self, phase: Phase) -> u8 {
        self.current.swap(phase.as_raw(), Ordering::AcqRel)
    }

    fn pop(&self, parent: u8) {
        self.current.store(parent, Ordering::Release);
    }
}

/// Keeps the calling thread bound as coordinator; see
/// [`PhaseState::bind_coordinator`].
#[derive(Debug)]
pub struct CoordinatorBinding<'a> {
    state: &'a PhaseState,
    // The binding names a thread, so it must be dropped on that thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for CoordinatorBinding<'_> {
    fn drop(&mut self) {
        self.state.coordinator.store(NO_THREAD, Ordering::Release);
    }
}

/// Keeps a cycle marked open until dropped, including when the cycle
/// session that owns it fails halfway through construction.
#[derive(Debug)]
pub(crate) struct CycleEntry<'a> {
    state: &'a PhaseState,
}

impl Drop for CycleEntry<'_> {
    fn drop(&mut self) {
        self.state.in_cycle.store(false, Ordering::Release);
    }
}

/// One frame of the implicit phase stack.
///
/// Opening a frame makes `phase` current; dropping it records the elapsed
/// time with the aggregator and restores the parent phase.
#[derive(Debug)]
#[must_use = "the phase closes as soon as the frame is dropped"]
pub struct PhaseStack<'a> {
    inst: &'a Instrumentation,
    phase: Phase,
    parent: u8,
    start: Instant,
    aggregate: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> PhaseStack<'a> {
    /// Open `phase` on the coordinating thread.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is not the bound coordinator.
    pub fn new(inst: &'a Instrumentation, phase: Phase, aggregate: bool) -> Self {
        let state = inst.phase_state();
        assert!(
            state.is_coordinator(),
            "phase {phase} must be opened by the coordinating thread"
        );
        let parent = state.push(phase);
        Self {
            inst,
            phase,
            parent,
            start: Instant::now(),
            aggregate,
            _not_send: PhantomData,
        }
    }

    /// The phase this frame opened.
    #[inline]
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The phase that was current before this frame, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Phase> {
        Phase::from_raw(self.parent)
    }

    pub(crate) const fn instrumentation(&self) -> &'a Instrumentation {
        self.inst
    }
}

impl Drop for PhaseStack<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.inst.phase_state().pop(self.parent);
        self.inst
            .phase_timings()
            .record_phase_time(self.phase, elapsed, self.aggregate);
    }
}
