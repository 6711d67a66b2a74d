//! Scope guards for cycles, pauses, concurrent phases and sub-phases.
//!
//! All guards are built on [`PhaseStack`]. They differ in which timer
//! boundary they register and which trace record they keep open:
//!
//! | Guard                    | Timer boundary | Trace record                    |
//! |--------------------------|----------------|---------------------------------|
//! | [`CycleSession`]         | cycle          | cycle manager, full capture     |
//! | [`PauseGuard`]           | pause          | pause manager, time only        |
//! | [`ConcurrentPhaseGuard`] | concurrent     | concurrent manager, time only   |
//! | [`PhaseGuard`]           | sub-phase      | none (uses the enclosing one)   |
//!
//! A typical cycle on the coordinating thread:
//!
//! ```ignore
//! let _binding = heap.instrumentation().phase_state().bind_coordinator();
//! let _session = CycleSession::new(&heap, GcCause::AllocationFailure, &young);
//! {
//!     let _pause = PauseGuard::new(&heap, "Pause Init Mark", Phase::InitMark, false);
//!     let _roots = PhaseGuard::new(heap.instrumentation(), Phase::InitScanRoots);
//!     // scan roots
//! }
//! {
//!     let _mark = ConcurrentPhaseGuard::new(&heap, "Concurrent marking", Phase::ConcMark, true);
//!     // mark
//! }
//! ```

use std::time::Instant;

use crate::heap::{GcCause, Generation, Heap};
use crate::instrumentation::Instrumentation;
use crate::log::{log_cycle_end, log_cycle_start, TraceTime};
use crate::manager::{TraceCapture, TraceRecord};
use crate::phase::{phase_name, Phase};
use crate::sink::GcWhen;
use crate::stack::{CycleEntry, GcId, PhaseStack};

/// One full collection cycle.
///
/// # Panics
///
/// Construction panics if a phase is active or another cycle session is
/// open. If a heap hook panics during construction the cycle is not left
/// marked open. Dropping panics if a phase guard opened inside the session is
/// still active, unless the thread is already unwinding.
#[must_use = "the cycle ends as soon as the session is dropped"]
pub struct CycleSession<'a> {
    heap: &'a dyn Heap,
    generation: &'a dyn Generation,
    gc_id: GcId,
    // Closes after the cycle-end report.
    _trace_cycle: TraceRecord<'a>,
    // Declared last so the cycle is marked closed after everything else.
    _entry: CycleEntry<'a>,
}

impl<'a> CycleSession<'a> {
    /// Start a cycle collecting `generation` because of `cause`.
    pub fn new(heap: &'a dyn Heap, cause: GcCause, generation: &'a dyn Generation) -> Self {
        let inst = heap.instrumentation();
        let state = inst.phase_state();
        assert!(
            !state.is_active(),
            "no GC phase may be active when a cycle starts, found {}",
            phase_name(state.current_raw())
        );
        let Some(entry) = state.enter_cycle() else {
            panic!("a cycle session is already open on this heap");
        };
        let gc_id = state.next_gc_id();
        inst.phase_timings().flush_cycle_to_global();

        heap.on_cycle_start(cause, generation);

        let timer = inst.timer();
        timer.register_gc_start();
        let tracer = inst.tracer();
        tracer.report_gc_start(
            gc_id,
            cause,
            generation.kind(),
            timer.gc_start().unwrap_or_else(Instant::now),
        );
        tracer.report_heap_summary(gc_id, GcWhen::BeforeGc, heap.usage());
        log_cycle_start(gc_id, cause.name(), generation.kind().name());

        let trace_cycle = TraceRecord::begin(
            heap,
            inst.cycle_memory_manager(),
            cause,
            TraceCapture::cycle(),
        );

        Self {
            heap,
            generation,
            gc_id,
            _trace_cycle: trace_cycle,
            _entry: entry,
        }
    }

    /// Id of this cycle.
    #[inline]
    #[must_use]
    pub const fn gc_id(&self) -> GcId {
        self.gc_id
    }
}

impl Drop for CycleSession<'_> {
    fn drop(&mut self) {
        let inst = self.heap.instrumentation();
        self.heap.on_cycle_end(self.generation);

        let timer = inst.timer();
        timer.register_gc_end();
        let tracer = inst.tracer();
        tracer.report_heap_summary(self.gc_id, GcWhen::AfterGc, self.heap.usage());
        tracer.report_reference_stats(self.gc_id, self.generation.reference_stats());
        let partitions = timer.time_partitions();
        tracer.report_gc_end(
            self.gc_id,
            timer.gc_end().unwrap_or_else(Instant::now),
            &partitions,
        );
        if inst.config().log_cycle_summary {
            log_cycle_end(self.gc_id, partitions.num_pauses(), partitions.sum_of_pauses());
        }

        let state = inst.phase_state();
        if !std::thread::panicking() {
            assert!(
                !state.is_active(),
                "GC phase {} is still active at the end of cycle {}",
                phase_name(state.current_raw()),
                self.gc_id.0
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Pause,
    Concurrent,
}

/// Shared body of pause and concurrent guards.
///
/// Fields drop in declaration order: the title log first, then the trace
/// record, then the phase frame.
struct TopLevelPhase<'a> {
    inst: &'a Instrumentation,
    boundary: Boundary,
    _log: TraceTime<'a>,
    _record: TraceRecord<'a>,
    stack: PhaseStack<'a>,
}

impl<'a> TopLevelPhase<'a> {
    fn open(
        heap: &'a dyn Heap,
        title: &'static str,
        phase: Phase,
        log_heap_usage: bool,
        boundary: Boundary,
    ) -> Self {
        let inst = heap.instrumentation();
        let stack = PhaseStack::new(inst, phase, false);
        let manager = match boundary {
            Boundary::Pause => inst.pause_memory_manager(),
            Boundary::Concurrent => inst.concurrent_memory_manager(),
        };
        let record = TraceRecord::begin(heap, manager, heap.gc_cause(), TraceCapture::time_only());
        let log = TraceTime::new(heap, title, log_heap_usage);
        match boundary {
            Boundary::Pause => inst.timer().register_pause_start(title),
            Boundary::Concurrent => inst.timer().register_concurrent_start(title),
        }
        Self {
            inst,
            boundary,
            _log: log,
            _record: record,
            stack,
        }
    }
}

impl Drop for TopLevelPhase<'_> {
    fn drop(&mut self) {
        match self.boundary {
            Boundary::Pause => self.inst.timer().register_pause_end(),
            Boundary::Concurrent => self.inst.timer().register_concurrent_end(),
        }
    }
}

/// A stop-the-world pause.
///
/// Counts one collection on the pause memory manager and times the pause,
/// without usage snapshots. With `log_heap_usage` the title log line also
/// shows heap usage before and after.
///
/// # Panics
///
/// Panics if not called on the coordinating thread.
#[must_use = "the pause ends as soon as the guard is dropped"]
pub struct PauseGuard<'a>(TopLevelPhase<'a>);

impl<'a> PauseGuard<'a> {
    /// Open pause `phase`, logged as `title`.
    pub fn new(heap: &'a dyn Heap, title: &'static str, phase: Phase, log_heap_usage: bool) -> Self {
        Self(TopLevelPhase::open(
            heap,
            title,
            phase,
            log_heap_usage,
            Boundary::Pause,
        ))
    }

    /// The phase this pause opened.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.0.stack.phase()
    }
}

/// A phase running alongside application threads.
///
/// Same records as [`PauseGuard`], but the timer classifies the window as
/// concurrent and the concurrent memory manager is used.
///
/// # Panics
///
/// Panics if not called on the coordinating thread.
#[must_use = "the phase ends as soon as the guard is dropped"]
pub struct ConcurrentPhaseGuard<'a>(TopLevelPhase<'a>);

impl<'a> ConcurrentPhaseGuard<'a> {
    /// Open concurrent `phase`, logged as `title`.
    pub fn new(heap: &'a dyn Heap, title: &'static str, phase: Phase, log_heap_usage: bool) -> Self {
        Self(TopLevelPhase::open(
            heap,
            title,
            phase,
            log_heap_usage,
            Boundary::Concurrent,
        ))
    }

    /// The phase this guard opened.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.0.stack.phase()
    }
}

/// A nested sub-phase: timing and aggregation only.
///
/// # Panics
///
/// Panics if not called on the coordinating thread.
#[must_use = "the phase ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PhaseGuard<'a> {
    stack: PhaseStack<'a>,
}

impl<'a> PhaseGuard<'a> {
    /// Open sub-phase `phase`.
    pub fn new(inst: &'a Instrumentation, phase: Phase) -> Self {
        let stack = PhaseStack::new(inst, phase, false);
        inst.timer().register_phase_start(phase.name(), Instant::now());
        Self { stack }
    }

    /// The phase this guard opened.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.stack.phase()
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.stack
            .instrumentation()
            .timer()
            .register_phase_end(Instant::now());
    }
}
