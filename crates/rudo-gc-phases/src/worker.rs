//! Worker-side instrumentation.
//!
//! The coordinating thread wraps each parallel step in a
//! [`WorkerPhaseGuard`]; every worker wraps its unit of work in a
//! [`ConcurrentWorkerSession`] or [`ParallelWorkerSession`]. Sessions never
//! change the current phase, they only read it when the unit finishes.
//!
//! The current phase read at that point is only meaningful if the
//! coordinator keeps its phase guard open until every dispatched worker has
//! joined. The worker pool's dispatch/join provides that ordering; nothing
//! here enforces it. A session that ends while no phase is open still
//! commits its event, tagged with no phase.

use std::cell::Cell;
use std::marker::PhantomData;
use std::time::Instant;

use crate::instrumentation::Instrumentation;
use crate::log::log_worker_outside_phase;
use crate::phase::{phase_name, Phase};
use crate::sink::TraceEvent;
use crate::stack::GcId;
use crate::timings::PhaseTimings;

thread_local! {
    static WORKER_ID: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Worker id the pool assigned to the calling thread, if any.
#[inline]
#[must_use]
pub fn current_worker_id() -> Option<u32> {
    WORKER_ID.with(Cell::get)
}

/// Assigns a worker id to the calling thread until dropped.
///
/// Worker pools create one when a thread takes a pool slot.
#[derive(Debug)]
#[must_use = "the worker id is unassigned as soon as the guard is dropped"]
pub struct WorkerIdentity {
    previous: Option<u32>,
    _not_send: PhantomData<*const ()>,
}

impl WorkerIdentity {
    /// Assign `worker_id` to the calling thread.
    pub fn enter(worker_id: u32) -> Self {
        let previous = WORKER_ID.with(|id| id.replace(Some(worker_id)));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for WorkerIdentity {
    fn drop(&mut self) {
        let _ = WORKER_ID.try_with(|id| id.set(self.previous));
    }
}

/// Counts one dispatch of workers for `phase`.
///
/// Open it right before handing a parallel step to the pool and drop it
/// after the pool joins.
#[derive(Debug)]
#[must_use = "the dispatch ends as soon as the guard is dropped"]
pub struct WorkerPhaseGuard<'a> {
    timings: &'a PhaseTimings,
    phase: Phase,
}

impl<'a> WorkerPhaseGuard<'a> {
    /// Record that workers were started for `phase`.
    pub fn new(inst: &'a Instrumentation, phase: Phase) -> Self {
        let timings = inst.phase_timings();
        timings.record_workers_start(phase);
        Self { timings, phase }
    }

    /// The phase the workers run in.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }
}

impl Drop for WorkerPhaseGuard<'_> {
    fn drop(&mut self) {
        self.timings.record_workers_end(self.phase);
    }
}

/// Checks that a unit of work runs on the worker it was handed to.
#[derive(Debug)]
pub struct WorkerSession {
    worker_id: u32,
    _not_send: PhantomData<*const ()>,
}

impl WorkerSession {
    /// Open a session for `worker_id` on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread was not assigned `worker_id`.
    #[must_use]
    pub fn new(worker_id: u32) -> Self {
        let assigned = current_worker_id();
        assert!(
            assigned == Some(worker_id),
            "wrong worker id: session for worker {worker_id} opened on worker {assigned:?}"
        );
        Self {
            worker_id,
            _not_send: PhantomData,
        }
    }

    /// The worker this session belongs to.
    #[inline]
    #[must_use]
    pub const fn worker_id(&self) -> u32 {
        self.worker_id
    }
}

/// The phase to tag a finished unit with.
fn active_phase(inst: &Instrumentation, worker_id: Option<u32>) -> (GcId, Option<Phase>, &'static str) {
    let state = inst.phase_state();
    let raw = state.current_raw();
    let gc_id = state.current_gc_id();
    let phase = Phase::from_raw(raw);
    if phase.is_none() {
        log_worker_outside_phase(gc_id, worker_id);
    }
    (gc_id, phase, phase_name(raw))
}

/// A unit of work run by a concurrent worker.
///
/// # Panics
///
/// Panics if the calling thread was not assigned `worker_id`.
#[derive(Debug)]
#[must_use = "the unit of work ends as soon as the session is dropped"]
pub struct ConcurrentWorkerSession<'a> {
    inst: &'a Instrumentation,
    _session: WorkerSession,
    start: Instant,
}

impl<'a> ConcurrentWorkerSession<'a> {
    /// Open a session for `worker_id`.
    pub fn new(inst: &'a Instrumentation, worker_id: u32) -> Self {
        Self {
            inst,
            _session: WorkerSession::new(worker_id),
            start: Instant::now(),
        }
    }
}

impl Drop for ConcurrentWorkerSession<'_> {
    fn drop(&mut self) {
        if !self.inst.config().worker_events {
            return;
        }
        let (gc_id, phase, phase_name) = active_phase(self.inst, None);
        self.inst.tracer().emit(TraceEvent::ConcurrentWorkerPhase {
            gc_id,
            phase,
            phase_name,
            start: self.start,
            duration: self.start.elapsed(),
        });
    }
}

/// A unit of work run by a parallel (stop-the-world) worker.
///
/// Its event also carries the worker id.
///
/// # Panics
///
/// Panics if the calling thread was not assigned `worker_id`.
#[derive(Debug)]
#[must_use = "the unit of work ends as soon as the session is dropped"]
pub struct ParallelWorkerSession<'a> {
    inst: &'a Instrumentation,
    session: WorkerSession,
    start: Instant,
}

impl<'a> ParallelWorkerSession<'a> {
    /// Open a session for `worker_id`.
    pub fn new(inst: &'a Instrumentation, worker_id: u32) -> Self {
        Self {
            inst,
            session: WorkerSession::new(worker_id),
            start: Instant::now(),
        }
    }
}

impl Drop for ParallelWorkerSession<'_> {
    fn drop(&mut self) {
        if !self.inst.config().worker_events {
            return;
        }
        let worker_id = self.session.worker_id();
        let (gc_id, phase, phase_name) = active_phase(self.inst, Some(worker_id));
        self.inst.tracer().emit(TraceEvent::ParallelWorkerPhase {
            gc_id,
            worker_id,
            phase,
            phase_name,
            start: self.start,
            duration: self.start.elapsed(),
        });
    }
}
