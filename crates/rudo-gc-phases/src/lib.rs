//! Phase timing and tracing instrumentation for garbage collection cycles.
//!
//! `rudo-gc-phases` is the collector's clock and logbook. It gives every
//! nested phase of a collection cycle a time window, an entry in a
//! phase-duration table, and structured trace events, from the whole cycle
//! down to individual units of work run by worker threads.
//!
//! # Guards
//!
//! Everything is driven by scope guards on the coordinating thread:
//!
//! - [`CycleSession`]: one whole cycle for a cause and a generation
//! - [`PauseGuard`]: a stop-the-world pause
//! - [`ConcurrentPhaseGuard`]: a phase running alongside the application
//! - [`PhaseGuard`]: a nested sub-phase
//! - [`WorkerPhaseGuard`]: one dispatch of parallel workers
//!
//! and on worker threads:
//!
//! - [`ConcurrentWorkerSession`] / [`ParallelWorkerSession`]: one unit of work
//!
//! # Quick Start
//!
//! ```ignore
//! use rudo_gc_phases::{CycleSession, GcCause, Heap, PauseGuard, Phase, PhaseGuard};
//!
//! let inst = heap.instrumentation();
//! let _binding = inst.phase_state().bind_coordinator();
//!
//! let _cycle = CycleSession::new(&heap, GcCause::AllocationFailure, &young);
//! {
//!     let _pause = PauseGuard::new(&heap, "Pause Final Mark", Phase::FinalMark, true);
//!     let _finish = PhaseGuard::new(inst, Phase::FinishMark);
//!     // finish marking
//! }
//! ```
//!
//! # Thread Safety
//!
//! The current phase is a single-writer atomic: only the thread bound with
//! [`PhaseState::bind_coordinator`] may open phase guards, and doing so from
//! any other thread panics. Worker threads only read it. Phase guards are
//! `!Send`, so they are always dropped on the thread that opened them.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod guard;
pub mod heap;
mod instrumentation;
mod log;
pub mod manager;
pub mod phase;
pub mod sink;
mod stack;
pub mod timer;
pub mod timings;
mod tracer;
mod worker;

// Re-export public API
pub use guard::{ConcurrentPhaseGuard, CycleSession, PauseGuard, PhaseGuard};
pub use heap::{GcCause, Generation, GenerationKind, Heap, MemoryUsage, ReferenceStats};
pub use instrumentation::{Instrumentation, InstrumentationConfig};
pub use log::TraceTime;
pub use manager::{MemoryManager, TraceCapture, TraceRecord};
pub use phase::{phase_name, Phase, INVALID_PHASE, NUM_PHASES};
#[cfg(feature = "tracing")]
pub use sink::LogSink;
pub use sink::{GcWhen, NullSink, RecordingSink, TraceEvent, TraceSink};
pub use stack::{CoordinatorBinding, GcId, PhaseStack, PhaseState};
pub use timer::{GcTimer, PhaseKind, TimePartitions};
pub use timings::{PhaseSummary, PhaseTimings};
pub use tracer::GcTracer;
pub use worker::{
    current_worker_id, ConcurrentWorkerSession, ParallelWorkerSession, WorkerIdentity,
    WorkerPhaseGuard, WorkerSession,
};

#[cfg(any(test, feature = "test-util"))]
#[doc(hidden)]
pub mod test_util;
