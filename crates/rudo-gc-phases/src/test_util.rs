//! Simulated collaborators for tests and benchmarks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::heap::{GcCause, Generation, GenerationKind, Heap, MemoryUsage, ReferenceStats};
use crate::instrumentation::Instrumentation;
use crate::phase::Phase;
use crate::sink::{RecordingSink, TraceEvent};
use crate::worker::{WorkerIdentity, WorkerPhaseGuard};

/// A heap whose usage is set by hand and whose trace events are recorded.
#[derive(Debug)]
pub struct SimulatedHeap {
    inst: Instrumentation,
    sink: Arc<RecordingSink>,
    used: AtomicUsize,
    peak: AtomicUsize,
    committed: usize,
    cause: Mutex<GcCause>,
    cycles_started: AtomicUsize,
    cycles_ended: AtomicUsize,
}

impl Default for SimulatedHeap {
    fn default() -> Self {
        Self::new(64 * 1024 * 1024)
    }
}

impl SimulatedHeap {
    /// A heap with `committed` bytes and nothing used.
    #[must_use]
    pub fn new(committed: usize) -> Self {
        let sink = Arc::new(RecordingSink::new());
        Self {
            inst: Instrumentation::new(sink.clone()),
            sink,
            used: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            committed,
            cause: Mutex::new(GcCause::NoGc),
            cycles_started: AtomicUsize::new(0),
            cycles_ended: AtomicUsize::new(0),
        }
    }

    /// Set the used byte count, raising the peak if needed.
    pub fn set_used(&self, bytes: usize) {
        self.used.store(bytes, Ordering::Relaxed);
        self.peak.fetch_max(bytes, Ordering::Relaxed);
    }

    /// Take every trace event emitted so far.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.sink.drain()
    }

    /// Number of `on_cycle_start` notifications.
    #[must_use]
    pub fn cycles_started(&self) -> usize {
        self.cycles_started.load(Ordering::Relaxed)
    }

    /// Number of `on_cycle_end` notifications.
    #[must_use]
    pub fn cycles_ended(&self) -> usize {
        self.cycles_ended.load(Ordering::Relaxed)
    }
}

impl Heap for SimulatedHeap {
    fn instrumentation(&self) -> &Instrumentation {
        &self.inst
    }

    fn usage(&self) -> MemoryUsage {
        MemoryUsage::new(self.used.load(Ordering::Relaxed), self.committed)
    }

    fn peak_usage(&self) -> MemoryUsage {
        MemoryUsage::new(self.peak.load(Ordering::Relaxed), self.committed)
    }

    fn gc_cause(&self) -> GcCause {
        *self.cause.lock()
    }

    fn on_cycle_start(&self, cause: GcCause, _generation: &dyn Generation) {
        *self.cause.lock() = cause;
        self.peak
            .store(self.used.load(Ordering::Relaxed), Ordering::Relaxed);
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_cycle_end(&self, _generation: &dyn Generation) {
        *self.cause.lock() = GcCause::NoGc;
        self.cycles_ended.fetch_add(1, Ordering::Relaxed);
    }
}

/// A generation with fixed reference statistics.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedGeneration {
    /// Reported kind.
    pub kind: GenerationKind,
    /// Reported reference statistics.
    pub stats: ReferenceStats,
}

impl SimulatedGeneration {
    /// A generation of `kind` with empty statistics.
    #[must_use]
    pub fn new(kind: GenerationKind) -> Self {
        Self {
            kind,
            stats: ReferenceStats::default(),
        }
    }
}

impl Generation for SimulatedGeneration {
    fn kind(&self) -> GenerationKind {
        self.kind
    }

    fn reference_stats(&self) -> ReferenceStats {
        self.stats
    }
}

/// Dispatch `workers` threads for `phase` and join them.
///
/// Mimics a worker pool: the dispatch is wrapped in a [`WorkerPhaseGuard`],
/// and each thread is assigned its worker id before running `work`.
pub fn run_workers<F>(inst: &Instrumentation, phase: Phase, workers: u32, work: F)
where
    F: Fn(u32) + Sync,
{
    let _dispatch = WorkerPhaseGuard::new(inst, phase);
    std::thread::scope(|s| {
        for worker_id in 0..workers {
            let work = &work;
            s.spawn(move || {
                let _identity = WorkerIdentity::enter(worker_id);
                work(worker_id);
            });
        }
    });
}
