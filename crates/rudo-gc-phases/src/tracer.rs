//! The tracer collaborator: cycle-level reports sent to a [`TraceSink`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::heap::{GcCause, GenerationKind, MemoryUsage, ReferenceStats};
use crate::sink::{GcWhen, NullSink, TraceEvent, TraceSink};
use crate::stack::GcId;
use crate::timer::TimePartitions;

/// Builds trace events and hands them to the configured sink.
#[derive(Clone)]
pub struct GcTracer {
    sink: Arc<dyn TraceSink>,
}

impl Default for GcTracer {
    fn default() -> Self {
        Self::new(Arc::new(NullSink))
    }
}

impl fmt::Debug for GcTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcTracer").finish_non_exhaustive()
    }
}

impl GcTracer {
    /// A tracer sending events to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink }
    }

    /// Send an event as is.
    #[inline]
    pub fn emit(&self, event: TraceEvent) {
        self.sink.emit(event);
    }

    /// A cycle started.
    pub fn report_gc_start(
        &self,
        gc_id: GcId,
        cause: GcCause,
        generation: GenerationKind,
        at: Instant,
    ) {
        self.emit(TraceEvent::CycleStart {
            gc_id,
            cause,
            generation,
            at,
        });
    }

    /// Heap occupancy at a cycle boundary.
    pub fn report_heap_summary(&self, gc_id: GcId, when: GcWhen, usage: MemoryUsage) {
        self.emit(TraceEvent::HeapSummary { gc_id, when, usage });
    }

    /// Reference-processing statistics of the cycle.
    pub fn report_reference_stats(&self, gc_id: GcId, stats: ReferenceStats) {
        self.emit(TraceEvent::ReferenceStats { gc_id, stats });
    }

    /// A cycle ended; summarizes its time partitions.
    pub fn report_gc_end(&self, gc_id: GcId, at: Instant, partitions: &TimePartitions) {
        self.emit(TraceEvent::CycleEnd {
            gc_id,
            at,
            sum_of_pauses: partitions.sum_of_pauses(),
            longest_pause: partitions.longest_pause(),
            concurrent_time: partitions.concurrent_time(),
        });
    }
}
