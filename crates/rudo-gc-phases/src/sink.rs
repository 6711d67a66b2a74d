//! Trace events and where they go.
//!
//! The instrumentation produces [`TraceEvent`]s; a [`TraceSink`] decides
//! what happens to them. [`RecordingSink`] keeps them in memory for
//! monitoring code and tests, [`LogSink`] turns them into `tracing` events,
//! and [`NullSink`] drops them.

use std::time::{Duration, Instant};

use crossbeam::queue::SegQueue;

use crate::heap::{GcCause, GenerationKind, MemoryUsage, ReferenceStats};
use crate::manager::ManagerRecord;
use crate::phase::Phase;
use crate::stack::GcId;

/// Whether a heap summary was taken before or after the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcWhen {
    /// At cycle start.
    BeforeGc,
    /// At cycle end.
    AfterGc,
}

/// A structured record for external observability.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A collection cycle started.
    CycleStart {
        gc_id: GcId,
        cause: GcCause,
        generation: GenerationKind,
        at: Instant,
    },
    /// Heap occupancy at a cycle boundary.
    HeapSummary {
        gc_id: GcId,
        when: GcWhen,
        usage: MemoryUsage,
    },
    /// Reference-processing statistics of the cycle.
    ReferenceStats { gc_id: GcId, stats: ReferenceStats },
    /// A collection cycle ended.
    CycleEnd {
        gc_id: GcId,
        at: Instant,
        sum_of_pauses: Duration,
        longest_pause: Duration,
        concurrent_time: Duration,
    },
    /// A memory-manager trace record closed.
    MemoryManagerEnd {
        manager: &'static str,
        cause: GcCause,
        record: ManagerRecord,
    },
    /// A concurrent worker finished a unit of work.
    ConcurrentWorkerPhase {
        gc_id: GcId,
        phase: Option<Phase>,
        phase_name: &'static str,
        start: Instant,
        duration: Duration,
    },
    /// A parallel worker finished a unit of work.
    ParallelWorkerPhase {
        gc_id: GcId,
        worker_id: u32,
        phase: Option<Phase>,
        phase_name: &'static str,
        start: Instant,
        duration: Duration,
    },
}

/// Destination of trace events.
pub trait TraceSink: Send + Sync {
    /// Accept one event.
    fn emit(&self, event: TraceEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TraceSink for NullSink {
    fn emit(&self, _event: TraceEvent) {}
}

/// Keeps events in an unbounded lock-free queue.
///
/// Worker threads emit concurrently, so pushes never block.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: SegQueue<TraceEvent>,
}

impl RecordingSink {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events waiting to be drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every recorded event, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<TraceEvent> {
        std::iter::from_fn(|| self.events.pop()).collect()
    }
}

impl TraceSink for RecordingSink {
    fn emit(&self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Forwards events to the `tracing` subscriber.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[cfg(feature = "tracing")]
impl TraceSink for LogSink {
    fn emit(&self, event: TraceEvent) {
        match event {
            TraceEvent::CycleStart {
                gc_id,
                cause,
                generation,
                ..
            } => {
                tracing::info!(
                    gc_id = gc_id.0,
                    cause = cause.name(),
                    generation = generation.name(),
                    "gc_cycle_start"
                );
            }
            TraceEvent::HeapSummary { gc_id, when, usage } => {
                tracing::debug!(
                    gc_id = gc_id.0,
                    when = ?when,
                    used = usage.used,
                    committed = usage.committed,
                    "heap_summary"
                );
            }
            TraceEvent::ReferenceStats { gc_id, stats } => {
                tracing::debug!(
                    gc_id = gc_id.0,
                    soft = stats.soft,
                    weak = stats.weak,
                    final_refs = stats.final_refs,
                    phantom = stats.phantom,
                    "reference_stats"
                );
            }
            TraceEvent::CycleEnd {
                gc_id,
                sum_of_pauses,
                longest_pause,
                concurrent_time,
                ..
            } => {
                tracing::info!(
                    gc_id = gc_id.0,
                    sum_of_pauses_us = u64::try_from(sum_of_pauses.as_micros()).unwrap_or(u64::MAX),
                    longest_pause_us = u64::try_from(longest_pause.as_micros()).unwrap_or(u64::MAX),
                    concurrent_us = u64::try_from(concurrent_time.as_micros()).unwrap_or(u64::MAX),
                    "gc_cycle_end"
                );
            }
            TraceEvent::MemoryManagerEnd {
                manager,
                cause,
                record,
            } => {
                tracing::debug!(
                    manager,
                    cause = cause.name(),
                    record = ?record,
                    "memory_manager_end"
                );
            }
            TraceEvent::ConcurrentWorkerPhase {
                gc_id,
                phase_name,
                duration,
                ..
            } => {
                tracing::trace!(
                    gc_id = gc_id.0,
                    phase = phase_name,
                    duration = ?duration,
                    "concurrent_worker"
                );
            }
            TraceEvent::ParallelWorkerPhase {
                gc_id,
                worker_id,
                phase_name,
                duration,
                ..
            } => {
                tracing::trace!(
                    gc_id = gc_id.0,
                    worker_id,
                    phase = phase_name,
                    duration = ?duration,
                    "parallel_worker"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_drains_in_order() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());
        for i in 1..=3 {
            sink.emit(TraceEvent::ReferenceStats {
                gc_id: GcId(i),
                stats: ReferenceStats::default(),
            });
        }
        assert_eq!(sink.len(), 3);

        let ids: Vec<_> = sink
            .drain()
            .into_iter()
            .map(|e| match e {
                TraceEvent::ReferenceStats { gc_id, .. } => gc_id.0,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        NullSink.emit(TraceEvent::ReferenceStats {
            gc_id: GcId(1),
            stats: ReferenceStats::default(),
        });
    }
}
