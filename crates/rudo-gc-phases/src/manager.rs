//! Memory-manager statistics and the trace records that feed them.
//!
//! A [`MemoryManager`] is a named bucket (cycle, pause, concurrent) that
//! counts collections and accumulates their time. A [`TraceRecord`] is
//! opened by a guard and, when dropped, applies its [`TraceCapture`] to the
//! manager and emits a [`TraceEvent::MemoryManagerEnd`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::heap::{GcCause, Heap, MemoryUsage};
use crate::sink::TraceEvent;

/// Which fields a trace record captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct TraceCapture {
    /// Record when the record opened.
    pub begin_time: bool,
    /// Snapshot heap usage when the record opens.
    pub pre_usage: bool,
    /// Snapshot peak heap usage when the record closes.
    pub peak_usage: bool,
    /// Snapshot heap usage when the record closes.
    pub post_usage: bool,
    /// Add the record's duration to the manager's accumulated time.
    pub accumulated_time: bool,
    /// Record when the record closed.
    pub end_time: bool,
    /// Count the record as one collection of the manager.
    pub count_collection: bool,
}

impl TraceCapture {
    /// Everything, as used for whole cycles.
    #[must_use]
    pub const fn cycle() -> Self {
        Self {
            begin_time: true,
            pre_usage: true,
            peak_usage: true,
            post_usage: true,
            accumulated_time: true,
            end_time: true,
            count_collection: true,
        }
    }

    /// Timestamps, accumulated time and the collection count, without any
    /// usage snapshot.
    #[must_use]
    pub const fn time_only() -> Self {
        Self {
            pre_usage: false,
            peak_usage: false,
            post_usage: false,
            ..Self::cycle()
        }
    }
}

/// What the last closed record on a manager captured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerRecord {
    /// When the record opened.
    pub begin: Option<Instant>,
    /// When the record closed.
    pub end: Option<Instant>,
    /// Usage when opened.
    pub pre_usage: Option<MemoryUsage>,
    /// Peak usage when closed.
    pub peak_usage: Option<MemoryUsage>,
    /// Usage when closed.
    pub post_usage: Option<MemoryUsage>,
}

/// Collection statistics for one kind of collector activity.
#[derive(Debug)]
pub struct MemoryManager {
    name: &'static str,
    collections: AtomicUsize,
    accumulated_ns: AtomicU64,
    last: Mutex<ManagerRecord>,
}

impl MemoryManager {
    /// A manager with no collections.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            collections: AtomicUsize::new(0),
            accumulated_ns: AtomicU64::new(0),
            last: Mutex::new(ManagerRecord::default()),
        }
    }

    /// Display name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Records that counted as a collection.
    #[inline]
    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.collections.load(Ordering::Relaxed)
    }

    /// Total time of records that accumulated time.
    #[inline]
    #[must_use]
    pub fn accumulated_time(&self) -> Duration {
        Duration::from_nanos(self.accumulated_ns.load(Ordering::Relaxed))
    }

    /// The last closed record.
    #[must_use]
    pub fn last_record(&self) -> ManagerRecord {
        *self.last.lock()
    }
}

/// An open record on a memory manager.
#[must_use = "the record closes as soon as it is dropped"]
pub struct TraceRecord<'a> {
    heap: &'a dyn Heap,
    manager: &'a MemoryManager,
    cause: GcCause,
    capture: TraceCapture,
    start: Instant,
    pre_usage: Option<MemoryUsage>,
}

impl<'a> TraceRecord<'a> {
    /// Open a record on `manager`, snapshotting usage if `capture` asks.
    pub fn begin(
        heap: &'a dyn Heap,
        manager: &'a MemoryManager,
        cause: GcCause,
        capture: TraceCapture,
    ) -> Self {
        Self {
            heap,
            manager,
            cause,
            capture,
            start: Instant::now(),
            pre_usage: capture.pre_usage.then(|| heap.usage()),
        }
    }

    /// The capture this record was opened with.
    #[inline]
    #[must_use]
    pub const fn capture(&self) -> TraceCapture {
        self.capture
    }
}

impl std::fmt::Debug for TraceRecord<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceRecord")
            .field("manager", &self.manager.name)
            .field("cause", &self.cause)
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

impl Drop for TraceRecord<'_> {
    fn drop(&mut self) {
        let end = Instant::now();
        let capture = self.capture;
        let manager = self.manager;

        if capture.accumulated_time {
            let nanos = end
                .saturating_duration_since(self.start)
                .as_nanos()
                .try_into()
                .unwrap_or(u64::MAX);
            manager.accumulated_ns.fetch_add(nanos, Ordering::Relaxed);
        }
        if capture.count_collection {
            manager.collections.fetch_add(1, Ordering::Relaxed);
        }

        let record = ManagerRecord {
            begin: capture.begin_time.then_some(self.start),
            end: capture.end_time.then_some(end),
            pre_usage: self.pre_usage,
            peak_usage: capture.peak_usage.then(|| self.heap.peak_usage()),
            post_usage: capture.post_usage.then(|| self.heap.usage()),
        };
        *manager.last.lock() = record;

        self.heap
            .instrumentation()
            .tracer()
            .emit(TraceEvent::MemoryManagerEnd {
                manager: manager.name,
                cause: self.cause,
                record,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_only_drops_usage() {
        let capture = TraceCapture::time_only();
        assert!(!capture.pre_usage && !capture.peak_usage && !capture.post_usage);
        assert!(capture.begin_time && capture.end_time);
        assert!(capture.accumulated_time && capture.count_collection);
    }

    #[test]
    fn test_new_manager_is_empty() {
        let manager = MemoryManager::new("GC Pauses");
        assert_eq!(manager.name(), "GC Pauses");
        assert_eq!(manager.collection_count(), 0);
        assert_eq!(manager.accumulated_time(), Duration::ZERO);
        assert_eq!(manager.last_record(), ManagerRecord::default());
    }
}
