//! Diagnostic logging.
//!
//! When the `tracing` feature is enabled, guards log their titles, elapsed
//! time and optionally heap usage through `tracing`, each title inside its
//! own span. Without the feature every function here compiles to nothing.
//!
//! Bookkeeping inconsistencies found while a guard is being dropped are
//! reported here as warnings rather than panics, so teardown never fails.

use std::time::Instant;

use crate::heap::{Heap, MemoryUsage};

#[cfg(feature = "tracing")]
mod internal {
    use std::time::Duration;

    use tracing::{span, Level};

    use crate::heap::MemoryUsage;
    use crate::stack::GcId;

    pub type TitleSpan = span::EnteredSpan;

    #[allow(clippy::cast_precision_loss)]
    fn millis(d: Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    /// Create a span for a titled pause or concurrent phase.
    pub fn trace_title(title: &str) -> TitleSpan {
        span!(Level::DEBUG, "gc_title", title).entered()
    }

    pub fn log_title_start(title: &str) {
        tracing::debug!(title, "phase_start");
    }

    pub fn log_title_end(title: &str, elapsed: Duration, usage: Option<(MemoryUsage, MemoryUsage)>) {
        match usage {
            Some((before, after)) => tracing::info!(
                title,
                elapsed_ms = millis(elapsed),
                before = %before,
                after = %after,
                "phase_end"
            ),
            None => tracing::info!(title, elapsed_ms = millis(elapsed), "phase_end"),
        }
    }

    pub fn log_cycle_start(gc_id: GcId, cause: &str, generation: &str) {
        tracing::debug!(gc_id = gc_id.0, cause, generation, "cycle_start");
    }

    pub fn log_cycle_end(gc_id: GcId, pauses: usize, sum_of_pauses: Duration) {
        tracing::info!(
            gc_id = gc_id.0,
            pauses,
            sum_of_pauses_ms = millis(sum_of_pauses),
            "cycle_end"
        );
    }

    pub fn log_worker_outside_phase(gc_id: GcId, worker_id: Option<u32>) {
        tracing::debug!(gc_id = gc_id.0, worker_id, "worker_session_outside_phase");
    }

    pub fn log_phase_recorded_twice(phase: &str) {
        tracing::warn!(phase, "phase_recorded_twice");
    }

    pub fn log_timer_mismatch(expected: &str, found: Option<&str>) {
        tracing::warn!(expected, found, "timer_window_mismatch");
    }

    pub fn log_timer_windows_left_open(open: usize) {
        tracing::warn!(open, "timer_windows_left_open");
    }
}

#[cfg(not(feature = "tracing"))]
mod internal {
    use std::time::Duration;

    use crate::heap::MemoryUsage;
    use crate::stack::GcId;

    /// Stub span when tracing is disabled.
    pub struct TitleSpan;

    pub const fn trace_title(_title: &str) -> TitleSpan {
        TitleSpan
    }

    pub fn log_title_start(_title: &str) {}

    pub fn log_title_end(
        _title: &str,
        _elapsed: Duration,
        _usage: Option<(MemoryUsage, MemoryUsage)>,
    ) {
    }

    pub fn log_cycle_start(_gc_id: GcId, _cause: &str, _generation: &str) {}

    pub fn log_cycle_end(_gc_id: GcId, _pauses: usize, _sum_of_pauses: Duration) {}

    pub fn log_worker_outside_phase(_gc_id: GcId, _worker_id: Option<u32>) {}

    pub fn log_phase_recorded_twice(_phase: &str) {}

    pub fn log_timer_mismatch(_expected: &str, _found: Option<&str>) {}

    pub fn log_timer_windows_left_open(_open: usize) {}
}

pub use internal::{
    log_cycle_end, log_cycle_start, log_phase_recorded_twice, log_timer_mismatch,
    log_timer_windows_left_open, log_worker_outside_phase,
};

/// Logs a titled scope: its start, and on drop its elapsed time and, if
/// asked, heap usage before and after.
///
/// The scope is entered as a `gc_title` span for its whole lifetime, so
/// events logged on the same thread while it is open nest under it.
#[must_use = "the scope ends as soon as it is dropped"]
pub struct TraceTime<'a> {
    heap: &'a dyn Heap,
    title: &'static str,
    start: Instant,
    usage_before: Option<MemoryUsage>,
    // Exits after the end event is logged.
    _span: internal::TitleSpan,
}

impl<'a> TraceTime<'a> {
    /// Start logging `title`.
    pub fn new(heap: &'a dyn Heap, title: &'static str, log_heap_usage: bool) -> Self {
        let span = internal::trace_title(title);
        internal::log_title_start(title);
        Self {
            heap,
            title,
            start: Instant::now(),
            usage_before: log_heap_usage.then(|| heap.usage()),
            _span: span,
        }
    }
}

impl std::fmt::Debug for TraceTime<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceTime")
            .field("title", &self.title)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl Drop for TraceTime<'_> {
    fn drop(&mut self) {
        let usage = self.usage_before.map(|before| (before, self.heap.usage()));
        internal::log_title_end(self.title, self.start.elapsed(), usage);
    }
}
