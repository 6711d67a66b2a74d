//! Per-phase duration aggregation.
//!
//! [`PhaseTimings`] keeps two tables: the durations recorded during the
//! current cycle, and a cumulative per-phase summary that the cycle table
//! is folded into by [`PhaseTimings::flush_cycle_to_global`]. Collector
//! heuristics read the former, reports read the latter.
//!
//! Worker participation is tracked separately with started/ended counters
//! that any number of worker threads may bump concurrently.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::log::log_phase_recorded_twice;
use crate::phase::{Phase, NUM_PHASES};

/// Cycle slot value meaning "not recorded during this cycle".
const UNSET: u64 = u64::MAX;

/// Cumulative statistics for one phase across flushed cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Number of cycles that recorded this phase.
    pub count: u64,
    /// Sum of all recorded durations.
    pub total: Duration,
    /// Shortest recorded duration.
    pub min: Duration,
    /// Longest recorded duration.
    pub max: Duration,
}

impl PhaseSummary {
    /// Mean recorded duration, or zero if nothing was recorded.
    #[must_use]
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(nanos.try_into().unwrap_or(u64::MAX))
    }

    fn add(&mut self, sample: Duration) {
        if self.count == 0 {
            self.min = sample;
            self.max = sample;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
        }
        self.count += 1;
        self.total += sample;
    }
}

#[derive(Debug, Default)]
struct WorkerCounters {
    started: AtomicUsize,
    ended: AtomicUsize,
}

/// The phase-duration aggregation table owned by the heap.
#[derive(Debug)]
pub struct PhaseTimings {
    cycle_nanos: [AtomicU64; NUM_PHASES],
    workers: [WorkerCounters; NUM_PHASES],
    global: Mutex<[PhaseSummary; NUM_PHASES]>,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    // UNSET is reserved, so the largest storable duration is one below it.
    d.as_nanos().try_into().unwrap_or(UNSET - 1).min(UNSET - 1)
}

impl PhaseTimings {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle_nanos: std::array::from_fn(|_| AtomicU64::new(UNSET)),
            workers: std::array::from_fn(|_| WorkerCounters::default()),
            global: Mutex::new([PhaseSummary::default(); NUM_PHASES]),
        }
    }

    /// Record the time spent in `phase` during the current cycle.
    ///
    /// With `aggregate` the duration is added to whatever the phase already
    /// accumulated this cycle. Without it the phase should not have been
    /// recorded yet this cycle; a second record replaces the first and is
    /// logged as a warning. Guards call this from `Drop`, so it never panics.
    pub fn record_phase_time(&self, phase: Phase, elapsed: Duration, aggregate: bool) {
        let slot = &self.cycle_nanos[phase.index()];
        let nanos = saturating_nanos(elapsed);
        if aggregate {
            // The closure always returns `Some`, so the update cannot fail.
            slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                let base = if prev == UNSET { 0 } else { prev };
                Some(base.saturating_add(nanos).min(UNSET - 1))
            })
            .ok();
        } else if slot.swap(nanos, Ordering::AcqRel) != UNSET {
            log_phase_recorded_twice(phase.name());
        }
    }

    /// Duration recorded for `phase` in the current cycle, if any.
    #[must_use]
    pub fn cycle_time(&self, phase: Phase) -> Option<Duration> {
        match self.cycle_nanos[phase.index()].load(Ordering::Acquire) {
            UNSET => None,
            nanos => Some(Duration::from_nanos(nanos)),
        }
    }

    /// Fold the current cycle into the cumulative summaries and clear it.
    pub fn flush_cycle_to_global(&self) {
        let mut global = self.global.lock();
        for phase in Phase::ALL {
            let nanos = self.cycle_nanos[phase.index()].swap(UNSET, Ordering::AcqRel);
            if nanos != UNSET {
                global[phase.index()].add(Duration::from_nanos(nanos));
            }
        }
    }

    /// Cumulative summary for `phase`.
    #[must_use]
    pub fn summary(&self, phase: Phase) -> PhaseSummary {
        self.global.lock()[phase.index()]
    }

    /// Summaries of every phase that has at least one flushed sample.
    #[must_use]
    pub fn report(&self) -> Vec<(Phase, PhaseSummary)> {
        let global = self.global.lock();
        Phase::ALL
            .iter()
            .filter(|p| global[p.index()].count > 0)
            .map(|p| (*p, global[p.index()]))
            .collect()
    }

    /// Note that a group of workers was dispatched for `phase`.
    #[inline]
    pub fn record_workers_start(&self, phase: Phase) {
        self.workers[phase.index()]
            .started
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Note that a dispatched group of workers for `phase` has joined.
    #[inline]
    pub fn record_workers_end(&self, phase: Phase) {
        self.workers[phase.index()]
            .ended
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Number of worker dispatches started for `phase`.
    #[inline]
    #[must_use]
    pub fn workers_started(&self, phase: Phase) -> usize {
        self.workers[phase.index()].started.load(Ordering::Acquire)
    }

    /// Number of worker dispatches ended for `phase`.
    #[inline]
    #[must_use]
    pub fn workers_ended(&self, phase: Phase) -> usize {
        self.workers[phase.index()].ended.load(Ordering::Acquire)
    }
}
