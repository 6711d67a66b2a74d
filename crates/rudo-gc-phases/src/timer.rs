//! Cycle timer and time partitions.
//!
//! [`GcTimer`] records the start and end of a cycle and every pause,
//! concurrent and sub-phase window inside it. The resulting
//! [`TimePartitions`] separate pause time from concurrent time for the
//! cycle-end report.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::log::{log_timer_mismatch, log_timer_windows_left_open};

/// How a recorded window relates to application threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// Application threads were stopped.
    Pause,
    /// Application threads kept running.
    Concurrent,
    /// A sub-phase nested in a pause or concurrent window.
    SubPhase,
}

impl PhaseKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Concurrent => "concurrent",
            Self::SubPhase => "sub-phase",
        }
    }
}

/// One closed window of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    /// Title or phase name.
    pub name: &'static str,
    /// Classification of the window.
    pub kind: PhaseKind,
    /// Nesting depth, 0 for top-level windows.
    pub level: usize,
    /// When the window opened.
    pub start: Instant,
    /// When the window closed.
    pub end: Instant,
}

impl PhaseRecord {
    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// The closed windows of one cycle, in the order they closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimePartitions {
    records: Vec<PhaseRecord>,
}

impl TimePartitions {
    /// All closed windows.
    #[must_use]
    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    fn of_kind(&self, kind: PhaseKind) -> impl Iterator<Item = &PhaseRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    /// Total time application threads were stopped.
    #[must_use]
    pub fn sum_of_pauses(&self) -> Duration {
        self.of_kind(PhaseKind::Pause).map(PhaseRecord::duration).sum()
    }

    /// Longest single pause.
    #[must_use]
    pub fn longest_pause(&self) -> Duration {
        self.of_kind(PhaseKind::Pause)
            .map(PhaseRecord::duration)
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Number of pauses.
    #[must_use]
    pub fn num_pauses(&self) -> usize {
        self.of_kind(PhaseKind::Pause).count()
    }

    /// Total time spent in concurrent windows.
    #[must_use]
    pub fn concurrent_time(&self) -> Duration {
        self.of_kind(PhaseKind::Concurrent)
            .map(PhaseRecord::duration)
            .sum()
    }
}

#[derive(Debug)]
struct OpenRecord {
    name: &'static str,
    kind: PhaseKind,
    start: Instant,
}

#[derive(Debug, Default)]
struct TimerState {
    gc_start: Option<Instant>,
    gc_end: Option<Instant>,
    open: Vec<OpenRecord>,
    partitions: TimePartitions,
}

impl TimerState {
    const fn in_cycle(&self) -> bool {
        self.gc_start.is_some() && self.gc_end.is_none()
    }
}

/// The timer collaborator.
///
/// Only the coordinating thread writes it; the lock is uncontended and only
/// there so the heap can be shared.
///
/// Windows are kept in the partitions only while a cycle is open, between
/// [`GcTimer::register_gc_start`] and [`GcTimer::register_gc_end`]. Windows
/// closed outside a cycle are still paired but not stored.
///
/// The end and close methods run from guard teardown and never panic; an
/// unbalanced window is logged as a warning.
#[derive(Debug, Default)]
pub struct GcTimer {
    state: Mutex<TimerState>,
}

impl GcTimer {
    /// A timer with no cycle recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a cycle, discarding the previous cycle's partitions.
    pub fn register_gc_start(&self) {
        let mut state = self.state.lock();
        *state = TimerState {
            gc_start: Some(Instant::now()),
            ..TimerState::default()
        };
    }

    /// End the cycle.
    pub fn register_gc_end(&self) {
        let mut state = self.state.lock();
        if !state.open.is_empty() {
            log_timer_windows_left_open(state.open.len());
            state.open.clear();
        }
        state.gc_end = Some(Instant::now());
    }

    /// When the current cycle started.
    #[must_use]
    pub fn gc_start(&self) -> Option<Instant> {
        self.state.lock().gc_start
    }

    /// When the current cycle ended.
    #[must_use]
    pub fn gc_end(&self) -> Option<Instant> {
        self.state.lock().gc_end
    }

    /// Open a stop-the-world window.
    pub fn register_pause_start(&self, title: &'static str) {
        self.open(title, PhaseKind::Pause, Instant::now());
    }

    /// Close the innermost window, which must be a pause.
    pub fn register_pause_end(&self) {
        self.close(PhaseKind::Pause, Instant::now());
    }

    /// Open a concurrent window.
    pub fn register_concurrent_start(&self, title: &'static str) {
        self.open(title, PhaseKind::Concurrent, Instant::now());
    }

    /// Close the innermost window, which must be concurrent.
    pub fn register_concurrent_end(&self) {
        self.close(PhaseKind::Concurrent, Instant::now());
    }

    /// Open a sub-phase window at `at`.
    pub fn register_phase_start(&self, name: &'static str, at: Instant) {
        self.open(name, PhaseKind::SubPhase, at);
    }

    /// Close the innermost sub-phase window at `at`.
    pub fn register_phase_end(&self, at: Instant) {
        self.close(PhaseKind::SubPhase, at);
    }

    /// Snapshot of the windows closed so far in this cycle.
    #[must_use]
    pub fn time_partitions(&self) -> TimePartitions {
        self.state.lock().partitions.clone()
    }

    fn open(&self, name: &'static str, kind: PhaseKind, start: Instant) {
        self.state.lock().open.push(OpenRecord { name, kind, start });
    }

    fn close(&self, kind: PhaseKind, end: Instant) {
        let mut state = self.state.lock();
        let Some(open) = state.open.pop() else {
            log_timer_mismatch(kind.label(), None);
            return;
        };
        if open.kind != kind {
            log_timer_mismatch(kind.label(), Some(open.kind.label()));
        }
        if !state.in_cycle() {
            return;
        }
        let level = state.open.len();
        state.partitions.records.push(PhaseRecord {
            name: open.name,
            kind: open.kind,
            level,
            start: open.start,
            end,
        });
    }
}
