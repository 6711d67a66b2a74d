//! The bundle of timing and tracing state a heap owns.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::manager::MemoryManager;
use crate::sink::TraceSink;
use crate::stack::PhaseState;
use crate::timer::GcTimer;
use crate::timings::PhaseTimings;
use crate::tracer::GcTracer;

/// Runtime switches for the instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentationConfig {
    /// Emit a trace event for every finished worker session.
    pub worker_events: bool,
    /// Log a one-line summary when a cycle session ends.
    pub log_cycle_summary: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            worker_events: true,
            log_cycle_summary: true,
        }
    }
}

impl InstrumentationConfig {
    /// Enable or disable worker session events.
    #[must_use]
    pub const fn with_worker_events(mut self, enabled: bool) -> Self {
        self.worker_events = enabled;
        self
    }

    /// Enable or disable the cycle summary log line.
    #[must_use]
    pub const fn with_cycle_summary(mut self, enabled: bool) -> Self {
        self.log_cycle_summary = enabled;
        self
    }
}

/// Phase state, aggregator, timer, tracer and memory managers of one heap.
#[derive(Debug)]
pub struct Instrumentation {
    phase_state: PhaseState,
    timings: PhaseTimings,
    timer: GcTimer,
    tracer: GcTracer,
    cycle_manager: MemoryManager,
    pause_manager: MemoryManager,
    concurrent_manager: MemoryManager,
    config: Mutex<InstrumentationConfig>,
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::with_tracer(GcTracer::default())
    }
}

impl Instrumentation {
    /// Instrumentation sending trace events to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self::with_tracer(GcTracer::new(sink))
    }

    fn with_tracer(tracer: GcTracer) -> Self {
        Self {
            phase_state: PhaseState::new(),
            timings: PhaseTimings::new(),
            timer: GcTimer::new(),
            tracer,
            cycle_manager: MemoryManager::new("GC Cycles"),
            pause_manager: MemoryManager::new("GC Pauses"),
            concurrent_manager: MemoryManager::new("GC Concurrent Phases"),
            config: Mutex::new(InstrumentationConfig::default()),
        }
    }

    /// The current-phase cell.
    #[inline]
    #[must_use]
    pub const fn phase_state(&self) -> &PhaseState {
        &self.phase_state
    }

    /// The phase-duration aggregator.
    #[inline]
    #[must_use]
    pub const fn phase_timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// The cycle timer.
    #[inline]
    #[must_use]
    pub const fn timer(&self) -> &GcTimer {
        &self.timer
    }

    /// The tracer.
    #[inline]
    #[must_use]
    pub const fn tracer(&self) -> &GcTracer {
        &self.tracer
    }

    /// Statistics of whole cycles.
    #[inline]
    #[must_use]
    pub const fn cycle_memory_manager(&self) -> &MemoryManager {
        &self.cycle_manager
    }

    /// Statistics of stop-the-world pauses.
    #[inline]
    #[must_use]
    pub const fn pause_memory_manager(&self) -> &MemoryManager {
        &self.pause_manager
    }

    /// Statistics of concurrent phases.
    #[inline]
    #[must_use]
    pub const fn concurrent_memory_manager(&self) -> &MemoryManager {
        &self.concurrent_manager
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> InstrumentationConfig {
        *self.config.lock()
    }

    /// Replace the configuration.
    pub fn set_config(&self, config: InstrumentationConfig) {
        *self.config.lock() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let inst = Instrumentation::default();
        assert_eq!(inst.config(), InstrumentationConfig::default());
        assert!(inst.config().worker_events);

        inst.set_config(InstrumentationConfig::default().with_worker_events(false));
        assert!(!inst.config().worker_events);
        assert!(inst.config().log_cycle_summary);
    }

    #[test]
    fn test_managers_are_distinct() {
        let inst = Instrumentation::default();
        assert_eq!(inst.cycle_memory_manager().name(), "GC Cycles");
        assert_eq!(inst.pause_memory_manager().name(), "GC Pauses");
        assert_eq!(inst.concurrent_memory_manager().name(), "GC Concurrent Phases");
        assert!(!inst.phase_state().is_active());
    }
}
