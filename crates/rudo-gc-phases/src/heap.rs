//! Interfaces the instrumentation consumes from the collector.
//!
//! The heap owns an [`Instrumentation`] bundle and answers usage queries;
//! generations report reference-processing statistics. Neither is
//! implemented here beyond the simulated versions in `test_util`.

use std::fmt;

use crate::instrumentation::Instrumentation;

/// Why a collection cycle was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GcCause {
    /// No collection; used for records that are not tied to a cycle.
    #[default]
    NoGc,
    /// An allocation could not be satisfied.
    AllocationFailure,
    /// Heuristics decided free memory is running low.
    ConcurrentGc,
    /// An idle timer expired.
    Periodic,
    /// Explicitly requested by the application.
    Explicit,
    /// Requested to update or unload metadata.
    Metadata,
    /// A concurrent cycle could not keep up and degenerated into a pause.
    Degenerated,
}

impl GcCause {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoGc => "No GC",
            Self::AllocationFailure => "Allocation Failure",
            Self::ConcurrentGc => "Concurrent GC",
            Self::Periodic => "Periodic GC",
            Self::Explicit => "Explicit GC",
            Self::Metadata => "Metadata GC Threshold",
            Self::Degenerated => "Degenerated GC",
        }
    }
}

impl fmt::Display for GcCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which part of the heap a cycle collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
    /// Young objects only.
    Young,
    /// Old objects only.
    Old,
    /// The whole heap in generational mode.
    Global,
    /// The whole heap, no generations.
    NonGenerational,
}

impl GenerationKind {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Young => "Young",
            Self::Old => "Old",
            Self::Global => "Global",
            Self::NonGenerational => "Non-Generational",
        }
    }
}

/// A snapshot of heap occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Bytes occupied by objects.
    pub used: usize,
    /// Bytes backed by memory.
    pub committed: usize,
}

impl MemoryUsage {
    /// Create a snapshot.
    #[must_use]
    pub const fn new(used: usize, committed: usize) -> Self {
        Self { used, committed }
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}K({}K)", self.used / 1024, self.committed / 1024)
    }
}

/// Reference-processing statistics gathered by a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceStats {
    /// Soft references discovered.
    pub soft: usize,
    /// Weak references discovered.
    pub weak: usize,
    /// Final references discovered.
    pub final_refs: usize,
    /// Phantom references discovered.
    pub phantom: usize,
}

/// The generation a cycle is collecting.
pub trait Generation: Sync {
    /// Which part of the heap this generation covers.
    fn kind(&self) -> GenerationKind;

    /// Reference-processing statistics of the current cycle.
    fn reference_stats(&self) -> ReferenceStats;
}

/// The heap being collected.
///
/// Only [`Heap::instrumentation`] and [`Heap::usage`] are required; the
/// notification hooks default to doing nothing.
pub trait Heap: Sync {
    /// The timing and tracing bundle owned by this heap.
    fn instrumentation(&self) -> &Instrumentation;

    /// Current occupancy.
    fn usage(&self) -> MemoryUsage;

    /// Highest occupancy since the cycle started.
    fn peak_usage(&self) -> MemoryUsage {
        self.usage()
    }

    /// Cause of the cycle in progress, for records opened inside it.
    fn gc_cause(&self) -> GcCause {
        GcCause::NoGc
    }

    /// A cycle for `generation` is starting.
    fn on_cycle_start(&self, cause: GcCause, generation: &dyn Generation) {
        let _ = (cause, generation);
    }

    /// The cycle for `generation` has finished.
    fn on_cycle_end(&self, generation: &dyn Generation) {
        let _ = generation;
    }
}
