//! Registry of GC phases.
//!
//! Every timed segment of a collection cycle is identified by a [`Phase`].
//! Phases are small ordinals so that the current phase fits in a single
//! atomic byte and per-phase tables can be plain arrays.

use std::fmt;

/// Declares the phase enum together with its display names.
macro_rules! gc_phases {
    ($($variant:ident => $name:literal,)*) => {
        /// A named, timed segment of collector work.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Phase {
            $(
                #[doc = $name]
                $variant,
            )*
        }

        impl Phase {
            /// All phases in ordinal order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// Human-readable phase name, as used in logs and trace events.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

gc_phases! {
    InitMarkGross => "Pause Init Mark (G)",
    InitMark => "Pause Init Mark (N)",
    InitScanRoots => "Init Scan Roots",
    ConcReset => "Concurrent Reset",
    ConcMarkRoots => "Concurrent Mark Roots",
    ConcMark => "Concurrent Marking",
    FinalMarkGross => "Pause Final Mark (G)",
    FinalMark => "Pause Final Mark (N)",
    FinishMark => "Finish Mark",
    ChooseCollectionSet => "Choose Collection Set",
    ConcWeakRefs => "Concurrent Weak References",
    ConcWeakRoots => "Concurrent Weak Roots",
    ConcCleanupEarly => "Concurrent Cleanup",
    ConcEvac => "Concurrent Evacuation",
    InitUpdateRefsGross => "Pause Init Update Refs (G)",
    InitUpdateRefs => "Pause Init Update Refs (N)",
    ConcUpdateRefs => "Concurrent Update Refs",
    FinalUpdateRefsGross => "Pause Final Update Refs (G)",
    FinalUpdateRefs => "Pause Final Update Refs (N)",
    FinalUpdateRefsRoots => "Update Roots",
    ConcCleanupComplete => "Concurrent Cleanup Complete",
    DegenGcGross => "Pause Degenerated GC (G)",
    DegenGc => "Pause Degenerated GC (N)",
    FullGcGross => "Pause Full GC (G)",
    FullGc => "Pause Full GC (N)",
    FullGcMark => "Full GC Mark",
    FullGcCalculateAddresses => "Full GC Calculate Addresses",
    FullGcAdjustPointers => "Full GC Adjust Pointers",
    FullGcCopyObjects => "Full GC Copy Objects",
}

/// Number of valid phases.
pub const NUM_PHASES: usize = Phase::ALL.len();

/// Raw value meaning "no phase is active".
///
/// Any raw value `>= NUM_PHASES` is invalid; this is the one the phase stack
/// stores.
#[allow(clippy::cast_possible_truncation)]
pub const INVALID_PHASE: u8 = NUM_PHASES as u8;

/// Display name used when a raw phase value does not name a phase.
pub const NO_PHASE_NAME: &str = "<no phase>";

impl Phase {
    /// Ordinal of this phase, in `[0, NUM_PHASES)`.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Raw value as stored in the current-phase cell.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u8 {
        self as u8
    }

    /// Map a raw value back to a phase; `None` for the invalid sentinel
    /// and anything past it.
    #[inline]
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(usize::from(raw)).copied()
    }

    /// Whether application threads are stopped for this phase.
    #[must_use]
    pub const fn is_pause(self) -> bool {
        matches!(
            self,
            Self::InitMarkGross
                | Self::InitMark
                | Self::FinalMarkGross
                | Self::FinalMark
                | Self::InitUpdateRefsGross
                | Self::InitUpdateRefs
                | Self::FinalUpdateRefsGross
                | Self::FinalUpdateRefs
                | Self::DegenGcGross
                | Self::DegenGc
                | Self::FullGcGross
                | Self::FullGc
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name for a raw current-phase value, including the invalid sentinel.
#[must_use]
pub fn phase_name(raw: u8) -> &'static str {
    Phase::from_raw(raw).map_or(NO_PHASE_NAME, Phase::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_match_table() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index(), i);
            assert_eq!(Phase::from_raw(phase.as_raw()), Some(*phase));
        }
    }

    #[test]
    fn test_invalid_sentinel() {
        assert_eq!(usize::from(INVALID_PHASE), NUM_PHASES);
        assert_eq!(Phase::from_raw(INVALID_PHASE), None);
        assert_eq!(Phase::from_raw(u8::MAX), None);
        assert_eq!(phase_name(INVALID_PHASE), NO_PHASE_NAME);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = Phase::ALL.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), NUM_PHASES);
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(Phase::ConcMark.to_string(), "Concurrent Marking");
        assert!(Phase::FinalMark.is_pause());
        assert!(!Phase::ConcEvac.is_pause());
    }
}
