//! Tests for the implicit phase stack driven by guards.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use rudo_gc_phases::test_util::{SimulatedGeneration, SimulatedHeap};
use rudo_gc_phases::{
    CycleSession, GcCause, GenerationKind, Heap, PauseGuard, Phase, PhaseGuard, PhaseStack,
    INVALID_PHASE,
};

#[test]
fn test_nested_guards_restore_parent() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let state = inst.phase_state();
    let _binding = state.bind_coordinator();

    assert_eq!(state.current(), None);
    {
        let _pause = PauseGuard::new(&heap, "Pause Final Mark", Phase::FinalMark, false);
        assert_eq!(state.current(), Some(Phase::FinalMark));
        {
            let _finish = PhaseGuard::new(inst, Phase::FinishMark);
            assert_eq!(state.current(), Some(Phase::FinishMark));
        }
        assert_eq!(state.current(), Some(Phase::FinalMark));
        {
            let _evac = PhaseGuard::new(inst, Phase::ChooseCollectionSet);
            assert_eq!(state.current(), Some(Phase::ChooseCollectionSet));
        }
        assert_eq!(state.current(), Some(Phase::FinalMark));
    }
    assert_eq!(state.current(), None);
    assert_eq!(state.current_raw(), INVALID_PHASE);
}

#[test]
fn test_unwinding_restores_phase() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let state = inst.phase_state();
    let _binding = state.bind_coordinator();

    let _pause = PauseGuard::new(&heap, "Pause Full", Phase::FullGc, false);
    let result = catch_unwind(AssertUnwindSafe(|| {
        let _mark = PhaseGuard::new(inst, Phase::FullGcMark);
        let _roots = PhaseGuard::new(inst, Phase::FullGcCalculateAddresses);
        panic!("marking failed");
    }));

    assert!(result.is_err());
    assert_eq!(state.current(), Some(Phase::FullGc));
    assert!(inst.phase_timings().cycle_time(Phase::FullGcMark).is_some());
    assert!(inst.phase_timings().cycle_time(Phase::FullGcCalculateAddresses).is_some());
}

#[test]
fn test_each_phase_records_its_own_duration() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let _binding = inst.phase_state().bind_coordinator();

    {
        let _outer = PhaseGuard::new(inst, Phase::ConcEvac);
        std::thread::sleep(Duration::from_millis(2));
        {
            let _inner = PhaseGuard::new(inst, Phase::ConcUpdateRefs);
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let timings = inst.phase_timings();
    let outer = timings.cycle_time(Phase::ConcEvac).unwrap();
    let inner = timings.cycle_time(Phase::ConcUpdateRefs).unwrap();
    assert!(inner >= Duration::from_millis(1));
    assert!(outer >= inner + Duration::from_millis(2));
}

#[test]
fn test_aggregated_frames_accumulate() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let _binding = inst.phase_state().bind_coordinator();

    for _ in 0..3 {
        let _frame = PhaseStack::new(inst, Phase::ConcMark, true);
        std::thread::sleep(Duration::from_millis(1));
    }

    let total = inst.phase_timings().cycle_time(Phase::ConcMark).unwrap();
    assert!(total >= Duration::from_millis(3));
}

#[test]
fn test_workers_observe_coordinator_phase() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let state = inst.phase_state();
    let _binding = state.bind_coordinator();

    let _mark = PhaseGuard::new(inst, Phase::ConcMark);
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                assert_eq!(state.current(), Some(Phase::ConcMark));
                assert!(!state.is_coordinator());
            });
        }
    });
}

#[test]
fn test_worker_thread_cannot_open_phase() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let _binding = inst.phase_state().bind_coordinator();

    std::thread::scope(|s| {
        let result = s
            .spawn(|| {
                let _guard = PhaseGuard::new(inst, Phase::ConcMark);
            })
            .join();
        assert!(result.is_err());
    });
    assert_eq!(inst.phase_state().current(), None);
}

#[test]
fn test_reopened_sub_phase_restores_parent() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let state = inst.phase_state();
    let _binding = state.bind_coordinator();
    let young = SimulatedGeneration::new(GenerationKind::Young);

    let _cycle = CycleSession::new(&heap, GcCause::AllocationFailure, &young);
    let _pause = PauseGuard::new(&heap, "Pause Final Mark", Phase::FinalMark, false);
    {
        let _first = PhaseGuard::new(inst, Phase::FinishMark);
    }
    assert_eq!(state.current(), Some(Phase::FinalMark));

    let second = catch_unwind(AssertUnwindSafe(|| {
        let _second = PhaseGuard::new(inst, Phase::FinishMark);
        std::thread::sleep(Duration::from_millis(1));
    }));

    assert!(second.is_ok());
    assert_eq!(state.current(), Some(Phase::FinalMark));
    let recorded = inst.phase_timings().cycle_time(Phase::FinishMark).unwrap();
    assert!(recorded >= Duration::from_millis(1));
}

#[test]
fn test_reopened_phase_unwinds_cleanly() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let state = inst.phase_state();
    let _binding = state.bind_coordinator();

    {
        let _first = PhaseGuard::new(inst, Phase::ConcEvac);
    }
    let result = catch_unwind(AssertUnwindSafe(|| {
        let _second = PhaseGuard::new(inst, Phase::ConcEvac);
        panic!("evacuation failed");
    }));

    assert!(result.is_err());
    assert_eq!(state.current(), None);
    assert_eq!(state.current_raw(), INVALID_PHASE);
}

#[test]
fn test_guards_outside_cycle_keep_no_partitions() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let _binding = inst.phase_state().bind_coordinator();

    for _ in 0..16 {
        let _pause = PauseGuard::new(&heap, "Pause Init Mark", Phase::InitMark, false);
        let _roots = PhaseGuard::new(inst, Phase::InitScanRoots);
    }

    assert!(inst.timer().time_partitions().records().is_empty());
    assert_eq!(inst.pause_memory_manager().collection_count(), 16);
}
