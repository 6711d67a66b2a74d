//! Integration tests for the `tracing` feature.
//!
//! These tests install a subscriber that writes into a buffer and check that
//! guards and [`LogSink`] produce the expected events.

#![cfg(feature = "tracing")]

use std::io;
use std::sync::{Arc, Mutex};

use rudo_gc_phases::test_util::{SimulatedGeneration, SimulatedHeap};
use rudo_gc_phases::{
    CycleSession, GcCause, GenerationKind, Heap, Instrumentation, LogSink, MemoryUsage,
    PauseGuard, Phase, TraceTime,
};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture<F: FnOnce()>(f: F) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    captured.contents()
}

/// A heap whose trace events go to [`LogSink`].
struct LoggedHeap {
    inst: Instrumentation,
}

impl Heap for LoggedHeap {
    fn instrumentation(&self) -> &Instrumentation {
        &self.inst
    }

    fn usage(&self) -> MemoryUsage {
        MemoryUsage::new(2048, 8192)
    }
}

#[test]
fn test_trace_time_logs_heap_usage() {
    let heap = SimulatedHeap::new(1024 * 1024);
    heap.set_used(4096);

    let output = capture(|| {
        let _scope = TraceTime::new(&heap, "Pause Final Mark", true);
        heap.set_used(1024);
    });

    assert!(output.contains("phase_start"));
    assert!(output.contains("phase_end"));
    assert!(output.contains("Pause Final Mark"));
    assert!(output.contains("before=4K(1024K)"));
    assert!(output.contains("after=1K(1024K)"));
}

#[test]
fn test_trace_time_without_usage() {
    let heap = SimulatedHeap::default();

    let output = capture(|| {
        let _scope = TraceTime::new(&heap, "Concurrent marking", false);
    });

    assert!(output.contains("phase_end"));
    assert!(output.contains("elapsed_ms"));
    assert!(!output.contains("before="));
}

#[test]
fn test_cycle_logs_start_and_summary() {
    let heap = SimulatedHeap::default();
    let _binding = heap.instrumentation().phase_state().bind_coordinator();
    let young = SimulatedGeneration::new(GenerationKind::Young);

    let output = capture(|| {
        let _cycle = CycleSession::new(&heap, GcCause::Periodic, &young);
        let _pause = PauseGuard::new(&heap, "Pause Init Mark", Phase::InitMark, false);
    });

    assert!(output.contains("cycle_start"));
    assert!(output.contains("Periodic"));
    assert!(output.contains("cycle_end"));
    assert!(output.contains("pauses=1"));
}

#[test]
fn test_log_sink_forwards_cycle_events() {
    let heap = LoggedHeap {
        inst: Instrumentation::new(Arc::new(LogSink)),
    };
    let _binding = heap.instrumentation().phase_state().bind_coordinator();
    let old = SimulatedGeneration::new(GenerationKind::Old);

    let output = capture(|| {
        let _cycle = CycleSession::new(&heap, GcCause::Explicit, &old);
    });

    assert!(output.contains("gc_cycle_start"));
    assert!(output.contains("heap_summary"));
    assert!(output.contains("reference_stats"));
    assert!(output.contains("gc_cycle_end"));
    assert!(output.contains("memory_manager_end"));
    assert!(output.contains("GC Cycles"));
}

#[test]
fn test_events_nest_under_title_span() {
    let heap = SimulatedHeap::default();
    let inst = heap.instrumentation();
    let _binding = inst.phase_state().bind_coordinator();

    let output = capture(|| {
        let _pause = PauseGuard::new(&heap, "Pause Final Mark", Phase::FinalMark, false);
        tracing::debug!("finishing marking");
    });

    let nested = output
        .lines()
        .find(|line| line.contains("finishing marking"))
        .unwrap();
    assert!(nested.contains("gc_title"));
    assert!(nested.contains("Pause Final Mark"));

    let after = capture(|| tracing::debug!("after the pause"));
    assert!(!after.contains("gc_title"));
}
