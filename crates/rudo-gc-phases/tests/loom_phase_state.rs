//! Loom tests for the current-phase cell and worker counters.
//!
//! These model the orderings used by the phase stack: the coordinator
//! publishes a phase with a swap and restores the parent with a release
//! store, and workers read it with an acquire load.

use loom::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use loom::sync::Arc;

const NO_PHASE: u8 = u8::MAX;

/// A worker that observes the published phase also observes writes made
/// before it was published.
#[test]
#[ignore = "loom test - run with cargo test loom_phase_publish --release"]
fn test_phase_publish_is_visible_to_worker() {
    loom::model(|| {
        let current = Arc::new(AtomicU8::new(NO_PHASE));
        let prepared = Arc::new(AtomicUsize::new(0));

        let worker = loom::thread::spawn({
            let current = Arc::clone(&current);
            let prepared = Arc::clone(&prepared);
            move || {
                if current.load(Ordering::Acquire) == 3 {
                    assert_eq!(prepared.load(Ordering::Relaxed), 1);
                }
            }
        });

        prepared.store(1, Ordering::Relaxed);
        let parent = current.swap(3, Ordering::AcqRel);
        assert_eq!(parent, NO_PHASE);

        worker.join().unwrap();
    });
}

/// A worker sees either the nested phase or its restored parent, never
/// anything else.
#[test]
#[ignore = "loom test - run with cargo test loom_phase_restore --release"]
fn test_phase_restore_is_atomic() {
    loom::model(|| {
        let current = Arc::new(AtomicU8::new(1));

        let coordinator = loom::thread::spawn({
            let current = Arc::clone(&current);
            move || {
                let parent = current.swap(2, Ordering::AcqRel);
                current.store(parent, Ordering::Release);
            }
        });

        let seen = current.load(Ordering::Acquire);
        assert!(seen == 1 || seen == 2);

        coordinator.join().unwrap();
        assert_eq!(current.load(Ordering::Acquire), 1);
    });
}

/// Concurrent worker dispatches never lose an increment.
#[test]
#[ignore = "loom test - run with cargo test loom_worker_counters --release"]
fn test_worker_counters_are_exact() {
    loom::model(|| {
        let started = Arc::new(AtomicUsize::new(0));
        let ended = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..2)
            .map(|_| {
                let started = Arc::clone(&started);
                let ended = Arc::clone(&ended);
                loom::thread::spawn(move || {
                    started.fetch_add(1, Ordering::Relaxed);
                    ended.fetch_add(1, Ordering::Relaxed);
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(started.load(Ordering::Acquire), 2);
        assert_eq!(ended.load(Ordering::Acquire), 2);
    });
}
