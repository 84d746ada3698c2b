//! Integration test: ledger bookkeeping under a simulated render loop.
//!
//! Drives the cache ledger the way the frame scheduler does — submissions
//! stamped with increasing serials, completion observed one ring-length
//! later — and checks that resources are never freed while a submission
//! that references them is still in flight.

use prism_cache::{CacheLedger, ResourceHandle};

const RING_SIZE: u64 = 2;

/// A payload that records its own destruction.
struct Tracked {
    id: u32,
}

#[test]
fn test_resource_outlives_every_referencing_submission() {
    let mut ledger: CacheLedger<String, Tracked> = CacheLedger::new();

    let handle = ledger.insert("mesh-buffer".to_string(), Tracked { id: 1 });

    // Ten frames; every frame references the resource. Completion lags by
    // the ring size, exactly like slot-fence retirement.
    for frame in 1..=10u64 {
        ledger.mark_used(handle, frame).unwrap();

        if frame > RING_SIZE {
            let completed = frame - RING_SIZE;
            let destroyed = ledger.retire(completed);
            assert!(
                destroyed.is_empty(),
                "resource destroyed at frame {frame} while still referenced"
            );
        }

        assert_eq!(ledger.get(handle).map(|t| t.id), Some(1));
    }

    // The user releases; frames 9 and 10 are still in flight.
    ledger.release(handle).unwrap();
    assert!(ledger.retire(8).is_empty());
    assert!(ledger.retire(9).is_empty());

    // Final frame completes: now, and only now, the resource goes.
    let destroyed = ledger.retire(10);
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].id, 1);
    assert!(ledger.get(handle).is_none());
}

#[test]
fn test_memoization_survives_frames_and_ends_at_eviction() {
    let mut ledger: CacheLedger<String, Tracked> = CacheLedger::new();

    let first = ledger.insert("extent-image".to_string(), Tracked { id: 1 });

    // Same descriptor across several frames: identical handle every time.
    for frame in 1..=5u64 {
        let again = ledger
            .acquire_existing(&"extent-image".to_string())
            .expect("memo entry vanished");
        assert_eq!(again, first);
        ledger.mark_used(first, frame).unwrap();
        ledger.release(again).unwrap();
    }

    // Resize: evict extent-sized resources. The epoch for that key ends.
    let marked = ledger.evict(|key| key == "extent-image");
    assert_eq!(marked, 1);
    assert!(ledger.acquire_existing(&"extent-image".to_string()).is_none());

    // A rebuilt resource gets a distinct handle while the old one drains.
    let second = ledger.insert("extent-image".to_string(), Tracked { id: 2 });
    assert_ne!(first, second);

    // The old image is destroyed only after its last referencing frame.
    assert!(ledger.retire(4).is_empty());
    let destroyed = ledger.retire(5);
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].id, 1);

    // The new one is untouched.
    assert_eq!(ledger.get(second).map(|t| t.id), Some(2));
}

#[test]
fn test_shutdown_drain_frees_everything_in_order() {
    let mut ledger: CacheLedger<String, Tracked> = CacheLedger::new();

    let a: ResourceHandle = ledger.insert("a".to_string(), Tracked { id: 1 });
    let b: ResourceHandle = ledger.insert("b".to_string(), Tracked { id: 2 });

    // Two frames in flight at shutdown, each referencing both resources.
    ledger.mark_used(a, 1).unwrap();
    ledger.mark_used(b, 1).unwrap();
    ledger.mark_used(a, 2).unwrap();
    ledger.mark_used(b, 2).unwrap();
    ledger.release(a).unwrap();
    ledger.release(b).unwrap();

    // Nothing may be freed before the drain observes both fences.
    assert!(ledger.retire(0).is_empty());
    assert!(ledger.retire(1).is_empty());

    // Drain complete: everything goes at once.
    let destroyed = ledger.retire(2);
    assert_eq!(destroyed.len(), 2);
    assert!(ledger.is_empty());
}
