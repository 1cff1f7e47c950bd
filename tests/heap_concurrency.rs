//! Multi-threaded stress tests for both heap variants.
//!
//! These exercise the interleavings the single-threaded suites cannot:
//! concurrent inserts spreading over disjoint paths, removals stealing
//! in-flight insertions, and eviction under capacity pressure. Every
//! test doubles as a no-deadlock check — it either terminates or hangs.

use std::sync::Arc;
use std::thread;

use rand::Rng;

use streamsieve::heap::{CoarseHeap, MinMaxHeap, SubtreeHeap};
use streamsieve::Item;

fn variants(capacity: usize) -> Vec<(&'static str, Arc<dyn MinMaxHeap>)> {
    vec![
        ("coarse", Arc::new(CoarseHeap::new(capacity))),
        ("subtree", Arc::new(SubtreeHeap::new(capacity))),
    ]
}

/// Spec seed scenario: 8 threads insert 2^18 random scores into a heap
/// of capacity 2^17 - 1; afterwards the heap is exactly full and drains
/// in non-increasing order.
#[test]
fn concurrent_over_capacity_insert() {
    let capacity = (1 << 17) - 1;
    let threads = 8;
    let per_thread = (1 << 18) / threads;

    for (name, heap) in variants(capacity) {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let heap = Arc::clone(&heap);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for _ in 0..per_thread {
                        assert!(heap.insert(Item::from_score(rng.gen())));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("insert thread panicked");
        }

        assert_eq!(heap.len(), capacity, "{name}");
        assert!(heap.is_full(), "{name}");

        let mut last = f32::INFINITY;
        let mut drained = 0usize;
        while let Some(item) = heap.remove_max() {
            assert!(last >= item.score, "{name}: drain not non-increasing");
            last = item.score;
            drained += 1;
        }
        assert_eq!(drained, capacity, "{name}");
    }
}

/// With capacity above the total insert count nothing is ever evicted,
/// so the multiset drained by concurrent consumers plus the final drain
/// must be exactly the multiset produced.
#[test]
fn no_items_lost_or_duplicated() {
    let producers = 4;
    let consumers = 2;
    let per_producer = 3_000usize;
    let total = producers * per_producer;

    for (name, heap) in variants(total) {
        let mut handles = Vec::new();
        for p in 0..producers {
            let heap = Arc::clone(&heap);
            handles.push(thread::spawn(move || {
                for k in 0..per_producer {
                    // Distinct scores across all producers.
                    let score = (p * per_producer + k) as f32;
                    assert!(heap.insert(Item::from_score(score)));
                }
                Vec::new()
            }));
        }
        for _ in 0..consumers {
            let heap = Arc::clone(&heap);
            handles.push(thread::spawn(move || {
                let mut removed = Vec::new();
                for _ in 0..per_producer / 2 {
                    if let Some(item) = heap.remove_max() {
                        removed.push(item.score);
                    }
                }
                removed
            }));
        }

        let mut seen: Vec<f32> = handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("thread panicked"))
            .collect();
        while let Some(item) = heap.remove_min() {
            seen.push(item.score);
        }

        assert_eq!(seen.len(), total, "{name}: items lost or duplicated");
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (k, score) in seen.iter().enumerate() {
            assert_eq!(*score, k as f32, "{name}: multiset mismatch at {k}");
        }
    }
}

/// Random mixed operations on a small heap: hits the at-capacity insert,
/// the eviction-cursor scan, and the tiny-heap special cases constantly.
#[test]
fn mixed_ops_on_tiny_heaps() {
    for capacity in [1, 2, 3, 7] {
        for (name, heap) in variants(capacity) {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let heap = Arc::clone(&heap);
                    thread::spawn(move || {
                        let mut rng = rand::thread_rng();
                        for _ in 0..2_000 {
                            match rng.gen_range(0..6) {
                                0 | 1 | 2 => {
                                    heap.insert(Item::from_score(rng.gen()));
                                }
                                3 => {
                                    heap.remove_max();
                                }
                                4 => {
                                    heap.remove_min();
                                }
                                _ => {
                                    let _ = heap.get_max();
                                    let _ = heap.get_min();
                                    let _ = heap.len();
                                }
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().expect("worker panicked");
            }

            assert!(heap.len() <= capacity, "{name} capacity={capacity}");
            let mut last = f32::INFINITY;
            while let Some(item) = heap.remove_max() {
                assert!(last >= item.score, "{name}: post-stress drain unordered");
                last = item.score;
            }
        }
    }
}

/// Mixed operations at a mid-size capacity, with removals racing the
/// in-flight insertions they steal from.
#[test]
fn mixed_ops_under_contention() {
    let capacity = 1023;
    for (name, heap) in variants(capacity) {
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let heap = Arc::clone(&heap);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for _ in 0..4_000 {
                        if worker % 2 == 0 {
                            heap.insert(Item::from_score(rng.gen()));
                        } else {
                            match rng.gen_range(0..3) {
                                0 => {
                                    heap.remove_max();
                                }
                                1 => {
                                    heap.remove_min();
                                }
                                _ => {
                                    heap.insert(Item::from_score(rng.gen()));
                                }
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }

        assert!(heap.len() <= capacity, "{name}");
        let mut last = f32::NEG_INFINITY;
        while let Some(item) = heap.remove_min() {
            assert!(item.score >= last, "{name}: post-stress drain unordered");
            last = item.score;
        }
        assert!(heap.is_empty(), "{name}");
    }
}

/// Readers run concurrently with writers. Coarse readers are
/// snapshot-consistent, so they must always observe min ≤ max; subtree
/// reads are only checked for liveness (the variant is deliberately not
/// linearizable — a large insert can transiently occupy a min-level
/// slot mid-percolation).
#[test]
fn readers_race_writers() {
    for (name, heap) in variants(256) {
        let check_consistency = name == "coarse";
        for k in 0..256 {
            heap.insert(Item::from_score(k as f32));
        }

        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut handles = Vec::new();
        for _ in 0..2 {
            let heap = Arc::clone(&heap);
            let stop = Arc::clone(&stop);
            handles.push(thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let min = heap.get_min();
                    let max = heap.get_max();
                    if check_consistency {
                        if let (Some(min), Some(max)) = (min, max) {
                            assert!(min.score <= max.score, "min above max");
                        }
                    }
                }
            }));
        }

        let mut rng = rand::thread_rng();
        for _ in 0..2_000 {
            heap.insert(Item::from_score(rng.gen::<f32>() * 256.0));
        }
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        for handle in handles {
            handle.join().expect("reader panicked");
        }
        assert_eq!(heap.len(), 256, "{name}");
    }
}
