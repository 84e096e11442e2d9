//! End-to-end tests against the public façade (`cached`/`cached_with_buffers`),
//! exercising the literal scenarios in `spec.md` §8.

use std::cell::Cell;
use std::rc::Rc;

use cachetape::cached;
use proptest::prelude::*;

fn leaked_bytes(n: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; n].into_boxed_slice())
}

#[test]
fn side_effect_once_guarantee() {
    let calls = Rc::new(Cell::new(0u32));
    let calls_inner = Rc::clone(&calls);
    let producer = (0..42).inspect(move |_| calls_inner.set(calls_inner.get() + 1));

    let cursor = cached(producer, 8);
    let mut window: Vec<i32> = Vec::new();
    cursor.for_each_until(|&v| {
        window.push(v);
        if window.len() > 3 {
            window.remove(0);
        }
        assert!(!window.contains(&43));
        true
    });

    assert_eq!(calls.get(), 42);
}

#[test]
fn random_access_over_a_one_pass_producer() {
    let words = "monday,tuesday,wednesday,thursday,friday,saturday,sunday";
    let cursor = cached(words.split(','), 4);

    assert_eq!(*cursor.index(2), "wednesday");
    assert_eq!(*cursor.index(1), "tuesday");
    cursor.pop_front();
    cursor.pop_front();
    cursor.pop_front();
    assert_eq!(*cursor.index(0), "thursday");
}

#[test]
fn sliding_window_without_heap_allocation() {
    let bufs = vec![leaked_bytes(64), leaked_bytes(64)];
    let producer = std::iter::repeat(0u32);
    let cursor = cachetape::cached_with_buffers(producer, bufs);

    for _ in 0..(117 * 16) {
        let _ = cursor.front();
        cursor.pop_front();
    }

    let stats = cursor.statistics();
    assert_eq!(stats.heap_allocations, 0);
}

#[test]
fn multi_cursor_pinning() {
    let cursor = cached(0..10_000u32, 100);
    let pinned = cursor.save();
    let extras: Vec<_> = (0..2).map(|_| cursor.save()).collect();

    for c in extras {
        while !c.empty() {
            c.pop_front();
        }
    }
    while !cursor.empty() {
        cursor.pop_front();
    }

    assert_eq!(pinned.length(), 10_000);

    while !pinned.empty() {
        pinned.pop_front();
    }
    let stats = pinned.statistics();
    assert!(stats.leading_drop_runs > 0);
    assert!(stats.dropped_elements > 0);
    assert_eq!(stats.compaction_runs, 0);
}

#[test]
fn identity_of_element_storage_under_lazy_evaluation() {
    // Each producer call appends to `v` and snapshots its capacity; driving
    // the cursor through a sliding window, a filter and a map must apply
    // that side effect exactly once per element even though none of the
    // downstream combinators touch `v` directly.
    let v: Rc<std::cell::RefCell<Vec<i64>>> = Rc::new(std::cell::RefCell::new(Vec::new()));
    let v_inner = Rc::clone(&v);
    let producer = (0..1000i64).map(move |i| {
        v_inner.borrow_mut().push(i);
        v_inner.borrow().capacity()
    });

    let cursor = cached(producer, 32);
    let mut window: Vec<usize> = Vec::new();
    let mut distinct_capacities = Vec::new();
    cursor.for_each_until(|&capacity| {
        window.push(capacity);
        if window.len() > 2 {
            window.remove(0);
        }
        if window.len() == 2 && window[0] != window[1] {
            distinct_capacities.push(window[1]);
        }
        true
    });

    assert_eq!(v.borrow().len(), 1000);
    assert!(!distinct_capacities.is_empty());
}

#[test]
fn empty_block_reuse_circularity() {
    let bufs = vec![leaked_bytes(100), leaked_bytes(100)];
    let cursor = cachetape::cached_with_buffers(std::iter::repeat(7u32), bufs);

    for _ in 0..400 {
        let _ = cursor.front();
        cursor.pop_front();
    }

    assert_eq!(cursor.statistics().heap_allocations, 0);
}

proptest! {
    /// Any cursor's observed sequence equals the suffix of the producer
    /// starting at its logical offset, for an arbitrary skip distance and
    /// heap-block sizing.
    #[test]
    fn cursor_observes_producer_suffix(
        values in prop::collection::vec(any::<u16>(), 0..200),
        heap_hint in 1usize..32,
        skip in 0usize..200,
    ) {
        let skip = skip.min(values.len());
        let cursor = cached(values.clone().into_iter(), heap_hint);
        for _ in 0..skip {
            cursor.pop_front();
        }

        let mut observed = Vec::new();
        cursor.for_each_until(|&v| {
            observed.push(v);
            true
        });

        prop_assert_eq!(observed, &values[skip..]);
    }
}
