//! Integration Tests for Reactive System
//!
//! These tests verify that signals, computed signals, effects, batches and
//! untracked reads work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pulse_core::reactive::{
    batch, computed, computed_with, derived, effect, effect_with, signal, untrack, Runtime,
};

/// Signal, effect, dispose: the effect records every write until disposed.
#[test]
fn effect_records_writes_until_disposed() {
    let s = signal(1);
    let results = Arc::new(Mutex::new(Vec::new()));

    let (s_clone, results_clone) = (s.clone(), results.clone());
    let stop = effect(move |_previous: Option<i32>| {
        results_clone.lock().push(s_clone.get());
        s_clone.get()
    });
    assert_eq!(*results.lock(), vec![1]);

    s.set(5);
    assert_eq!(*results.lock(), vec![1, 5]);

    stop.dispose();
    s.set(9);
    assert_eq!(*results.lock(), vec![1, 5]);
}

/// An effect reruns once per write to any cell it read last time, and never
/// for a cell it stopped reading.
#[test]
fn effect_follows_dynamic_dependencies() {
    let use_first = signal(true);
    let first = signal("a");
    let second = signal("b");
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (use_first_clone, first_clone, second_clone, seen_clone) =
        (use_first.clone(), first.clone(), second.clone(), seen.clone());
    let watcher = effect(move |_: Option<()>| {
        let value = if use_first_clone.get() {
            first_clone.get()
        } else {
            second_clone.get()
        };
        seen_clone.lock().push(value);
    });

    second.set("b2");
    assert_eq!(watcher.run_count(), 1);

    first.set("a2");
    use_first.set(false);
    assert_eq!(watcher.dependency_count(), 2);

    first.set("a3");
    second.set("b3");
    assert_eq!(*seen.lock(), vec!["a", "a2", "b2", "b3"]);
}

/// Writes in one batch cause one run that sees the final values.
#[test]
fn batch_coalesces_writes() {
    let a = signal(0);
    let b = signal(0);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (a_clone, b_clone, seen_clone) = (a.clone(), b.clone(), seen.clone());
    let watcher = effect(move |_: Option<()>| {
        seen_clone.lock().push((a_clone.get(), b_clone.get()));
    });

    batch(|| {
        a.set(1);
        b.set(2);
        assert!(Runtime::is_batching());
    });

    assert_eq!(watcher.run_count(), 2);
    assert_eq!(*seen.lock(), vec![(0, 0), (1, 2)]);
}

/// Writes outside a batch still notify synchronously.
#[test]
fn batch_does_not_affect_later_writes() {
    let x = signal(10);
    let runs = Arc::new(AtomicI32::new(0));

    let (x_clone, runs_clone) = (x.clone(), runs.clone());
    let _watcher = effect(move |_: Option<()>| {
        x_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    x.set(20);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    batch(|| x.set(30));
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    x.set(40);
    assert_eq!(runs.load(Ordering::SeqCst), 4);
}

/// `untrack` reads do not subscribe the surrounding effect.
#[test]
fn untracked_reads_are_ignored() {
    let a = signal(1);
    let b = signal(2);
    let sum = Arc::new(AtomicI32::new(0));

    let (a_clone, b_clone, sum_clone) = (a.clone(), b.clone(), sum.clone());
    let watcher = effect(move |_: Option<()>| {
        sum_clone.store(untrack(|| a_clone.get()) + b_clone.get(), Ordering::SeqCst);
    });
    assert_eq!(sum.load(Ordering::SeqCst), 3);

    a.set(10);
    assert_eq!(watcher.run_count(), 1);
    assert_eq!(sum.load(Ordering::SeqCst), 3);

    b.set(5);
    assert_eq!(watcher.run_count(), 2);
    assert_eq!(sum.load(Ordering::SeqCst), 15);
}

/// Untracking applies to everything nested inside the closure, including
/// computed signals read there.
#[test]
fn untrack_covers_nested_reads() {
    let a = signal(1);
    let a_clone = a.clone();
    let doubled = computed(move |_| a_clone.get() * 2);

    let doubled_signal = doubled.signal();
    let watcher = effect(move |_: Option<i32>| untrack(|| doubled_signal.get() + 1));

    a.set(2);
    assert_eq!(doubled.get(), 4);
    assert_eq!(watcher.run_count(), 1);
}

/// A computed value is readable immediately and freezes after `clear`.
#[test]
fn computed_lifecycle() {
    let a = signal(1);
    let b = signal(2);
    let (a_clone, b_clone) = (a.clone(), b.clone());
    let sum = derived(move |_| a_clone.get() + b_clone.get());
    assert_eq!(sum.get(), 3);

    batch(|| {
        a.set(10);
        b.set(20);
    });
    assert_eq!(sum.get(), 30);
    assert_eq!(sum.run_count(), 2);

    sum.clear();
    a.set(0);
    assert_eq!(sum.get(), 30);
}

/// Effects created inside a running effect are tracked on their own and owned
/// by the outer effect, which keeps tracking what it reads after creating
/// them and releases them before it runs again.
#[test]
fn nested_effects_restore_outer_context() {
    let outer_source = signal(0);
    let inner_source = signal(0);
    let inner_runs = Arc::new(AtomicI32::new(0));

    let (outer_clone, inner_clone, inner_runs_clone) =
        (outer_source.clone(), inner_source.clone(), inner_runs.clone());
    let outer = effect(move |_: Option<()>| {
        let inner_source = inner_clone.clone();
        let inner_runs = inner_runs_clone.clone();
        if outer_clone.get_untracked() == 0 {
            let _inner = effect(move |_: Option<()>| {
                inner_source.get();
                inner_runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        outer_clone.get();
    });

    assert_eq!(outer.dependency_count(), 1);
    assert_eq!(inner_source.subscriber_count(), 1);

    inner_source.set(1);
    assert_eq!(inner_runs.load(Ordering::SeqCst), 2);
    assert_eq!(outer.run_count(), 1);

    outer_source.set(1);
    assert_eq!(outer.run_count(), 2);
    assert_eq!(inner_source.subscriber_count(), 0);
}

/// Dropping every handle releases the effect and, with it, the cells its
/// handler captured.
#[test]
fn dropped_effect_releases_captured_signals() {
    let source = signal(1);
    let runs = Arc::new(AtomicI32::new(0));

    let (source_clone, runs_clone) = (source.clone(), runs.clone());
    let watcher = effect(move |_: Option<()>| {
        source_clone.get();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(source.subscriber_count(), 1);

    drop(watcher);
    assert_eq!(source.subscriber_count(), 0);
    source.set(2);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Effects with a seed accumulate across runs.
#[test]
fn effect_with_accumulates() {
    let step = signal(1);
    let total = Arc::new(AtomicI32::new(0));

    let (step_clone, total_clone) = (step.clone(), total.clone());
    let _summer = effect_with(100, move |sum| {
        let next = sum + step_clone.get();
        total_clone.store(next, Ordering::SeqCst);
        next
    });

    step.set(2);
    step.set(3);
    assert_eq!(total.load(Ordering::SeqCst), 106);
}

/// Derived values built on a seed see their own previous value.
#[test]
fn computed_with_counts_changes() {
    let source = signal("x");
    let source_clone = source.clone();
    let changes = computed_with(0usize, move |count| {
        source_clone.get();
        count + 1
    });

    source.set("y");
    source.set("y");
    assert_eq!(changes.get(), 3);
}
