//! Computed Signals
//!
//! A computed signal is a signal whose value is maintained by an owned
//! computation. The computation runs eagerly: the value is available as
//! soon as the computed signal is constructed, and it is recomputed every
//! time a signal read by the handler is written.
//!
//! The handler receives the current value of the cell, which makes
//! accumulating derivations possible:
//!
//! ```rust
//! use pulse_core::reactive::{computed_with, signal};
//!
//! let a = signal(1);
//! let a2 = a.clone();
//! let sum = computed_with(0, move |total| total + a2.get());
//! assert_eq!(sum.get(), 1);
//!
//! a.set(2);
//! assert_eq!(sum.get(), 3);
//! ```
//!
//! After [`Computed::clear`] the value is frozen: the cell keeps its last
//! value and no further writes to the former dependencies reach it.
//!
//! The cell is written through its own setter, so readers of the computed
//! signal are notified like readers of any other signal. The write reads
//! the previous value untracked, so the computation never depends on the
//! cell it maintains.
//!
//! The computation lives as long as the cell: every handle returned by
//! [`Computed::signal`] keeps it running, and the computation itself only
//! refers to the cell weakly.

use std::fmt::Debug;
use std::sync::Arc;

use super::effect::{Computation, Effect};
use super::signal::Signal;

/// A signal maintained by a computation.
#[must_use = "a computed signal stops when its last handle is dropped"]
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
    effect: Effect,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed signal whose handler receives `None` on its first
    /// run and the current value afterwards.
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(Option<T>) -> T + Send + 'static,
    {
        Self::derive(None, handler, |current| Some(current.clone()))
    }

    /// Create a computed signal seeded with `initial`.
    pub fn with_initial<F>(initial: T, handler: F) -> Self
    where
        F: FnMut(T) -> T + Send + 'static,
    {
        Self::derive(initial, handler, T::clone)
    }

    fn derive<P, F>(seed: P, mut handler: F, lift: fn(&T) -> P) -> Self
    where
        P: Send + 'static,
        F: FnMut(P) -> T + Send + 'static,
    {
        let computation = Computation::attached();

        let first = computation.track(|| handler(seed));
        let signal = Signal::owned_by(first, Arc::clone(&computation));
        let cell = signal.downgrade();
        computation.install(Box::new(move || {
            if let Some(cell) = cell.upgrade() {
                cell.update(|current| handler(lift(current)));
            }
        }));

        Self {
            signal,
            effect: Effect::from_computation(computation),
        }
    }

    /// Get a handle to the underlying signal.
    ///
    /// Reading it inside another computation tracks it like any signal.
    /// Writing it is not prevented, but the next recomputation overwrites
    /// the written value.
    pub fn signal(&self) -> Signal<T> {
        self.signal.clone()
    }

    /// Read the current value, tracking it if inside a reactive context.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Read the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    /// Stop recomputing. The value stays at whatever it was last.
    pub fn clear(&self) {
        self.effect.dispose();
    }

    /// Check if [`clear`](Self::clear) has been called.
    pub fn is_cleared(&self) -> bool {
        self.effect.is_disposed()
    }

    /// Get the number of times the handler has run.
    pub fn run_count(&self) -> usize {
        self.effect.run_count()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.get_untracked())
            .field("effect", &self.effect)
            .finish()
    }
}

/// Create a computed signal. See [`Computed::new`].
pub fn computed<T, F>(handler: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(Option<T>) -> T + Send + 'static,
{
    Computed::new(handler)
}

/// Create a computed signal seeded with `initial`. See
/// [`Computed::with_initial`].
pub fn computed_with<T, F>(initial: T, handler: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnMut(T) -> T + Send + 'static,
{
    Computed::with_initial(initial, handler)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn computed_is_available_immediately() {
        let a = Signal::new(2);
        let a_clone = a.clone();
        let double = computed(move |_| a_clone.get() * 2);

        assert_eq!(double.get(), 4);
        a.set(3);
        assert_eq!(double.get(), 6);
    }

    #[test]
    fn computed_accumulates_from_initial() {
        let a = Signal::new(1);
        let a_clone = a.clone();
        let sum = computed_with(0, move |previous| previous + a_clone.get());

        assert_eq!(sum.get(), 1);
        a.set(2);
        assert_eq!(sum.get(), 3);
        a.set(3);
        assert_eq!(sum.get(), 6);
    }

    #[test]
    fn computed_receives_previous_value() {
        let a = Signal::new(1);
        let a_clone = a.clone();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _latest = computed(move |previous: Option<i32>| {
            seen_clone.lock().push(previous);
            a_clone.get()
        });
        a.set(7);

        assert_eq!(*seen.lock(), vec![None, Some(1)]);
    }

    #[test]
    fn computed_freezes_after_clear() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let (a_clone, b_clone) = (a.clone(), b.clone());
        let sum = computed(move |_| a_clone.get() + b_clone.get());

        assert_eq!(sum.get(), 3);
        a.set(10);
        assert_eq!(sum.get(), 12);
        b.set(-10);
        assert_eq!(sum.get(), 0);

        sum.clear();
        assert!(sum.is_cleared());
        b.set(5);
        assert_eq!(sum.get(), 0);
    }

    #[test]
    fn computed_ignores_unrelated_writes() {
        let a = Signal::new(1);
        let flag = Signal::new(true);
        let calls = Arc::new(AtomicI32::new(0));

        let (a_clone, calls_clone) = (a.clone(), calls.clone());
        let count = computed_with(0, move |previous| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            previous + a_clone.get()
        });

        assert_eq!(count.get(), 1);
        flag.set(false);
        assert_eq!(count.get(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_drives_effects() {
        let a = Signal::new(1);
        let a_clone = a.clone();
        let double = computed(move |_| a_clone.get() * 2);

        let observed = Arc::new(AtomicI32::new(0));
        let (double_signal, observed_clone) = (double.signal(), observed.clone());
        let _effect = Effect::new(move |_: Option<()>| {
            observed_clone.store(double_signal.get(), Ordering::SeqCst);
        });

        assert_eq!(observed.load(Ordering::SeqCst), 2);
        a.set(21);
        assert_eq!(observed.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn computed_chain_propagates() {
        let base = Signal::new(5);
        let base_clone = base.clone();
        let doubled = computed(move |_| base_clone.get() * 2);

        let doubled_signal = doubled.signal();
        let plus_ten = computed(move |_| doubled_signal.get() + 10);

        assert_eq!(plus_ten.get(), 20);
        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn signal_handle_keeps_computation_running() {
        let base = Signal::new(1);
        let base_clone = base.clone();
        let doubled = computed(move |_| base_clone.get() * 2).signal();

        base.set(4);
        assert_eq!(doubled.get(), 8);
        assert_eq!(base.subscriber_count(), 1);

        drop(doubled);
        assert_eq!(base.subscriber_count(), 0);
    }

    #[test]
    fn computed_catches_up_after_downstream_write_back() {
        let x = Signal::new(0);
        let x_clone = x.clone();
        let doubled = computed(move |_| x_clone.get() * 2);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (doubled_signal, x_clone, seen_clone) = (doubled.signal(), x.clone(), seen.clone());
        let _clamp = Effect::new(move |_: Option<()>| {
            let value = doubled_signal.get();
            seen_clone.lock().push(value);
            if value == 2 {
                x_clone.set(5);
            }
        });

        x.set(1);
        assert_eq!(x.get_untracked(), 5);
        assert_eq!(doubled.get(), 10);
        assert_eq!(*seen.lock(), vec![0, 2, 10]);
    }
}
