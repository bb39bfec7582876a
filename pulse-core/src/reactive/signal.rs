//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (effect/computed), the
//!    signal is recorded as a source of that computation.
//!
//! 2. When a signal is written, every subscriber is notified, in the order
//!    they subscribed. Inside [`batch`](super::batch) the notifications are
//!    deferred instead.
//!
//! 3. Writes never compare old and new values: setting the same value again
//!    still notifies.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, shared behind `Arc<RwLock<T>>`
//! - The subscriber set, shared behind `Arc`
//! - For the cell of a computed signal, the computation maintaining it
//!
//! The subscriber set refers to computations weakly, so a cell is freed
//! once its last handle is gone, including handles captured by handlers
//! of effects that have since been dropped.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::effect::Computation;
use super::runtime::Runtime;
use super::subscriber::SubscriberSet;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use pulse_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
///
/// // An empty cell
/// let name = Signal::<Option<String>>::default();
/// assert_eq!(name.get(), None);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Computations that read this signal during their latest run.
    subscribers: Arc<SubscriberSet>,

    /// Keeps a computed signal's computation alive with the cell.
    owner: Option<Arc<Computation>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        let id = next_signal_id();
        Self {
            id,
            value: Arc::new(RwLock::new(value)),
            subscribers: Arc::new(SubscriberSet::new(id)),
            owner: None,
        }
    }

    /// Create a cell that keeps `owner` alive for as long as any handle to
    /// it exists.
    pub(crate) fn owned_by(value: T, owner: Arc<Computation>) -> Self {
        Self {
            owner: Some(owner),
            ..Self::new(value)
        }
    }

    /// A reference that does not keep the cell (or its owner) alive.
    pub(crate) fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal {
            id: self.id,
            value: Arc::downgrade(&self.value),
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also records the signal as
    /// a dependency of the running computation.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.subscribers);
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Store a new value and notify subscribers. Returns the new value.
    ///
    /// The value is stored before any subscriber runs, so every subscriber
    /// observes it.
    pub fn set(&self, value: T) -> T {
        let _propagation = Runtime::propagation();
        *self.value.write() = value.clone();
        Runtime::notify(self.subscribers.snapshot());
        value
    }

    /// Compute the new value from the current one, store it and notify
    /// subscribers. Returns the new value.
    ///
    /// The current value is read untracked.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let _propagation = Runtime::propagation();
        let current = self.get_untracked();
        self.set(f(&current))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Default for Signal<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            subscribers: Arc::clone(&self.subscribers),
            owner: self.owner.clone(),
        }
    }
}

/// A non-owning reference to a signal's cell.
pub(crate) struct WeakSignal<T> {
    id: u64,
    value: Weak<RwLock<T>>,
    subscribers: Weak<SubscriberSet>,
}

impl<T> WeakSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get a handle to the cell if it still exists. The handle does not
    /// carry the cell's owner.
    pub(crate) fn upgrade(&self) -> Option<Signal<T>> {
        Some(Signal {
            id: self.id,
            value: self.value.upgrade()?,
            subscribers: self.subscribers.upgrade()?,
            owner: None,
        })
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a signal seeded with `value`.
pub fn signal<T>(value: T) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    Signal::new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
