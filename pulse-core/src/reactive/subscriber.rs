//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: effects,
//! computed signals and the dispatch loop of a resource. Each signal owns a
//! [`SubscriberSet`] holding the computations that read it during their most
//! recent run. Computations keep weak references back to those sets (their
//! reverse index) so disposal never has to walk every live signal.
//!
//! # Ownership
//!
//! A subscriber set only holds [`Weak`] references. A computation is kept
//! alive by its handles (and by a parent computation, for effects created
//! inside another run), never by the signals it reads. Reading a signal
//! from inside a handler therefore cannot create a reference cycle.
//!
//! # Slots
//!
//! Entries live in an append-only slot list with an id-to-slot index.
//! Removing a subscriber empties its slot in O(1) and leaves the other
//! slots in place, so notification order stays the order of subscription.
//! Empty slots are compacted away once they outnumber live ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::effect::Computation;

/// Unique identifier for a subscriber.
///
/// Each computation gets a unique ID when created. This ID keys the
/// subscriber sets and the batch buffer, which is what makes repeated
/// subscriptions and repeated enqueues idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct Slot {
    id: SubscriberId,
    computation: Weak<Computation>,
}

#[derive(Default)]
struct Slots {
    order: Vec<Option<Slot>>,
    index: HashMap<SubscriberId, usize>,
}

impl Slots {
    fn compact(&mut self) {
        self.order.retain(Option::is_some);
        self.index = self
            .order
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| slot.as_ref().map(|slot| (slot.id, position)))
            .collect();
    }
}

/// The computations currently subscribed to one signal.
///
/// Entries keep insertion order: a write notifies subscribers in the order
/// they subscribed.
pub(crate) struct SubscriberSet {
    signal_id: u64,
    slots: Mutex<Slots>,
}

impl SubscriberSet {
    pub(crate) fn new(signal_id: u64) -> Self {
        Self {
            signal_id,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub(crate) fn signal_id(&self) -> u64 {
        self.signal_id
    }

    /// Add a computation. Adding one that is already present keeps its
    /// original position.
    pub(crate) fn insert(&self, computation: &Arc<Computation>) {
        let mut slots = self.slots.lock();
        let id = computation.id();
        if slots.index.contains_key(&id) {
            return;
        }
        let position = slots.order.len();
        slots.order.push(Some(Slot {
            id,
            computation: Arc::downgrade(computation),
        }));
        slots.index.insert(id, position);
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        let mut slots = self.slots.lock();
        let Some(position) = slots.index.remove(&id) else {
            return;
        };
        slots.order[position] = None;

        if slots.order.len() > 2 * slots.index.len() + 8 {
            slots.compact();
        }
    }

    /// Copy out the live subscribers so they can be run without holding
    /// the lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Computation>> {
        self.slots
            .lock()
            .order
            .iter()
            .flatten()
            .filter_map(|slot| slot.computation.upgrade())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().index.len()
    }
}

impl std::fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("signal_id", &self.signal_id())
            .field("len", &self.len())
            .finish()
    }
}
