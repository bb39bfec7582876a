//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation records that signal as one of its sources.
//!
//! # Implementation
//!
//! The context is a single thread-local slot. Entering a context swaps the
//! new tracker into the slot and keeps the previous occupant in the returned
//! guard; dropping the guard swaps it back. Because every guard owns the
//! value it displaced, nesting works to any depth and a panicking handler
//! still leaves the slot as it found it.
//!
//! Sources read during a run are only collected here. The owning
//! computation commits them to the subscriber sets once the run returns.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::effect::Computation;
use super::subscriber::{SubscriberId, SubscriberSet};

/// Subscriber sets read during one run, deduplicated, in first-read order.
pub(crate) type Sources = SmallVec<[Weak<SubscriberSet>; 4]>;

thread_local! {
    static CURRENT: RefCell<Option<Tracker>> = const { RefCell::new(None) };
}

/// The computation occupying the slot and what it has read so far.
struct Tracker {
    computation: Arc<Computation>,
    sources: Sources,
}

/// Guard that restores the previous context when dropped.
pub struct ReactiveContext {
    /// `None` once the previous occupant has been put back.
    saved: Option<Option<Tracker>>,
}

impl ReactiveContext {
    /// Make `computation` the reader of every signal read until the guard
    /// is finished or dropped.
    pub(crate) fn enter(computation: Arc<Computation>) -> Self {
        Self::swap(Some(Tracker {
            computation,
            sources: Sources::new(),
        }))
    }

    /// Clear the slot so that reads are untracked until the guard drops.
    pub fn suspend() -> Self {
        Self::swap(None)
    }

    fn swap(next: Option<Tracker>) -> Self {
        let previous = CURRENT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), next));
        Self {
            saved: Some(previous),
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CURRENT.with(|slot| {
            slot.borrow()
                .as_ref()
                .map(|tracker| tracker.computation.id())
        })
    }

    pub(crate) fn current_computation() -> Option<Arc<Computation>> {
        CURRENT.with(|slot| {
            slot.borrow()
                .as_ref()
                .map(|tracker| Arc::clone(&tracker.computation))
        })
    }

    /// Record a read of the signal owning `subscribers`.
    ///
    /// A no-op when nothing is being tracked.
    pub(crate) fn track(subscribers: &Arc<SubscriberSet>) {
        CURRENT.with(|slot| {
            if let Some(tracker) = slot.borrow_mut().as_mut() {
                let seen = tracker
                    .sources
                    .iter()
                    .any(|source| std::ptr::eq(source.as_ptr(), Arc::as_ptr(subscribers)));
                if !seen {
                    tracker.sources.push(Arc::downgrade(subscribers));
                }
            }
        });
    }

    /// Restore the previous context and hand back what was read under this
    /// one.
    pub(crate) fn finish(mut self) -> Sources {
        let previous = self.saved.take().unwrap_or_default();
        let finished = CURRENT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), previous));
        finished.map(|tracker| tracker.sources).unwrap_or_default()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if let Some(previous) = self.saved.take() {
            CURRENT.with(|slot| *slot.borrow_mut() = previous);
        }
    }
}

/// Run `f` without tracking any signal it reads.
///
/// The surrounding computation, if any, is restored afterwards, even when
/// `f` panics.
///
/// # Example
///
/// ```rust
/// use pulse_core::reactive::{effect, signal, untrack};
///
/// let a = signal(1);
/// let b = signal(2);
/// let (a2, b2) = (a.clone(), b.clone());
/// let sum = effect(move |_: Option<i32>| untrack(|| a2.get()) + b2.get());
///
/// a.set(10); // not a dependency
/// assert_eq!(sum.run_count(), 1);
/// b.set(5);
/// assert_eq!(sum.run_count(), 2);
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _guard = ReactiveContext::suspend();
    f()
}
