//! Reactive Runtime
//!
//! The runtime connects signal writes to the computations that depend on
//! them, and owns the batch buffer.
//!
//! # How It Works
//!
//! 1. A signal write hands the runtime a snapshot of its subscribers.
//!
//! 2. Outside a batch, each subscriber re-runs immediately, in order.
//!
//! 3. Inside a batch, each subscriber is appended to the pending buffer
//!    instead. The buffer is keyed by subscriber ID, so a computation that
//!    several writes invalidate is queued once.
//!
//! 4. When the outermost `batch` call returns, the buffer is detached and
//!    every pending computation runs exactly once, in the order it was first
//!    queued, observing the final values of all signals written.
//!
//! Nested `batch` calls join the outermost buffer.
//!
//! # Thread Safety
//!
//! Both the tracking context and the batch buffer are thread-local. What
//! keeps them consistent across threads is the propagation lock: a
//! reentrant lock held for the whole of every write, every computation run
//! and every batch. Propagation therefore happens on one logical thread at
//! a time. A write arriving from another thread (a resource settling on a
//! tokio worker, say) waits until the propagation in progress has finished,
//! then runs its own, so it can neither interleave with a running handler
//! nor slip into another thread's batch.
//!
//! Reads never take the lock.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::Computation;
use super::subscriber::SubscriberId;

type PendingBuffer = IndexMap<SubscriberId, Weak<Computation>>;

static PROPAGATION: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

thread_local! {
    static PENDING: RefCell<Option<PendingBuffer>> = const { RefCell::new(None) };
}

/// Entry points for propagation state.
pub struct Runtime;

impl Runtime {
    /// Run or defer every computation in `subscribers`.
    pub(crate) fn notify(subscribers: Vec<Arc<Computation>>) {
        for computation in subscribers {
            if !Self::defer(&computation) {
                computation.execute();
            }
        }
    }

    /// Queue `computation` if a batch is active.
    fn defer(computation: &Arc<Computation>) -> bool {
        PENDING.with(|pending| match pending.borrow_mut().as_mut() {
            Some(buffer) => {
                buffer
                    .entry(computation.id())
                    .or_insert_with(|| Arc::downgrade(computation));
                true
            }
            None => false,
        })
    }

    /// Hold the propagation lock until the guard drops.
    pub(crate) fn propagation() -> ReentrantMutexGuard<'static, ()> {
        PROPAGATION.lock()
    }

    /// Check if writes are currently being deferred.
    pub fn is_batching() -> bool {
        PENDING.with(|pending| pending.borrow().is_some())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Discards the buffer if the batch closure unwinds.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        PENDING.with(|pending| pending.borrow_mut().take());
    }
}

/// Defer all notifications caused by writes in `f` until `f` returns, then
/// run each affected computation once.
///
/// # Example
///
/// ```rust
/// use pulse_core::reactive::{batch, effect, signal};
///
/// let a = signal(1);
/// let b = signal(2);
/// let (a2, b2) = (a.clone(), b.clone());
/// let sum = effect(move |_: Option<i32>| a2.get() + b2.get());
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(sum.run_count(), 2);
/// ```
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _propagation = Runtime::propagation();
    let outermost = PENDING.with(|pending| {
        let mut pending = pending.borrow_mut();
        if pending.is_some() {
            false
        } else {
            *pending = Some(PendingBuffer::new());
            true
        }
    });
    if !outermost {
        return f();
    }

    let guard = BatchGuard;
    let result = f();
    let buffer = PENDING.with(|pending| pending.borrow_mut().take()).unwrap_or_default();
    drop(guard);

    trace!(pending = buffer.len(), "draining batch");
    for computation in buffer.into_values().filter_map(|pending| pending.upgrade()) {
        computation.execute();
    }
    result
}

/// Check if currently inside a batch.
pub fn is_batching() -> bool {
    Runtime::is_batching()
}
