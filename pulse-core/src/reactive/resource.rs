//! Asynchronous Resources
//!
//! A resource feeds the result of an asynchronous producer into three
//! signals: `value`, `is_loading` and `error`.
//!
//! # How Resources Work
//!
//! 1. On creation, and again whenever a signal read by the producer changes,
//!    the resource *dispatches*: it bumps its generation counter, sets
//!    `is_loading` and clears `error`, then calls the producer with the last
//!    accepted value.
//!
//! 2. The producer's future runs on the tokio runtime that was current when
//!    the resource was created. Its outcome is applied under the
//!    propagation lock, like any other write, so a settlement on a worker
//!    thread waits for a write or batch in progress elsewhere to finish.
//!
//! 3. When the future completes, its outcome is applied only if no newer
//!    dispatch has started in the meantime. A superseded outcome is dropped
//!    without touching any signal.
//!
//! # Dependency tracking
//!
//! The producer closure itself runs inside the resource's computation, so
//! signals read in its synchronous body are tracked. Reads inside the
//! returned future happen later, outside any reactive context, and are not:
//!
//! ```rust,ignore
//! let page = signal(1);
//! let page2 = page.clone();
//! let listing = resource(move |_previous| {
//!     let page = page2.get(); // tracked
//!     async move { fetch(page).await }
//! })?;
//! ```
//!
//! # Errors
//!
//! A producer failure is stored in the `error` signal. It is never returned
//! to a caller, and [`Resource::refresh`] completes normally either way.

use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::runtime::Handle;
use tracing::debug;

use crate::deferred::Deferred;
use crate::error::{Error, Result};

use super::context::untrack;
use super::effect::{effect, Effect};
use super::runtime::batch;
use super::signal::Signal;

type Producer<T, E> =
    dyn Fn(Option<T>) -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync;

/// State shared between the resource handle, its computation and the
/// in-flight producer tasks.
struct Dispatcher<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    value: Signal<Option<T>>,
    is_loading: Signal<bool>,
    error: Signal<Option<E>>,
    generation: AtomicU64,
    producer: Box<Producer<T, E>>,
    runtime: Handle,
}

impl<T, E> Dispatcher<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Start a new generation. The returned deferred resolves once that
    /// generation's producer call completes, accepted or not.
    fn dispatch(self: &Arc<Self>) -> Deferred<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        batch(|| {
            self.is_loading.set(true);
            self.error.set(None);
        });

        let pending = (self.producer)(self.value.get_untracked());
        debug!(generation, "dispatched resource producer");

        let settled = Deferred::new();
        let done = settled.clone();
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = pending.await;
            this.accept(generation, outcome);
            done.resolve(());
        });

        settled
    }

    fn accept(&self, generation: u64, outcome: std::result::Result<T, E>) {
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            debug!(generation, current, "discarding stale resource outcome");
            return;
        }

        debug!(generation, ok = outcome.is_ok(), "resource settled");
        batch(|| {
            match outcome {
                Ok(value) => {
                    self.value.set(Some(value));
                }
                Err(error) => {
                    self.error.set(Some(error));
                }
            }
            self.is_loading.set(false);
        });
    }
}

/// Signals fed by an asynchronous producer.
///
/// Dropping the last handle stops re-dispatching, like [`Resource::clear`].
#[must_use = "a resource stops reacting when its last handle is dropped"]
pub struct Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    dispatcher: Arc<Dispatcher<T, E>>,
    effect: Effect,
}

impl<T, E> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a resource and dispatch the producer immediately.
    ///
    /// Fails with [`Error::NoRuntime`] outside a tokio runtime.
    pub fn new<F, Fut>(initial: Option<T>, producer: F) -> Result<Self>
    where
        F: Fn(Option<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let dispatcher = Arc::new(Dispatcher {
            value: Signal::new(initial),
            is_loading: Signal::new(true),
            error: Signal::new(None),
            generation: AtomicU64::new(0),
            producer: Box::new(move |previous| producer(previous).boxed()),
            runtime,
        });

        let this = Arc::clone(&dispatcher);
        let effect = effect(move |_: Option<()>| {
            this.dispatch();
        });

        Ok(Self { dispatcher, effect })
    }

    /// The last accepted value.
    pub fn value(&self) -> Signal<Option<T>> {
        self.dispatcher.value.clone()
    }

    /// `true` while the latest dispatch has not completed.
    pub fn is_loading(&self) -> Signal<bool> {
        self.dispatcher.is_loading.clone()
    }

    /// The error from the latest accepted failure, cleared on every dispatch.
    pub fn error(&self) -> Signal<Option<E>> {
        self.dispatcher.error.clone()
    }

    /// Number of dispatches so far.
    pub fn generation(&self) -> u64 {
        self.dispatcher.generation.load(Ordering::SeqCst)
    }

    /// Dispatch again now.
    ///
    /// The dispatch happens when this is called; the returned future only
    /// waits for that generation to complete. It completes normally even if
    /// the producer fails or a newer dispatch supersedes it.
    pub fn refresh(&self) -> impl Future<Output = ()> + Send + 'static {
        let settled = untrack(|| self.dispatcher.dispatch());
        async move {
            let _ = settled.await;
        }
    }

    /// Stop dispatching when dependencies change.
    ///
    /// A producer call already in flight still completes, and its outcome is
    /// still applied unless superseded.
    pub fn clear(&self) {
        self.effect.dispose();
    }

    /// Check if [`clear`](Self::clear) has been called.
    pub fn is_cleared(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T, E> Clone for Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            effect: self.effect.clone(),
        }
    }
}

impl<T, E> Debug for Resource<T, E>
where
    T: Clone + Send + Sync + Debug + 'static,
    E: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("value", &self.dispatcher.value.get_untracked())
            .field("is_loading", &self.dispatcher.is_loading.get_untracked())
            .field("error", &self.dispatcher.error.get_untracked())
            .field("generation", &self.generation())
            .finish()
    }
}

/// Create a resource with no initial value. See [`Resource::new`].
pub fn resource<T, E, F, Fut>(producer: F) -> Result<Resource<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(Option<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    Resource::new(None, producer)
}

/// Create a resource seeded with `initial`. See [`Resource::new`].
pub fn resource_with<T, E, F, Fut>(initial: T, producer: F) -> Result<Resource<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(Option<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    Resource::new(Some(initial), producer)
}
