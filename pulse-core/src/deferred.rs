//! Externally-resolvable futures.
//!
//! A [`Deferred`] is a future whose outcome is supplied from outside: any
//! clone can [`resolve`](Deferred::resolve) or [`reject`](Deferred::reject)
//! it, and any number of clones can await it. The first settlement wins.
//!
//! [`when`](crate::reactive::when) returns one, and callers can race it
//! against a timer with [`Deferred::reject_after`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

type SettleHook = Box<dyn FnOnce() + Send>;

struct State<T> {
    outcome: Option<Result<T>>,
    wakers: Vec<Waker>,
    on_settle: Vec<SettleHook>,
}

/// A shareable future settled by its owner.
pub struct Deferred<T> {
    shared: Arc<Mutex<State<T>>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + 'static,
{
    /// Create an unsettled deferred.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(State {
                outcome: None,
                wakers: Vec::new(),
                on_settle: Vec::new(),
            })),
        }
    }

    /// Settle successfully. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error. Returns `false` if already settled.
    pub fn reject(&self, error: Error) -> bool {
        self.settle(Err(error))
    }

    /// Check if an outcome has been recorded.
    pub fn is_settled(&self) -> bool {
        self.shared.lock().outcome.is_some()
    }

    /// Run `hook` once the deferred settles, whatever the outcome.
    ///
    /// Runs immediately if it has already settled.
    pub fn on_settle<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.outcome.is_some() {
            drop(state);
            hook();
        } else {
            state.on_settle.push(Box::new(hook));
        }
    }

    /// Reject with [`Error::Timeout`] unless settled within `duration`.
    ///
    /// The timer runs on the current tokio runtime and is aborted as soon as
    /// the deferred settles.
    pub fn reject_after(&self, duration: Duration) -> Result<JoinHandle<()>> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let deferred = self.clone();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            deferred.reject(Error::Timeout(duration));
        });

        let abort = timer.abort_handle();
        self.on_settle(move || abort.abort());
        Ok(timer)
    }

    /// A reference that can settle the deferred without keeping it alive.
    pub(crate) fn downgrade(&self) -> WeakDeferred<T> {
        WeakDeferred {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn settle(&self, outcome: Result<T>) -> bool {
        let (wakers, hooks) = {
            let mut state = self.shared.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            (
                std::mem::take(&mut state.wakers),
                std::mem::take(&mut state.on_settle),
            )
        };

        for waker in wakers {
            waker.wake();
        }
        for hook in hooks {
            hook();
        }
        true
    }
}

/// A non-owning reference to a [`Deferred`].
pub(crate) struct WeakDeferred<T> {
    shared: Weak<Mutex<State<T>>>,
}

impl<T> WeakDeferred<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn upgrade(&self) -> Option<Deferred<T>> {
        self.shared.upgrade().map(|shared| Deferred { shared })
    }
}

impl<T> Default for Deferred<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Future for Deferred<T>
where
    T: Clone,
{
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        if let Some(outcome) = state.outcome.clone() {
            return Poll::Ready(outcome);
        }
        if !state.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.shared.lock().outcome.is_some())
            .finish()
    }
}
