//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its handler immediately to establish
//!    initial dependencies.
//!
//! 2. When any signal read during the latest run is written, the handler
//!    runs again with the value it returned last time.
//!
//! 3. Every run rebuilds the dependency set from scratch. A signal read on a
//!    previous run but not on the current one stops triggering the effect.
//!
//! # Dependency bookkeeping
//!
//! Signals hold weak references to their subscribers; each [`Computation`]
//! holds weak references to the subscriber sets it belongs to. New
//! dependencies are committed only after a run returns, so a handler that
//! panics leaves the previous subscriptions untouched.
//!
//! # Re-entrant notifications
//!
//! A handler writing a signal it depends on does not re-run itself. A
//! notification that reaches a running computation from anywhere else (for
//! example a downstream effect writing back into one of its sources) is
//! remembered, and the computation runs once more after the current run.
//!
//! # Ownership and disposal
//!
//! An [`Effect`] lives as long as one of its handles does. Effects and
//! computed signals created while another computation is running are owned
//! by that computation instead: they are disposed before its next run and
//! when it is disposed.
//!
//! [`Effect::dispose`] removes the computation from every subscriber set in
//! its reverse index and drops the handler. Dropping the last handle does
//! the same.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::context::{ReactiveContext, Sources};
use super::runtime::Runtime;
use super::subscriber::SubscriberId;

/// The type-erased body of a computation.
pub(crate) type Body = Box<dyn FnMut() + Send>;

thread_local! {
    /// The innermost computation running on this thread, tracked or not.
    static ACTIVE: Cell<Option<SubscriberId>> = const { Cell::new(None) };
}

/// A tracked, re-runnable unit of work shared by effects, computed signals
/// and resources.
pub(crate) struct Computation {
    id: SubscriberId,

    /// Installed after the first run; taken on disposal.
    body: Mutex<Option<Body>>,

    /// Reverse index: the subscriber sets this computation belongs to.
    sources: Mutex<Sources>,

    /// Computations created during the latest run.
    children: Mutex<Vec<Arc<Computation>>>,

    disposed: AtomicBool,

    /// Set for the duration of a run.
    running: AtomicBool,

    /// Notified while running; run again once the current run returns.
    rerun: AtomicBool,

    run_count: AtomicUsize,
}

/// Clears the running flag on exit, including unwinding.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Restores the previous innermost computation.
struct ActiveGuard(Option<SubscriberId>);

impl ActiveGuard {
    fn enter(id: SubscriberId) -> Self {
        Self(ACTIVE.with(|active| active.replace(Some(id))))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.0));
    }
}

impl Computation {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SubscriberId::new(),
            body: Mutex::new(None),
            sources: Mutex::new(Sources::new()),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        })
    }

    /// Create a computation owned by the one currently being tracked, if
    /// any.
    pub(crate) fn attached() -> Arc<Self> {
        let computation = Self::new();
        if let Some(parent) = ReactiveContext::current_computation() {
            parent.adopt(&computation);
        }
        computation
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    fn adopt(&self, child: &Arc<Computation>) {
        self.children.lock().push(Arc::clone(child));
    }

    /// Install the body that re-runs on invalidation.
    pub(crate) fn install(&self, body: Body) {
        if !self.is_disposed() {
            *self.body.lock() = Some(body);
        }
    }

    /// Run `f` as this computation and commit what it read.
    pub(crate) fn track<R>(self: &Arc<Self>, f: impl FnOnce() -> R) -> R {
        let _propagation = Runtime::propagation();
        self.running.store(true, Ordering::SeqCst);
        let _running = RunningGuard(&self.running);
        let _active = ActiveGuard::enter(self.id);

        let ctx = ReactiveContext::enter(Arc::clone(self));
        let result = f();
        let sources = ctx.finish();

        self.commit(sources);
        self.run_count.fetch_add(1, Ordering::SeqCst);
        result
    }

    /// Re-run the installed body.
    ///
    /// Does nothing once disposed. A notification that arrives while the
    /// computation is running is either dropped (its own write) or turned
    /// into one follow-up run.
    pub(crate) fn execute(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        if self.running.load(Ordering::SeqCst) {
            if ACTIVE.with(Cell::get) == Some(self.id) {
                trace!(subscriber = ?self.id, "skipping self-notification");
            } else {
                trace!(subscriber = ?self.id, "queued follow-up run");
                self.rerun.store(true, Ordering::SeqCst);
            }
            return;
        }

        let _propagation = Runtime::propagation();
        loop {
            self.rerun.store(false, Ordering::SeqCst);
            self.release_children();

            let mut body = self.body.lock();
            let Some(run) = body.as_mut() else {
                return;
            };
            self.track(run);

            // Disposed from inside its own handler
            if self.is_disposed() {
                *body = None;
                return;
            }
            drop(body);

            if !self.rerun.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    /// Replace the reverse index with `next`, moving subscriptions to match.
    fn commit(self: &Arc<Self>, next: Sources) {
        if self.is_disposed() {
            return;
        }

        let mut sources = self.sources.lock();
        for stale in sources.iter() {
            if next.iter().any(|source| source.ptr_eq(stale)) {
                continue;
            }
            if let Some(set) = stale.upgrade() {
                set.remove(self.id);
            }
        }
        for source in next.iter() {
            if let Some(set) = source.upgrade() {
                set.insert(self);
            }
        }

        trace!(subscriber = ?self.id, dependencies = next.len(), "committed dependencies");
        *sources = next;
    }

    /// Dispose every computation created during the latest run.
    fn release_children(&self) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in children {
            child.dispose();
        }
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.release_children();

        let sources = std::mem::take(&mut *self.sources.lock());
        for source in sources {
            if let Some(set) = source.upgrade() {
                set.remove(self.id);
            }
        }

        // A running body is released by `execute` once the run returns.
        if let Some(mut body) = self.body.try_lock() {
            *body = None;
        }

        debug!(subscriber = ?self.id, "computation disposed");
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.sources
            .lock()
            .iter()
            .filter(|source| source.strong_count() > 0)
            .count()
    }
}

impl Drop for Computation {
    fn drop(&mut self) {
        for child in self.children.get_mut().drain(..) {
            child.dispose();
        }
        for source in self.sources.get_mut().drain(..) {
            if let Some(set) = source.upgrade() {
                set.remove(self.id);
            }
        }
    }
}

/// Handle to a running effect. Also serves as its disposer.
///
/// # Example
///
/// ```rust
/// use pulse_core::reactive::{effect, signal};
/// use std::sync::{Arc, Mutex};
///
/// let count = signal(1);
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let (count2, seen2) = (count.clone(), seen.clone());
/// let watcher = effect(move |_: Option<()>| {
///     seen2.lock().unwrap().push(count2.get());
/// });
///
/// count.set(5);
/// watcher.dispose();
/// count.set(9);
/// assert_eq!(*seen.lock().unwrap(), vec![1, 5]);
/// ```
#[derive(Clone)]
#[must_use = "an effect is disposed when its last handle is dropped"]
pub struct Effect {
    computation: Arc<Computation>,
}

impl Effect {
    /// Create and run an effect whose handler receives `None` on its first
    /// run and its own previous return value afterwards.
    pub fn new<T, F>(handler: F) -> Self
    where
        T: Clone + Send + 'static,
        F: FnMut(Option<T>) -> T + Send + 'static,
    {
        Self::spawn(None, handler, Some)
    }

    /// Create and run an effect whose handler starts from `initial`.
    pub fn with_initial<T, F>(initial: T, handler: F) -> Self
    where
        T: Clone + Send + 'static,
        F: FnMut(T) -> T + Send + 'static,
    {
        Self::spawn(initial, handler, std::convert::identity)
    }

    fn spawn<P, T, F>(seed: P, mut handler: F, lift: fn(T) -> P) -> Self
    where
        P: Clone + Send + 'static,
        T: 'static,
        F: FnMut(P) -> T + Send + 'static,
    {
        let computation = Computation::attached();

        let mut last = lift(computation.track(|| handler(seed)));
        computation.install(Box::new(move || {
            last = lift(handler(last.clone()));
        }));

        Self { computation }
    }

    pub(crate) fn from_computation(computation: Arc<Computation>) -> Self {
        Self { computation }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.computation.id()
    }

    /// Stop the effect. Calling this more than once is a no-op.
    ///
    /// Dropping the last handle has the same effect.
    pub fn dispose(&self) {
        self.computation.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.computation.is_disposed()
    }

    /// Get the number of times the handler has run, including the first run.
    pub fn run_count(&self) -> usize {
        self.computation.run_count()
    }

    /// Get the number of signals read during the latest completed run.
    pub fn dependency_count(&self) -> usize {
        self.computation.dependency_count()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.subscriber_id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. See [`Effect::new`].
pub fn effect<T, F>(handler: F) -> Effect
where
    T: Clone + Send + 'static,
    F: FnMut(Option<T>) -> T + Send + 'static,
{
    Effect::new(handler)
}

/// Create an effect seeded with a previous value. See [`Effect::with_initial`].
pub fn effect_with<T, F>(initial: T, handler: F) -> Effect
where
    T: Clone + Send + 'static,
    F: FnMut(T) -> T + Send + 'static,
{
    Effect::with_initial(initial, handler)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
