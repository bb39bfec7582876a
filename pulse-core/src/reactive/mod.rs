//! Reactive Primitives
//!
//! This module implements the reactive engine: signals, effects, computed
//! signals, batching, predicate waits and asynchronous resources.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (an effect or computed handler), the signal
//! records that computation as a dependent. When the signal is written, all
//! dependents re-run.
//!
//! ## Effects
//!
//! An Effect is a computation that runs once on creation and again whenever
//! a signal it read during its latest run is written. Each run receives the
//! value returned by the previous one.
//!
//! ## Computed signals
//!
//! A Computed signal is a signal maintained by an effect that writes the
//! handler's result back into it.
//!
//! ## Batches
//!
//! Writes inside [`batch`] are coalesced: every affected computation runs
//! once afterwards, observing the final values.
//!
//! ## Resources
//!
//! A [`Resource`] exposes the state of an asynchronous producer through
//! `value`, `is_loading` and `error` signals, re-dispatching when the
//! producer's dependencies change and discarding superseded results.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically. When a signal is read, we check if there is
//! an active tracking context and, if so, record the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod resource;
mod runtime;
mod signal;
mod subscriber;
mod when;

pub use computed::{computed, computed as derived, computed_with, Computed};
pub use context::{untrack, ReactiveContext};
pub use effect::{effect, effect_with, Effect};
pub use resource::{resource, resource_with, Resource};
pub use runtime::{batch, is_batching, Runtime};
pub use signal::{signal, Signal};
pub use subscriber::SubscriberId;
pub use when::when;
