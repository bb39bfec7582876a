//! Pulse Core
//!
//! This crate provides a fine-grained reactive signal engine. It implements:
//!
//! - Reactive cells (signals) with automatic dependency tracking
//! - Effects and computed signals that re-run when their dependencies change
//! - Write coalescing (`batch`) and tracking suppression (`untrack`)
//! - Predicate waits (`when`) built on an externally-resolvable future
//! - Asynchronous resources with generation-gated results
//!
//! # Architecture
//!
//! The crate is organized into a few modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `deferred`: The externally-resolvable future used by `when`
//! - `error`: Error types for the asynchronous edges
//!
//! # Example
//!
//! ```rust
//! use pulse_core::reactive::{computed, effect, signal};
//! use std::sync::{Arc, Mutex};
//!
//! // Create a signal
//! let count = signal(0);
//!
//! // Create a derived value
//! let count2 = count.clone();
//! let doubled = computed(move |_| count2.get() * 2);
//!
//! // Create an effect; it runs until the handle is dropped
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let (count3, doubled_signal, log2) = (count.clone(), doubled.signal(), log.clone());
//! let _logger = effect(move |_: Option<()>| {
//!     log2.lock().unwrap().push((count3.get(), doubled_signal.get()));
//! });
//!
//! // Update the signal
//! count.set(5);
//! assert_eq!(log.lock().unwrap().last(), Some(&(5, 10)));
//! ```

pub mod deferred;
pub mod error;
pub mod reactive;

pub use deferred::Deferred;
pub use error::{Error, Result};
