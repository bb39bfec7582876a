//! Waiting on reactive predicates.
//!
//! [`when`] turns a predicate over signals into a one-shot [`Deferred`]:
//! an effect re-evaluates the predicate whenever a signal it reads changes
//! and resolves the deferred the first time it holds. The effect is
//! disposed as soon as the deferred settles, whether it was resolved by the
//! predicate or settled from outside (for example by
//! [`Deferred::reject_after`]).
//!
//! There is no built-in timeout; a predicate that never holds keeps the
//! deferred pending. The watching effect belongs to the deferred: once
//! every clone of it is dropped, the predicate stops being evaluated.

use crate::deferred::Deferred;

use super::effect::effect;

/// Resolve once `predicate` returns `true`.
///
/// The predicate runs immediately, so a predicate that already holds
/// yields a deferred that is settled on return.
///
/// # Example
///
/// ```rust
/// use pulse_core::reactive::{signal, when};
///
/// let level = signal(0);
/// let level2 = level.clone();
/// let ready = when(move || level2.get() > 3);
///
/// level.set(1);
/// assert!(!ready.is_settled());
/// level.set(4);
/// assert!(ready.is_settled());
/// ```
pub fn when<F>(mut predicate: F) -> Deferred<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    let deferred = Deferred::new();

    let resolver = deferred.downgrade();
    let watcher = effect(move |_: Option<()>| {
        if predicate() {
            if let Some(deferred) = resolver.upgrade() {
                deferred.resolve(());
            }
        }
    });
    deferred.on_settle(move || watcher.dispose());

    deferred
}
