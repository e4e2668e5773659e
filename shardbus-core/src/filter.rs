//! The per-handler filter protocol.

use crate::descriptor::HandlerDescriptorMeta;

/// A gate evaluated once per post for a single handler.
///
/// Returning `false` from [`Filter::filter`] skips only the owning
/// handler; it never touches the event's cancellation state. `init` runs
/// exactly once, and only for filters chosen through
/// `HandlerDescriptor::builder(..).with_filter::<F>()`; a filter attached
/// via `.set_filter(instance)` never sees `init`.
pub trait Filter<E>: Send + Sync + 'static {
    /// One-time configuration hook, called with the metadata of the
    /// descriptor this filter was attached to by type.
    fn init(&mut self, _meta: &HandlerDescriptorMeta) {}

    /// Whether dispatch should proceed to the owning handler.
    fn filter(&self, event: &E) -> bool;
}

/// Construct a filter value for the metadata-driven attachment path.
///
/// `HandlerDescriptor::builder(..).with_filter::<F>()` requires this bound
/// instead of a bare `Default` so a filter type can fail construction
/// (surfacing `SubscriptionError::FilterNotInstantiable`) rather than only
/// panicking.
pub trait TryNewFilter<E>: Filter<E> + Sized {
    /// The error produced when construction fails.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Attempt to build a fresh filter instance.
    fn try_new() -> Result<Self, Self::Error>;
}

impl<E, F> TryNewFilter<E> for F
where
    F: Filter<E> + Default,
{
    type Error = std::convert::Infallible;

    fn try_new() -> Result<Self, Self::Error> {
        Ok(F::default())
    }
}
