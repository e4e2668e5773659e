//! Error taxonomy shared by the dispatcher shard, the expander, and the
//! async bus.

use thiserror::Error;

/// A boxed error type for dynamic, caller-supplied error causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural problem found while building a [`crate::HandlerDescriptor`].
///
/// Most of the shapes this guards against in the source system (wrong
/// arity, non-void return, an interface parameter) are unrepresentable in
/// a typed `HandlerDescriptor::builder` call to begin with, so the variant
/// that actually triggers at runtime today is `FilterNotInstantiable`. The
/// others remain so the type stays meaningful for handlers built from
/// less-static call sites.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    /// A subscribed method's signature could not be bound (wrong arity,
    /// visibility, or return type).
    #[error("handler method `{which_method}` is not a valid subscriber: {reason}")]
    InvalidMethod {
        /// Human-readable explanation of what rule was violated.
        reason: String,
        /// Name of the offending method, for diagnostics.
        which_method: String,
    },

    /// The declared event parameter type is not a concrete event type.
    #[error("handler method `{which_method}` declares a non-concrete event parameter")]
    AbstractParameter {
        /// Name of the offending method.
        which_method: String,
    },

    /// `with_filter::<F>()` could not produce a filter instance.
    #[error("filter type for `{which_method}` could not be instantiated: {source}")]
    FilterNotInstantiable {
        /// Name of the method the filter was attached to.
        which_method: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },
}

/// Raised by shard registration when a single shard's fixed-capacity table
/// is full.
#[derive(Error, Debug)]
#[error("shard at capacity: {capacity} handlers already registered")]
pub struct CapacityExceeded {
    /// The shard's fixed capacity.
    pub capacity: usize,
}

/// `post()` was called on a shard (or expander) that has never completed a
/// successful `bind()`.
#[derive(Error, Debug, Default, Clone, Copy)]
#[error("post() called before any successful bind()")]
pub struct NotBound;

/// A handler, filter, or enable-check panicked during dispatch.
#[derive(Error, Debug)]
#[error("handler `{which}` panicked during dispatch: {message}")]
pub struct DispatchError {
    /// Diagnostic name of the handler/filter that panicked.
    pub which: String,
    /// Panic payload rendered to a string, when it was a `&str` or `String`.
    pub message: String,
}

impl DispatchError {
    /// Build a `DispatchError` from a caught panic payload.
    pub fn from_panic(which: impl Into<String>, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            which: which.into(),
            message,
        }
    }
}
