//! Event identity, ancestry, and the context chain.
//!
//! Rust has no runtime class hierarchy, so "is this event a subtype of
//! that one" has to be declared rather than reflected. [`EventKind`] is the
//! marker every posted event implements (directly, or via
//! `#[derive(EventKind)]` in `shardbus-macros`), and it is also the hook a
//! dispatcher uses to find a [`CancellableMut`] capability on an event that
//! chooses to expose one.

use std::any::{Any, TypeId};

/// Marker trait for values that can flow through the bus.
///
/// `supertypes` lists the TypeIds of this event's declared ancestors,
/// nearest first. An event with no declared ancestors (the common case)
/// only ever matches exact-type handlers.
pub trait EventKind: Any + Send + Sync + 'static {
    /// TypeIds of this event's ancestor types, nearest first.
    fn supertypes() -> &'static [TypeId]
    where
        Self: Sized,
    {
        &[]
    }

    /// Expose a cancellation capability, if this event has one.
    fn as_cancellable_mut(&mut self) -> Option<&mut dyn CancellableMut> {
        None
    }

    /// Expose a read-only cancellation capability, if this event has one.
    fn as_cancellable(&self) -> Option<&dyn CancellableRef> {
        None
    }

    /// Upcast to `&dyn Any` for downcasting inside the dispatcher.
    fn as_any(&self) -> &dyn Any;

    /// Upcast to `&mut dyn Any` for downcasting inside the dispatcher.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Read-only half of the cancellation capability.
pub trait CancellableRef {
    fn is_cancelled(&self) -> bool;
}

/// Mutable cancellation capability an event can expose through
/// [`EventKind::as_cancellable_mut`].
///
/// Events that want cancellation implement this trait directly (or derive
/// it via `#[event(cancellable)]`) in addition to overriding the accessor.
pub trait CancellableMut: CancellableRef {
    fn set_cancelled(&mut self, cancelled: bool);

    fn cancel(&mut self) {
        self.set_cancelled(true);
    }
}

/// A ready-made cancellation flag event authors can embed by value.
///
/// ```ignore
/// struct MyEvent {
///     cancel: Cancellation,
///     payload: String,
/// }
///
/// impl EventKind for MyEvent {
///     fn as_cancellable_mut(&mut self) -> Option<&mut dyn CancellableMut> {
///         Some(&mut self.cancel)
///     }
///     fn as_cancellable(&self) -> Option<&dyn CancellableRef> {
///         Some(&self.cancel)
///     }
///     fn as_any(&self) -> &dyn std::any::Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
/// }
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cancellation(bool);

impl CancellableRef for Cancellation {
    fn is_cancelled(&self) -> bool {
        self.0
    }
}

impl CancellableMut for Cancellation {
    fn set_cancelled(&mut self, cancelled: bool) {
        self.0 = cancelled;
    }
}

/// A singly-linked chain of arbitrary, type-erased context values.
///
/// Lookup walks from the head toward the root looking for the nearest
/// ancestor of a requested type; `set_context` always allocates a fresh
/// node, so — unlike the source this design is modeled on — a cycle is
/// structurally unreachable rather than merely discouraged by convention.
#[derive(Default)]
pub struct ContextChain {
    head: Option<Box<ContextNode>>,
}

struct ContextNode {
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Box<ContextNode>>,
}

impl ContextChain {
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Prepend a new context, whose parent becomes the chain's previous head.
    pub fn set_context<C: Any + Send + Sync + 'static>(&mut self, ctx: C) {
        let parent = self.head.take();
        self.head = Some(Box::new(ContextNode {
            value: Box::new(ctx),
            parent,
        }));
    }

    /// The most recently attached context, regardless of type.
    pub fn head(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.head.as_ref().map(|node| node.value.as_ref())
    }

    /// The nearest ancestor context whose runtime type equals `C`.
    pub fn get<C: Any>(&self) -> Option<&C> {
        let mut cur = self.head.as_deref();
        while let Some(node) = cur {
            if let Some(found) = node.value.downcast_ref::<C>() {
                return Some(found);
            }
            cur = node.parent.as_deref();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Level at which a caught panic occurred, carried by [`ExceptionEvent`]
/// so a handler reacting to it knows which stage of dispatch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionLevel {
    /// A filter's `filter()` call panicked.
    Filter,
    /// A handler's enable-check panicked.
    EnableCheck,
    /// The handler method itself panicked.
    Handler,
}

/// Re-posted once, to the same shard, when a handler/filter/enable-check
/// panics during dispatch. Re-entrant panics while dispatching this event
/// are logged and dropped rather than wrapped again, bounding recursion
/// to one level.
pub struct ExceptionEvent {
    /// The panic payload, rendered to a string (see
    /// `DispatchError::from_panic`).
    pub cause: String,
    /// Diagnostic name of the event type being dispatched when the panic
    /// occurred.
    pub source_event_type: &'static str,
    /// Which stage of dispatch panicked.
    pub level: ExceptionLevel,
}

impl EventKind for ExceptionEvent {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
