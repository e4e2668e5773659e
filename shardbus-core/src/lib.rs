//! # shardbus-core
//!
//! Core data model for the Shardbus event bus: event identity, the
//! context chain, cancellation, the handler descriptor, the filter
//! protocol, and the shared error taxonomy.
//!
//! This crate has minimal dependencies ([`thiserror`] only) and is meant
//! to be imported by anything that needs to describe handlers or events
//! without pulling in a dispatcher implementation.
//!
//! # Core components
//!
//! ## [`EventKind`] — event identity
//!
//! The Rust stand-in for the reflected class hierarchy the original
//! design relies on: a marker trait every event implements, declaring its
//! ancestor TypeIds and, optionally, a cancellation capability.
//!
//! ## [`ContextChain`] — per-event ancestry of user payloads
//!
//! A singly-linked chain of arbitrary context values attached to an event
//! as it travels through handlers.
//!
//! ## [`HandlerDescriptor`] — the introspected binding
//!
//! An immutable, type-erased record produced by
//! [`HandlerDescriptor::builder`], pairing a target object and method
//! with its dispatch metadata (priority, forced, accept_subclasses,
//! filter).
//!
//! ## [`Filter`] — the per-handler gate
//!
//! An optional predicate attached to a descriptor, with a one-time `init`
//! hook for filters chosen by type.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod descriptor;
mod error;
mod event;
mod filter;

pub use descriptor::{
    DescriptorBuilder, EnabledHandle, Handler, HandlerDescriptor, HandlerDescriptorMeta,
};
pub use error::{BoxError, CapacityExceeded, DispatchError, NotBound, SubscriptionError};
pub use event::{
    Cancellation, CancellableMut, CancellableRef, ContextChain, EventKind, ExceptionEvent,
    ExceptionLevel,
};
pub use filter::{Filter, TryNewFilter};
