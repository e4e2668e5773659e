//! # shardbus
//!
//! An in-process, synchronous-first event bus whose central feature is a
//! **specialized dispatcher**: at `bind()` time the bus analyses its
//! currently registered handlers and produces a branch-pruned dispatch
//! plan tailored to exactly that set, rather than walking a generic list
//! on every `post()`.
//!
//! This crate assembles the pieces from [`shardbus_core`] (the data
//! model: events, context chains, handler descriptors, filters) and
//! [`shardbus_std`] (the dispatcher shard and multi-shard expander) into
//! a facade:
//!
//! - [`Bus`] / [`BusBuilder`] — the synchronous bus: register handlers,
//!   `build()`, then `post()`.
//! - [`AsyncBus`] / [`AsyncBusBuilder`] — a queue drained by `N` worker
//!   tasks, each with its own private dispatcher copy, with an optional
//!   post-dispatch feedback callback.
//!
//! ```rust,ignore
//! use shardbus::{Bus, BusBuilder};
//! use shardbus_core::{EventKind, Handler, HandlerDescriptor};
//! use std::sync::Arc;
//!
//! struct Logger;
//! impl Handler for Logger {}
//!
//! struct Ping;
//! impl EventKind for Ping {
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
//! }
//!
//! fn on_ping(_t: &Logger, _e: &mut Ping) {
//!     println!("ping");
//! }
//!
//! let bus: Bus = BusBuilder::new()
//!     .register(HandlerDescriptor::builder(Arc::new(Logger), on_ping).build().unwrap())
//!     .build()
//!     .unwrap();
//! bus.post(Ping).unwrap();
//! ```

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod async_bus;
mod bus;

pub use async_bus::{AsyncBus, AsyncBusBuilder, Feedback, THREAD_SLEEP_DELAY};
pub use bus::{Bus, BusBuilder};

// Re-export the data model and dispatcher crates so downstream code only
// needs to depend on `shardbus`.
pub use shardbus_core::{
    BoxError, Cancellation, CancellableMut, CancellableRef, CapacityExceeded, ContextChain,
    DescriptorBuilder, DispatchError, EnabledHandle, EventKind, ExceptionEvent, ExceptionLevel,
    Filter, Handler, HandlerDescriptor, HandlerDescriptorMeta, NotBound, SubscriptionError,
    TryNewFilter,
};
pub use shardbus_std::{Expander, DispatcherShard, ShardState, MAX_METHODS};

/// `#[derive(EventKind)]`, re-exported behind the `macros` feature.
#[cfg(feature = "macros")]
pub use shardbus_macros::EventKind;
