//! # shardbus-std
//!
//! The specialized dispatcher and its multi-shard expander for the
//! Shardbus event bus.
//!
//! This crate provides:
//!
//! - [`DispatcherShard`] — a fixed-capacity registry plus the specialized
//!   dispatch plan generated by `bind()`.
//! - [`Expander`] — partitions handlers across multiple shards once a
//!   single shard's [`MAX_METHODS`] capacity is outgrown.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use shardbus_core::{EventKind, Handler, HandlerDescriptor};
//! use shardbus_std::DispatcherShard;
//! use std::sync::Arc;
//!
//! let mut shard = DispatcherShard::new();
//! shard.register(HandlerDescriptor::builder(Arc::new(MyHandler), MyHandler::on_event)
//!     .priority(10)
//!     .build()?)?;
//! shard.bind();
//! let event = shard.post(MyEvent::default())?;
//! ```

#![deny(clippy::pub_use, clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use shardbus_core;

mod expander;
mod shard;

pub use expander::Expander;
pub use shard::{DispatcherShard, ShardState, MAX_METHODS};
