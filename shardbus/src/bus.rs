//! The synchronous bus facade: picks a single shard or a multi-shard
//! expander depending on how many handlers were registered at build time.

use std::any::TypeId;
use std::sync::Arc;

use shardbus_core::{CapacityExceeded, EventKind, HandlerDescriptor, HandlerDescriptorMeta, NotBound};
use shardbus_std::{DispatcherShard, Expander, MAX_METHODS};

/// A bound, ready-to-post event bus.
///
/// Produced by [`BusBuilder::build`]. Internally either a single
/// [`DispatcherShard`] or a multi-shard [`Expander`] — callers never need
/// to care which, since both expose the same `post`/`post_boxed` contract.
pub struct Bus {
    backend: BusBackend,
    max_per_shard: usize,
}

enum BusBackend {
    Shard(DispatcherShard),
    Expander(Expander),
}

impl Bus {
    /// Register one more descriptor. Takes effect on the next [`Bus::bind`].
    ///
    /// Fails with `CapacityExceeded` when this bus's backend is a single
    /// [`DispatcherShard`] at capacity; a bus backed by an [`Expander`]
    /// never fails here, matching spec.md §7's "never from expander" rule.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Result<(), CapacityExceeded> {
        match &mut self.backend {
            BusBackend::Shard(s) => s.register(descriptor),
            BusBackend::Expander(e) => {
                e.register(descriptor);
                Ok(())
            }
        }
    }

    /// Register several descriptors at once. See [`Bus::register`].
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = HandlerDescriptor>,
    ) -> Result<(), CapacityExceeded> {
        match &mut self.backend {
            BusBackend::Shard(s) => s.register_all(descriptors.into_iter().collect()),
            BusBackend::Expander(e) => {
                e.register_all(descriptors.into_iter().collect());
                Ok(())
            }
        }
    }

    /// Remove the descriptor with the given identity token, if present.
    /// Takes effect on the next [`Bus::bind`].
    pub fn unregister(&mut self, identity: usize) -> bool {
        match &mut self.backend {
            BusBackend::Shard(s) => s.unregister(identity),
            BusBackend::Expander(e) => e.unregister(identity),
        }
    }

    /// Empty the registry. Takes effect on the next [`Bus::bind`].
    pub fn clear(&mut self) {
        match &mut self.backend {
            BusBackend::Shard(s) => s.clear(),
            BusBackend::Expander(e) => e.clear(),
        }
    }

    /// Snapshot the current registrations into a fresh plan and install it
    /// as active. The plan in force for `post()` is always the last
    /// successful `bind()`'s plan — registrations since then are pending,
    /// not yet dispatched.
    pub fn bind(&mut self) {
        match &mut self.backend {
            BusBackend::Shard(s) => s.bind(),
            BusBackend::Expander(e) => e.bind(),
        }
    }

    /// Route `event` through the active plan.
    pub fn post<E: EventKind>(&self, event: E) -> Result<E, NotBound> {
        match &self.backend {
            BusBackend::Shard(s) => s.post(event),
            BusBackend::Expander(e) => e.post(event),
        }
    }

    /// Type-erased counterpart of [`Bus::post`], used by [`crate::AsyncBus`]'s
    /// worker loop.
    pub fn post_boxed(
        &self,
        event: Box<dyn EventKind>,
        type_id: TypeId,
        supertypes: &[TypeId],
    ) -> Result<Box<dyn EventKind>, NotBound> {
        match &self.backend {
            BusBackend::Shard(s) => s.post_boxed(event, type_id, supertypes),
            BusBackend::Expander(e) => e.post_boxed(event, type_id, supertypes),
        }
    }

    /// Read-only view of every currently registered descriptor.
    pub fn snapshot(&self) -> Vec<HandlerDescriptorMeta> {
        match &self.backend {
            BusBackend::Shard(s) => s.snapshot(),
            BusBackend::Expander(e) => e.snapshot(),
        }
    }

    /// Number of shards backing this bus (always 1 for the single-shard
    /// backend).
    pub fn shard_count(&self) -> usize {
        match &self.backend {
            BusBackend::Shard(_) => 1,
            BusBackend::Expander(e) => e.shard_count(),
        }
    }

    /// Shared handles to every currently bound descriptor, in
    /// registration order. Used by [`crate::AsyncBus`] to build each
    /// worker's private shard from the same handler set without
    /// re-registering through the caller.
    pub fn descriptors(&self) -> Vec<Arc<HandlerDescriptor>> {
        match &self.backend {
            BusBackend::Shard(s) => s.descriptors(),
            BusBackend::Expander(e) => e.descriptors(),
        }
    }

    /// The per-shard capacity this bus was built with.
    pub fn max_per_shard(&self) -> usize {
        self.max_per_shard
    }

    /// Rebuild an identical, freshly bound `Bus` from this one's current
    /// descriptor set. Used by [`crate::AsyncBus`] to give each worker its
    /// own private, independently owned copy of the parent's handler set.
    pub fn rebuild_copy(&self) -> Result<Bus, CapacityExceeded> {
        let descriptors = self.descriptors();
        let cap = self.max_per_shard;
        if descriptors.len() <= cap {
            let mut shard = DispatcherShard::with_capacity(cap);
            for d in descriptors {
                shard.register_shared(d)?;
            }
            shard.bind();
            Ok(Bus {
                backend: BusBackend::Shard(shard),
                max_per_shard: cap,
            })
        } else {
            let template = DispatcherShard::with_capacity(cap);
            let mut expander = Expander::new(&template, cap);
            for d in descriptors {
                expander.register_shared(d);
            }
            expander.bind();
            Ok(Bus {
                backend: BusBackend::Expander(expander),
                max_per_shard: cap,
            })
        }
    }
}

/// Accumulates handler descriptors, then produces a bound [`Bus`].
///
/// Mirrors this workspace's existing builder idiom rather than a separate
/// "factory" type: `BusBuilder::new().register(...).build()`.
#[derive(Default)]
pub struct BusBuilder {
    pending: Vec<HandlerDescriptor>,
    max_per_shard: Option<usize>,
}

impl BusBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one descriptor for registration.
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Self {
        self.pending.push(descriptor);
        self
    }

    /// Queue several descriptors for registration.
    pub fn register_all(mut self, descriptors: impl IntoIterator<Item = HandlerDescriptor>) -> Self {
        self.pending.extend(descriptors);
        self
    }

    /// Force the per-shard cap used when partitioning into an
    /// [`Expander`]. Defaults to [`MAX_METHODS`].
    pub fn max_per_shard(mut self, max: usize) -> Self {
        self.max_per_shard = Some(max);
        self
    }

    /// Finalize: choose a single shard when the pending set fits under the
    /// cap, or an expander otherwise, register everything, and bind.
    pub fn build(self) -> Result<Bus, CapacityExceeded> {
        let cap = self.max_per_shard.unwrap_or(MAX_METHODS);

        if self.pending.len() <= cap {
            let mut shard = DispatcherShard::with_capacity(cap);
            shard.register_all(self.pending)?;
            shard.bind();
            Ok(Bus {
                backend: BusBackend::Shard(shard),
                max_per_shard: cap,
            })
        } else {
            let template = DispatcherShard::with_capacity(cap);
            let mut expander = Expander::new(&template, cap);
            expander.register_all(self.pending);
            expander.bind();
            Ok(Bus {
                backend: BusBackend::Expander(expander),
                max_per_shard: cap,
            })
        }
    }
}
