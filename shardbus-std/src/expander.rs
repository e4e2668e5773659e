//! The multi-shard expander: lifts a single shard's fixed-capacity limit
//! by partitioning handlers across several [`DispatcherShard`]s.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use shardbus_core::{EventKind, HandlerDescriptor, HandlerDescriptorMeta, NotBound};

use crate::shard::{DispatcherShard, MAX_METHODS};

/// Partitions a growing set of handlers across however many
/// [`DispatcherShard`]s are needed to keep each under `max_per_shard`.
///
/// `post()` routes only to shards known (via a side index built at
/// `bind()`) to hold a handler for the posted event's concrete type. If no
/// shard has an exact-type match, it falls back to every shard holding a
/// subclass-accepting handler (since those can match a type never
/// explicitly registered) — but if some shard *does* have an exact-type
/// match, subclass-accepting shards are skipped entirely, so exact-over-
/// subclass holds across the whole expander and not just within one
/// shard's own plan. This is option (a) of the two routing strategies the
/// design allows; it is the one this implementation commits to.
pub struct Expander {
    max_per_shard: usize,
    descriptors: Vec<Arc<HandlerDescriptor>>,
    shards: Vec<DispatcherShard>,
    type_index: HashMap<TypeId, Vec<usize>>,
    subclass_shards: Vec<usize>,
}

impl Expander {
    /// Build an expander grouping handlers into shards of at most
    /// `max_per_shard` each (clamped to `[1, MAX_METHODS]`).
    ///
    /// The `template` shard's capacity is reused for every shard the
    /// expander creates; any descriptors already registered on it are not
    /// copied in, since a shard's descriptors are tied to the closures
    /// captured at `HandlerDescriptor::build()` time and generally aren't
    /// meaningful to duplicate across independent shards.
    pub fn new(template: &DispatcherShard, max_per_shard: usize) -> Self {
        let _ = template.capacity();
        Self {
            max_per_shard: max_per_shard.clamp(1, MAX_METHODS),
            descriptors: Vec::new(),
            shards: Vec::new(),
            type_index: HashMap::new(),
            subclass_shards: Vec::new(),
        }
    }

    /// Number of shards produced by the most recent `bind()`.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Total descriptors currently pending partitioning.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Register one descriptor. Takes effect on the next `bind()`.
    pub fn register(&mut self, descriptor: HandlerDescriptor) {
        self.descriptors.push(Arc::new(descriptor));
    }

    /// Register several descriptors at once.
    pub fn register_all(&mut self, descriptors: Vec<HandlerDescriptor>) {
        self.descriptors.extend(descriptors.into_iter().map(Arc::new));
    }

    /// Register an already-shared descriptor, as produced by
    /// [`DispatcherShard::descriptors`] or [`Expander::descriptors`]. Used
    /// to copy one bus's full handler set onto an independent expander
    /// (the async bus's per-worker private backend).
    pub fn register_shared(&mut self, descriptor: Arc<HandlerDescriptor>) {
        self.descriptors.push(descriptor);
    }

    /// Remove the descriptor with the given identity token, if present.
    pub fn unregister(&mut self, identity: usize) -> bool {
        if let Some(pos) = self.descriptors.iter().position(|d| d.identity() == identity) {
            self.descriptors.remove(pos);
            true
        } else {
            false
        }
    }

    /// Empty the pending descriptor set. Takes effect on the next `bind()`.
    pub fn clear(&mut self) {
        self.descriptors.clear();
    }

    /// Re-partition the full current descriptor set into fresh shards and
    /// bind each one.
    pub fn bind(&mut self) {
        let groups = partition(&self.descriptors, self.max_per_shard);

        let mut shards = Vec::with_capacity(groups.len());
        let mut type_index: HashMap<TypeId, Vec<usize>> = HashMap::new();
        let mut subclass_shards = Vec::new();

        for (i, group) in groups.iter().enumerate() {
            let mut shard = DispatcherShard::new();
            let mut has_subclass = false;
            for desc in group {
                has_subclass |= desc.accept_subclasses();
                let entry = type_index.entry(desc.event_type()).or_default();
                if entry.last() != Some(&i) {
                    entry.push(i);
                }
                shard
                    .register_shared(Arc::clone(desc))
                    .expect("group sized within shard capacity during partitioning");
            }
            shard.bind();
            if has_subclass {
                subclass_shards.push(i);
            }
            shards.push(shard);
        }

        tracing::debug!(
            shards = shards.len(),
            handlers = self.descriptors.len(),
            max_per_shard = self.max_per_shard,
            "expander bound"
        );

        self.shards = shards;
        self.type_index = type_index;
        self.subclass_shards = subclass_shards;
    }

    /// Route `event` to the shards known to hold a matching handler.
    pub fn post<E: EventKind>(&self, mut event: E) -> Result<E, NotBound> {
        if self.shards.is_empty() {
            return Err(NotBound);
        }
        if self.shards.len() == 1 {
            return self.shards[0].post(event);
        }

        for i in self.route_indices(TypeId::of::<E>()) {
            event = self.shards[i].post(event)?;
            if let Some(c) = event.as_cancellable() {
                if c.is_cancelled() {
                    break;
                }
            }
        }
        Ok(event)
    }

    /// Type-erased counterpart of [`Expander::post`], used by the async
    /// worker loop.
    pub fn post_boxed(
        &self,
        mut event: Box<dyn EventKind>,
        type_id: TypeId,
        supertypes: &[TypeId],
    ) -> Result<Box<dyn EventKind>, NotBound> {
        if self.shards.is_empty() {
            return Err(NotBound);
        }
        if self.shards.len() == 1 {
            return self.shards[0].post_boxed(event, type_id, supertypes);
        }

        for i in self.route_indices(type_id) {
            event = self.shards[i].post_boxed(event, type_id, supertypes)?;
            if let Some(c) = event.as_cancellable() {
                if c.is_cancelled() {
                    break;
                }
            }
        }
        Ok(event)
    }

    /// Shards to visit for a posted event's concrete type.
    ///
    /// `type_index` only ever maps a `TypeId` to the shard(s) holding an
    /// *exact*-type handler for it (see `bind()`), so a non-empty lookup
    /// here means some shard somewhere has an exact-type match. In that
    /// case subclass-accepting shards are excluded from the route
    /// entirely — exact-over-subclass must hold bus-wide, not just within
    /// whichever single shard happens to own the exact handler.
    fn route_indices(&self, type_id: TypeId) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .type_index
            .get(&type_id)
            .cloned()
            .unwrap_or_default();
        if indices.is_empty() {
            for &i in &self.subclass_shards {
                if !indices.contains(&i) {
                    indices.push(i);
                }
            }
        }
        indices.sort_unstable();
        indices
    }

    /// Read-only view of every shard's current descriptors, in shard
    /// creation order.
    pub fn snapshot(&self) -> Vec<HandlerDescriptorMeta> {
        self.shards.iter().flat_map(|s| s.snapshot()).collect()
    }

    /// Shared handles to every descriptor across all shards, in shard
    /// creation order. Used to copy the full handler set onto an
    /// independently bound shard or expander elsewhere (the async bus's
    /// per-worker private shards).
    pub fn descriptors(&self) -> Vec<Arc<HandlerDescriptor>> {
        self.shards.iter().flat_map(|s| s.descriptors()).collect()
    }
}

/// Group descriptors by event type (preserving first-seen order), never
/// splitting a bucket across groups unless the bucket alone exceeds
/// `max_per_shard` — in which case the bucket is pre-sorted by priority
/// and sliced into contiguous, priority-ordered chunks so cross-shard
/// dispatch order (shards run in creation order) still respects priority.
fn partition(
    descriptors: &[Arc<HandlerDescriptor>],
    max_per_shard: usize,
) -> Vec<Vec<Arc<HandlerDescriptor>>> {
    let mut order: Vec<TypeId> = Vec::new();
    let mut by_type: HashMap<TypeId, Vec<Arc<HandlerDescriptor>>> = HashMap::new();
    for d in descriptors {
        let t = d.event_type();
        by_type.entry(t).or_insert_with(|| {
            order.push(t);
            Vec::new()
        });
        by_type.get_mut(&t).unwrap().push(Arc::clone(d));
    }

    let mut groups: Vec<Vec<Arc<HandlerDescriptor>>> = Vec::new();
    let mut current: Vec<Arc<HandlerDescriptor>> = Vec::new();

    for t in order {
        let mut bucket = by_type.remove(&t).unwrap();
        bucket.sort_by(|a, b| b.priority().cmp(&a.priority()));

        if bucket.len() > max_per_shard {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            let mut iter = bucket.into_iter();
            loop {
                let chunk: Vec<_> = iter.by_ref().take(max_per_shard).collect();
                if chunk.is_empty() {
                    break;
                }
                groups.push(chunk);
            }
        } else {
            if current.len() + bucket.len() > max_per_shard {
                groups.push(std::mem::take(&mut current));
            }
            current.extend(bucket);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardbus_core::Handler;
    use std::any::Any;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<i32>>);
    impl Handler for Log {}
    impl Log {
        fn push(&self, p: i32) {
            self.0.lock().unwrap().push(p);
        }
        fn snapshot(&self) -> Vec<i32> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Ping;
    impl EventKind for Ping {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Ranked(Arc<Log>, i32);
    impl Handler for Ranked {}
    fn invoke_ranked(t: &Ranked, _e: &mut Ping) {
        t.0.push(t.1);
    }

    struct Base;
    impl EventKind for Base {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Derived;
    impl EventKind for Derived {
        fn supertypes() -> &'static [TypeId] {
            use std::sync::OnceLock;
            static IDS: OnceLock<[TypeId; 1]> = OnceLock::new();
            IDS.get_or_init(|| [TypeId::of::<Base>()])
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn exact_match_in_one_shard_suppresses_subclass_handler_in_another() {
        fn log_base(t: &Log, _e: &mut Base) {
            t.push(1);
        }
        fn log_derived(t: &Log, _e: &mut Derived) {
            t.push(2);
        }

        let log = Arc::new(Log::default());
        let template = DispatcherShard::new();
        // max_per_shard = 1 forces the Base and Derived descriptors onto
        // separate shards, since they belong to different event-type
        // buckets.
        let mut expander = Expander::new(&template, 1);
        expander.register(
            HandlerDescriptor::builder(Arc::clone(&log), log_base)
                .accept_subclasses(true)
                .build()
                .unwrap(),
        );
        expander.register(
            HandlerDescriptor::builder(Arc::clone(&log), log_derived)
                .build()
                .unwrap(),
        );
        expander.bind();
        assert_eq!(expander.shard_count(), 2);

        expander.post(Derived).unwrap();
        assert_eq!(log.snapshot(), vec![2], "the Base subclass handler must not fire");
    }

    #[test]
    fn partitions_101_handlers_into_three_shards_in_priority_order() {
        let log = Arc::new(Log::default());
        let template = DispatcherShard::new();
        let mut expander = Expander::new(&template, 50);

        for i in 0..101 {
            let priority = 101 - i;
            let target = Arc::new(Ranked(Arc::clone(&log), priority));
            expander.register(
                HandlerDescriptor::builder(target, invoke_ranked)
                    .priority(priority)
                    .build()
                    .unwrap(),
            );
        }

        expander.bind();
        assert_eq!(expander.shard_count(), 3);
        expander.post(Ping).unwrap();

        let got = log.snapshot();
        let mut expected: Vec<i32> = (1..=101).collect();
        expected.reverse();
        assert_eq!(got, expected);
    }
}
