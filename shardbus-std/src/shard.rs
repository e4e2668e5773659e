//! The dispatcher shard: a fixed-capacity registry plus its specialized
//! dispatch plan.

use std::any::TypeId;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use shardbus_core::{
    CapacityExceeded, DispatchError, EventKind, ExceptionEvent, ExceptionLevel, HandlerDescriptor,
    HandlerDescriptorMeta, NotBound,
};

/// Default per-shard handler capacity, matching the design default.
pub const MAX_METHODS: usize = 256;

/// The three states a shard moves through. `post()` only requires that a
/// plan exist — a shard that has registered new descriptors since its
/// last `bind()` is `Dirty` but continues serving the previous plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    /// No registrations and no successful bind yet.
    Empty,
    /// Registrations (or unregistrations) since the last successful bind.
    Dirty,
    /// `bind()` has produced a plan and nothing has changed since.
    Bound,
}

struct Entry {
    desc: Arc<HandlerDescriptor>,
    seq: u64,
}

#[derive(Default)]
struct Registry {
    buckets: HashMap<TypeId, Vec<Entry>>,
    count: usize,
    next_seq: u64,
}

impl Registry {
    fn register(&mut self, desc: HandlerDescriptor, capacity: usize) -> Result<(), CapacityExceeded> {
        self.register_arc(Arc::new(desc), capacity)
    }

    fn register_arc(
        &mut self,
        desc: Arc<HandlerDescriptor>,
        capacity: usize,
    ) -> Result<(), CapacityExceeded> {
        if self.count >= capacity {
            return Err(CapacityExceeded { capacity });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.count += 1;
        self.buckets
            .entry(desc.event_type())
            .or_default()
            .push(Entry { desc, seq });
        Ok(())
    }

    fn unregister(&mut self, identity: usize) -> bool {
        let mut found = false;
        let mut emptied = None;
        for (type_id, bucket) in self.buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|e| e.desc.identity() == identity) {
                bucket.remove(pos);
                self.count -= 1;
                found = true;
                if bucket.is_empty() {
                    emptied = Some(*type_id);
                }
                break;
            }
        }
        if let Some(type_id) = emptied {
            // Drop the now-empty bucket key entirely: a lingering empty
            // `Vec` under `buckets` would otherwise be copied into
            // `Plan::exact` by `Plan::build` and read as "an exact-type
            // handler exists for this type", permanently suppressing
            // subclass fallback for it.
            self.buckets.remove(&type_id);
        }
        found
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.count = 0;
    }

    fn snapshot(&self) -> Vec<HandlerDescriptorMeta> {
        let mut all: Vec<&Entry> = self.buckets.values().flatten().collect();
        all.sort_by(|a, b| a.seq.cmp(&b.seq));
        all.into_iter().map(|e| e.desc.meta().clone()).collect()
    }

    fn descriptors(&self) -> Vec<Arc<HandlerDescriptor>> {
        let mut all: Vec<&Entry> = self.buckets.values().flatten().collect();
        all.sort_by(|a, b| a.seq.cmp(&b.seq));
        all.into_iter().map(|e| Arc::clone(&e.desc)).collect()
    }
}

/// The generated, immutable dispatch table for one `bind()`'s snapshot.
///
/// This is the "interpreted plan" generation strategy: a flat per-type
/// bucket of priority-sorted descriptors, plus one global
/// subclass-accepting list, sorted once up front so `post()` is a map
/// lookup and a straight walk.
struct Plan {
    exact: HashMap<TypeId, Vec<Arc<HandlerDescriptor>>>,
    subclass: Vec<Arc<HandlerDescriptor>>,
}

impl Plan {
    fn build(registry: &Registry) -> Self {
        let mut exact: HashMap<TypeId, Vec<Arc<HandlerDescriptor>>> = HashMap::new();
        let mut subclass_entries: Vec<(i32, u64, Arc<HandlerDescriptor>)> = Vec::new();

        for (type_id, bucket) in &registry.buckets {
            if bucket.is_empty() {
                // Shouldn't happen — `Registry::unregister` drops the key
                // once its bucket empties — but an empty bucket must never
                // be read as "an exact-type handler exists for this type".
                continue;
            }
            let mut sorted: Vec<&Entry> = bucket.iter().collect();
            sorted.sort_by(|a, b| b.desc.priority().cmp(&a.desc.priority()).then(a.seq.cmp(&b.seq)));
            exact.insert(*type_id, sorted.iter().map(|e| Arc::clone(&e.desc)).collect());

            for e in bucket {
                if e.desc.accept_subclasses() {
                    subclass_entries.push((e.desc.priority(), e.seq, Arc::clone(&e.desc)));
                }
            }
        }

        subclass_entries.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let subclass = subclass_entries.into_iter().map(|(_, _, d)| d).collect();

        Plan { exact, subclass }
    }
}

/// A fixed-capacity handler table with a specialized dispatch plan.
///
/// Created empty, accumulates descriptors via [`DispatcherShard::register`],
/// becomes active on [`DispatcherShard::bind`], and may be
/// [`DispatcherShard::clear`]ed and reused.
pub struct DispatcherShard {
    capacity: usize,
    registry: Registry,
    plan: Option<Plan>,
    dirty: bool,
}

impl Default for DispatcherShard {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherShard {
    /// A shard with the default capacity ([`MAX_METHODS`]).
    pub fn new() -> Self {
        Self::with_capacity(MAX_METHODS)
    }

    /// A shard with an explicit capacity, clamped to `[1, MAX_METHODS]`.
    ///
    /// Used by the expander to build per-group shards from its template.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.clamp(1, MAX_METHODS),
            registry: Registry::default(),
            plan: None,
            dirty: false,
        }
    }

    /// The shard's fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of descriptors currently registered.
    pub fn len(&self) -> usize {
        self.registry.count
    }

    pub fn is_empty(&self) -> bool {
        self.registry.count == 0
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShardState {
        if self.dirty {
            ShardState::Dirty
        } else if self.plan.is_some() {
            ShardState::Bound
        } else {
            ShardState::Empty
        }
    }

    /// Register one descriptor. Takes effect on the next `bind()`.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Result<(), CapacityExceeded> {
        self.registry.register(descriptor, self.capacity)?;
        self.dirty = true;
        Ok(())
    }

    /// Register several descriptors, failing before any are inserted if
    /// the whole batch would not fit.
    pub fn register_all(
        &mut self,
        descriptors: Vec<HandlerDescriptor>,
    ) -> Result<(), CapacityExceeded> {
        if self.registry.count + descriptors.len() > self.capacity {
            return Err(CapacityExceeded {
                capacity: self.capacity,
            });
        }
        for d in descriptors {
            self.registry.register(d, self.capacity)?;
        }
        self.dirty = true;
        Ok(())
    }

    /// Register an already-shared descriptor without taking sole
    /// ownership of it. Used by the expander, whose pending descriptor
    /// set must survive repartitioning across rebinds, and by callers
    /// (the async bus's worker pool) that need the same handler set
    /// installed on several independent shards at once.
    pub fn register_shared(&mut self, descriptor: Arc<HandlerDescriptor>) -> Result<(), CapacityExceeded> {
        self.registry.register_arc(descriptor, self.capacity)?;
        self.dirty = true;
        Ok(())
    }

    /// Remove the descriptor with the given identity token, if present.
    pub fn unregister(&mut self, identity: usize) -> bool {
        let removed = self.registry.unregister(identity);
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Empty the registry. Takes effect on the next `bind()`.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.dirty = true;
    }

    /// Snapshot the registry into a fresh plan and install it as active.
    pub fn bind(&mut self) {
        let plan = Plan::build(&self.registry);
        tracing::debug!(
            handlers = self.registry.count,
            buckets = plan.exact.len(),
            subclass_handlers = plan.subclass.len(),
            "shard bound"
        );
        self.plan = Some(plan);
        self.dirty = false;
    }

    /// Read-only view of currently registered descriptors, in
    /// registration order, for diagnostics and testing.
    pub fn snapshot(&self) -> Vec<HandlerDescriptorMeta> {
        self.registry.snapshot()
    }

    /// Shared handles to every currently registered descriptor, in
    /// registration order. Used to copy a shard's handler set into
    /// independent shards (the expander's per-group shards, and the
    /// async bus's per-worker private shards) without re-registering
    /// through the caller.
    pub fn descriptors(&self) -> Vec<Arc<HandlerDescriptor>> {
        self.registry.descriptors()
    }

    /// Route `event` through the active plan.
    ///
    /// Exact-type matches run first and, if any exist for `event`'s
    /// concrete type, suppress subclass dispatch entirely. Within a
    /// bucket: filter check, then cancellation check, then the enable
    /// gate (skipped when `forced`), then invocation, in priority order.
    pub fn post<E: EventKind>(&self, mut event: E) -> Result<E, NotBound> {
        self.dispatch_at_depth(&mut event, TypeId::of::<E>(), E::supertypes(), 0)?;
        Ok(event)
    }

    /// Type-erased dispatch entry point for callers that only have a
    /// `Box<dyn EventKind>` (the async worker loop, which queues
    /// heterogeneous event types). `type_id`/`supertypes` are passed
    /// explicitly since `EventKind::supertypes` is not available through
    /// a trait object.
    pub fn post_boxed(
        &self,
        mut event: Box<dyn EventKind>,
        type_id: TypeId,
        supertypes: &[TypeId],
    ) -> Result<Box<dyn EventKind>, NotBound> {
        self.dispatch_at_depth(event.as_mut(), type_id, supertypes, 0)?;
        Ok(event)
    }

    fn dispatch_at_depth(
        &self,
        event: &mut dyn EventKind,
        type_id: TypeId,
        supertypes: &[TypeId],
        depth: u8,
    ) -> Result<(), NotBound> {
        let plan = self.plan.as_ref().ok_or(NotBound)?;

        if let Some(bucket) = plan.exact.get(&type_id).filter(|b| !b.is_empty()) {
            for d in bucket {
                match run_step(d, event) {
                    StepOutcome::Continued => {}
                    StepOutcome::Cancelled => return Ok(()),
                    StepOutcome::Panicked(level, payload) => {
                        self.handle_panic(d, level, payload, event, depth)
                    }
                }
            }
            return Ok(());
        }

        for d in &plan.subclass {
            if !d.matches_subtype(type_id, supertypes) {
                continue;
            }
            match run_step(d, event) {
                StepOutcome::Continued => {}
                StepOutcome::Cancelled => return Ok(()),
                StepOutcome::Panicked(level, payload) => {
                    self.handle_panic(d, level, payload, event, depth)
                }
            }
        }
        Ok(())
    }

    /// Wrap a caught panic into an `ExceptionEvent` and re-post it to
    /// this same shard, once per level — a panic while dispatching the
    /// `ExceptionEvent` itself is logged and dropped rather than
    /// re-wrapped.
    fn handle_panic(
        &self,
        d: &HandlerDescriptor,
        level: ExceptionLevel,
        payload: Box<dyn std::any::Any + Send>,
        event: &dyn EventKind,
        depth: u8,
    ) {
        let error = DispatchError::from_panic(d.meta().method_name, payload);
        tracing::warn!(
            handler = d.meta().method_name,
            event_type = d.meta().event_type_name,
            stage = ?level,
            message = %error.message,
            "handler panicked during dispatch"
        );
        if depth >= 1 {
            tracing::error!(
                handler = d.meta().method_name,
                "panic while dispatching an ExceptionEvent; dropping rather than re-wrapping"
            );
            return;
        }
        let _ = event;
        let mut exception = ExceptionEvent {
            cause: error.message,
            source_event_type: d.meta().event_type_name,
            level,
        };
        match self.dispatch_at_depth(
            &mut exception,
            TypeId::of::<ExceptionEvent>(),
            &[],
            depth + 1,
        ) {
            Ok(()) => {}
            Err(_not_bound) => {
                tracing::warn!("no bound plan to receive re-posted ExceptionEvent");
            }
        }
    }
}

enum StepOutcome {
    Continued,
    Cancelled,
    Panicked(ExceptionLevel, Box<dyn std::any::Any + Send>),
}

/// One descriptor's worth of the plan: filter, then cancellation, then
/// the enable gate, then invoke. Each stage that can run arbitrary user
/// code is wrapped in its own panic barrier so a caught panic can be
/// attributed to the stage that actually raised it — `handle_panic` reads
/// that stage off `StepOutcome::Panicked` to set `ExceptionEvent::level`
/// instead of assuming every panic came from the handler itself.
fn run_step(d: &HandlerDescriptor, event: &mut dyn EventKind) -> StepOutcome {
    let filter_result = panic::catch_unwind(AssertUnwindSafe(|| d.filter_passes(event.as_any())));
    match filter_result {
        Ok(true) => {}
        Ok(false) => return StepOutcome::Continued,
        Err(payload) => return StepOutcome::Panicked(ExceptionLevel::Filter, payload),
    }

    if let Some(c) = event.as_cancellable_mut() {
        if c.is_cancelled() {
            return StepOutcome::Cancelled;
        }
    }

    if !d.forced() {
        let enabled_result = panic::catch_unwind(AssertUnwindSafe(|| d.is_enabled()));
        match enabled_result {
            Ok(true) => {}
            Ok(false) => return StepOutcome::Continued,
            Err(payload) => return StepOutcome::Panicked(ExceptionLevel::EnableCheck, payload),
        }
    }

    let invoke_result = panic::catch_unwind(AssertUnwindSafe(|| d.invoke(event.as_any_mut())));
    match invoke_result {
        Ok(()) => StepOutcome::Continued,
        Err(payload) => StepOutcome::Panicked(ExceptionLevel::Handler, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardbus_core::{CancellableMut, CancellableRef, Filter, Handler};
    use std::any::Any;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log(Mutex<Vec<&'static str>>);
    impl Handler for Log {}
    impl Log {
        fn push(&self, s: &'static str) {
            self.0.lock().unwrap().push(s);
        }
        fn snapshot(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Ping {
        cancelled: bool,
    }
    impl EventKind for Ping {
        fn as_cancellable_mut(&mut self) -> Option<&mut dyn CancellableMut> {
            Some(self)
        }
        fn as_cancellable(&self) -> Option<&dyn CancellableRef> {
            Some(self)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }
    impl CancellableRef for Ping {
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }
    impl CancellableMut for Ping {
        fn set_cancelled(&mut self, cancelled: bool) {
            self.cancelled = cancelled;
        }
    }

    struct Base;
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

    fn log_a(t: &Log, _e: &mut Ping) {
        t.push("a");
    }
    fn log_b(t: &Log, _e: &mut Ping) {
        t.push("b");
    }
    fn log_c(t: &Log, _e: &mut Ping) {
        t.push("c");
    }

    #[test]
    fn priority_filter_and_enable() {
        struct RejectAll;
        impl<E> Filter<E> for RejectAll {
            fn filter(&self, _e: &E) -> bool {
                false
            }
        }

        let log = Arc::new(Log::default());
        let mut shard = DispatcherShard::new();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_a)
                    .priority(10)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_b)
                    .priority(5)
                    .set_filter(RejectAll)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_c)
                    .priority(0)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard.bind();

        shard.post(Ping { cancelled: false }).unwrap();
        assert_eq!(log.snapshot(), vec!["a", "c"]);
    }

    #[test]
    fn cancellation_short_circuits() {
        struct Canceler;
        impl Handler for Canceler {}
        fn cancel_it(_t: &Canceler, e: &mut Ping) {
            e.cancelled = true;
        }

        let log = Arc::new(Log::default());
        let canceler = Arc::new(Canceler);
        let mut shard = DispatcherShard::new();
        shard
            .register(
                HandlerDescriptor::builder(canceler, cancel_it)
                    .priority(10)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_b)
                    .priority(5)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard.bind();

        let posted = shard.post(Ping { cancelled: false }).unwrap();
        assert!(posted.cancelled);
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn exact_suppresses_subclass() {
        let log = Arc::new(Log::default());
        fn log_derived(t: &Log, _e: &mut Derived) {
            t.push("derived");
        }
        fn log_base(t: &Log, _e: &mut Base) {
            t.push("base");
        }
        impl EventKind for Base {
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut shard = DispatcherShard::new();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_base)
                    .accept_subclasses(true)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_derived)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard.bind();

        shard.post(Derived).unwrap();
        assert_eq!(log.snapshot(), vec!["derived"]);
    }

    #[test]
    fn unregistering_last_exact_handler_reopens_subclass_fallback() {
        let log = Arc::new(Log::default());
        fn log_derived(t: &Log, _e: &mut Derived) {
            t.push("derived");
        }
        fn log_base(t: &Log, _e: &mut Base) {
            t.push("base");
        }
        impl EventKind for Base {
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut shard = DispatcherShard::new();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_base)
                    .accept_subclasses(true)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let derived = HandlerDescriptor::builder(Arc::clone(&log), log_derived)
            .build()
            .unwrap();
        let derived_identity = derived.identity();
        shard.register(derived).unwrap();
        shard.bind();

        shard.post(Derived).unwrap();
        assert_eq!(log.snapshot(), vec!["derived"]);

        // Remove the only exact-type handler for `Derived` and rebind —
        // the subclass-accepting handler for `Base` must now fire.
        assert!(shard.unregister(derived_identity));
        shard.bind();

        shard.post(Derived).unwrap();
        assert_eq!(log.snapshot(), vec!["derived", "base"]);
    }

    #[test]
    fn not_bound_before_bind() {
        let shard = DispatcherShard::new();
        let err = shard.post(Ping { cancelled: false });
        assert!(err.is_err());
    }

    #[test]
    fn capacity_exceeded() {
        struct NoOp;
        impl Handler for NoOp {}
        fn noop(_t: &NoOp, _e: &mut Ping) {}

        let target = Arc::new(NoOp);
        let mut shard = DispatcherShard::with_capacity(1);
        shard
            .register(HandlerDescriptor::builder(Arc::clone(&target), noop).build().unwrap())
            .unwrap();
        let err = shard.register(HandlerDescriptor::builder(target, noop).build().unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn panicking_handler_reposts_exception_event_once() {
        struct Panicker;
        impl Handler for Panicker {}
        fn blow_up(_t: &Panicker, _e: &mut Ping) {
            panic!("boom");
        }
        fn log_exception(t: &Log, e: &mut shardbus_core::ExceptionEvent) {
            assert_eq!(e.level, shardbus_core::ExceptionLevel::Handler);
            t.push("caught");
        }

        let log = Arc::new(Log::default());
        let panicker = Arc::new(Panicker);
        let mut shard = DispatcherShard::new();
        shard
            .register(HandlerDescriptor::builder(panicker, blow_up).build().unwrap())
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_exception)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard.bind();

        let result = shard.post(Ping { cancelled: false });
        assert!(result.is_ok());
        assert_eq!(log.snapshot(), vec!["caught"]);
    }

    #[test]
    fn panicking_filter_reposts_exception_event_with_filter_level() {
        struct BlowUpFilter;
        impl Filter<Ping> for BlowUpFilter {
            fn filter(&self, _e: &Ping) -> bool {
                panic!("filter boom");
            }
        }
        struct NoOp;
        impl Handler for NoOp {}
        fn noop(_t: &NoOp, _e: &mut Ping) {}
        fn log_exception(t: &Log, e: &mut shardbus_core::ExceptionEvent) {
            assert_eq!(e.level, shardbus_core::ExceptionLevel::Filter);
            t.push("caught");
        }

        let log = Arc::new(Log::default());
        let mut shard = DispatcherShard::new();
        shard
            .register(
                HandlerDescriptor::builder(Arc::new(NoOp), noop)
                    .set_filter(BlowUpFilter)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_exception)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard.bind();

        let result = shard.post(Ping { cancelled: false });
        assert!(result.is_ok());
        assert_eq!(log.snapshot(), vec!["caught"]);
    }

    #[test]
    fn panicking_enable_check_reposts_exception_event_with_enable_check_level() {
        struct BlowsUpWhenAsked;
        impl Handler for BlowsUpWhenAsked {
            fn is_enabled(&self) -> bool {
                panic!("is_enabled boom");
            }
        }
        fn noop(_t: &BlowsUpWhenAsked, _e: &mut Ping) {}
        fn log_exception(t: &Log, e: &mut shardbus_core::ExceptionEvent) {
            assert_eq!(e.level, shardbus_core::ExceptionLevel::EnableCheck);
            t.push("caught");
        }

        let log = Arc::new(Log::default());
        let mut shard = DispatcherShard::new();
        shard
            .register(
                HandlerDescriptor::builder(Arc::new(BlowsUpWhenAsked), noop)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard
            .register(
                HandlerDescriptor::builder(Arc::clone(&log), log_exception)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        shard.bind();

        let result = shard.post(Ping { cancelled: false });
        assert!(result.is_ok());
        assert_eq!(log.snapshot(), vec!["caught"]);
    }

    #[test]
    fn clear_then_bind_invokes_nothing() {
        let log = Arc::new(Log::default());
        let mut shard = DispatcherShard::new();
        shard
            .register(HandlerDescriptor::builder(Arc::clone(&log), log_a).build().unwrap())
            .unwrap();
        shard.clear();
        shard.bind();
        shard.post(Ping { cancelled: false }).unwrap();
        assert!(log.snapshot().is_empty());
    }
}
