//! The handler descriptor and its builder.
//!
//! Rust has no reflection, so there is no "introspect a handler object and
//! discover its subscribed methods" step. Instead a [`HandlerDescriptor`]
//! is produced directly from a `(target, method)` pair through
//! [`HandlerDescriptor::builder`]; everything the source system's analysis
//! pass would reject (wrong arity, non-void return, an abstract parameter
//! type) simply fails to type-check here, so the only runtime-fallible
//! part of construction is filter instantiation.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SubscriptionError;
use crate::event::EventKind;
use crate::filter::{Filter, TryNewFilter};

/// Metadata describing a descriptor, handed to [`Filter::init`] and used
/// for diagnostics and `snapshot()` inspection.
#[derive(Debug, Clone)]
pub struct HandlerDescriptorMeta {
    /// Diagnostic name of the event type this descriptor is bound to.
    pub event_type_name: &'static str,
    /// Diagnostic name of the bound method, for error messages.
    pub method_name: &'static str,
    /// Dispatch priority; higher runs first.
    pub priority: i32,
    /// When true, `is_enabled()` is never consulted.
    pub forced: bool,
    /// When true, this descriptor also matches subtypes of its event type.
    pub accept_subclasses: bool,
}

/// A trait handler targets implement to participate in the `forced` /
/// enable-gate contract.
///
/// The default always reports enabled; handlers that want a runtime
/// toggle pair this with an [`EnabledHandle`] field.
pub trait Handler: Send + Sync + 'static {
    /// Whether this handler currently accepts dispatch. Ignored entirely
    /// when the owning descriptor is `forced`.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// A cloneable, externally-toggleable enabled flag.
///
/// Bundled as the standard way a [`Handler`] backs `is_enabled()` with
/// something callers can flip at runtime without touching the handler's
/// other state.
#[derive(Clone, Default)]
pub struct EnabledHandle(Arc<AtomicBool>);

impl EnabledHandle {
    /// Create a handle that starts enabled.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Create a handle with an explicit initial state.
    pub fn with_initial(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    /// Current state.
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn enable(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn toggle(&self) {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(!v))
            .ok();
    }
}

/// An immutable, type-erased binding of one handler method to its
/// dispatch metadata.
///
/// Descriptors are constructed once via [`HandlerDescriptor::builder`] and
/// never mutated afterward; a shard's registry holds them by value.
pub struct HandlerDescriptor {
    pub(crate) event_type: TypeId,
    pub(crate) supertypes: &'static [TypeId],
    pub(crate) meta: HandlerDescriptorMeta,
    filter: Option<Box<dyn Fn(&dyn Any) -> bool + Send + Sync>>,
    is_enabled: Box<dyn Fn() -> bool + Send + Sync>,
    invoke: Box<dyn Fn(&mut dyn Any) + Send + Sync>,
    /// Identity token used by `unregister`: two descriptors built from the
    /// same `(target, method)` pair compare equal.
    pub(crate) identity: usize,
}

impl HandlerDescriptor {
    /// Start building a descriptor bound to `target`'s `method`.
    pub fn builder<T, E>(target: Arc<T>, method: fn(&T, &mut E)) -> DescriptorBuilder<T, E>
    where
        T: Handler,
        E: EventKind,
    {
        DescriptorBuilder {
            target,
            method,
            method_name: "<method>",
            priority: 0,
            forced: false,
            accept_subclasses: false,
            filter: FilterSlot::None,
        }
    }

    pub fn event_type(&self) -> TypeId {
        self.event_type
    }

    pub fn meta(&self) -> &HandlerDescriptorMeta {
        &self.meta
    }

    pub fn priority(&self) -> i32 {
        self.meta.priority
    }

    pub fn forced(&self) -> bool {
        self.meta.forced
    }

    pub fn accept_subclasses(&self) -> bool {
        self.meta.accept_subclasses
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    /// Whether this subclass-accepting descriptor matches a posted event
    /// whose concrete type is `event_type_id` with declared ancestors
    /// `candidate_supertypes`. Never matches its own exact type — that
    /// case is always served by the exact-type bucket instead.
    pub fn matches_subtype(&self, event_type_id: TypeId, candidate_supertypes: &[TypeId]) -> bool {
        self.meta.accept_subclasses
            && self.event_type != event_type_id
            && candidate_supertypes.contains(&self.event_type)
    }

    /// Evaluate the attached filter, if any. Absent filter means "allow".
    pub fn filter_passes(&self, event: &dyn Any) -> bool {
        match &self.filter {
            Some(f) => f(event),
            None => true,
        }
    }

    /// Consult the target's enable gate. Callers should skip this when
    /// the descriptor is `forced`.
    pub fn is_enabled(&self) -> bool {
        (self.is_enabled)()
    }

    /// Invoke the bound method with a type-erased event reference.
    ///
    /// # Panics
    /// Panics if `event`'s concrete type differs from this descriptor's
    /// `event_type` — callers must only invoke a descriptor on an event
    /// already matched to it by [`HandlerDescriptor::event_type`] or
    /// [`HandlerDescriptor::matches_subtype`].
    pub fn invoke(&self, event: &mut dyn Any) {
        (self.invoke)(event)
    }
}

enum FilterSlot<E> {
    None,
    /// Programmatic attachment: already constructed, `init` is skipped.
    Programmatic(Box<dyn Filter<E>>),
    /// Metadata-driven attachment: constructed and `init`-ed at `build()`.
    Metadata(Box<dyn FnOnce() -> Result<Box<dyn Filter<E>>, SubscriptionError>>),
}

/// Builder returned by [`HandlerDescriptor::builder`].
pub struct DescriptorBuilder<T, E> {
    target: Arc<T>,
    method: fn(&T, &mut E),
    method_name: &'static str,
    priority: i32,
    forced: bool,
    accept_subclasses: bool,
    filter: FilterSlot<E>,
}

impl<T, E> DescriptorBuilder<T, E>
where
    T: Handler,
    E: EventKind,
{
    /// Attach a diagnostic name for the bound method (used in error
    /// messages and `snapshot()` output).
    pub fn method_name(mut self, name: &'static str) -> Self {
        self.method_name = name;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    pub fn accept_subclasses(mut self, accept: bool) -> Self {
        self.accept_subclasses = accept;
        self
    }

    /// Attach a filter chosen by type: constructed and `init`-ed at
    /// `build()` time, mirroring metadata-driven filter selection.
    pub fn with_filter<F>(mut self) -> Self
    where
        F: TryNewFilter<E>,
    {
        self.filter = FilterSlot::Metadata(Box::new(|| {
            let filter = F::try_new().map_err(|e| SubscriptionError::FilterNotInstantiable {
                which_method: "filter".to_string(),
                source: Box::new(e),
            })?;
            Ok(Box::new(filter) as Box<dyn Filter<E>>)
        }));
        self
    }

    /// Attach an already-constructed filter instance. `init` is never
    /// called on it.
    pub fn set_filter<F>(mut self, filter: F) -> Self
    where
        F: Filter<E>,
    {
        self.filter = FilterSlot::Programmatic(Box::new(filter));
        self
    }

    /// Finalize the descriptor.
    pub fn build(self) -> Result<HandlerDescriptor, SubscriptionError> {
        let meta = HandlerDescriptorMeta {
            event_type_name: std::any::type_name::<E>(),
            method_name: self.method_name,
            priority: self.priority,
            forced: self.forced,
            accept_subclasses: self.accept_subclasses,
        };

        let filter: Option<Box<dyn Filter<E>>> = match self.filter {
            FilterSlot::None => None,
            FilterSlot::Programmatic(f) => Some(f),
            FilterSlot::Metadata(ctor) => {
                let mut f = ctor()?;
                f.init(&meta);
                Some(f)
            }
        };
        let erased_filter: Option<Box<dyn Fn(&dyn Any) -> bool + Send + Sync>> =
            filter.map(|f| {
                let f: Arc<Box<dyn Filter<E>>> = Arc::new(f);
                Box::new(move |event: &dyn Any| {
                    let e = event
                        .downcast_ref::<E>()
                        .expect("filter invoked with mismatched event type");
                    f.filter(e)
                }) as Box<dyn Fn(&dyn Any) -> bool + Send + Sync>
            });

        let target_for_enabled = Arc::clone(&self.target);
        let is_enabled = Box::new(move || target_for_enabled.is_enabled());

        let target = self.target;
        let method = self.method;
        let identity = identity_token(&target, method);
        let invoke = Box::new(move |event: &mut dyn Any| {
            let e = event
                .downcast_mut::<E>()
                .expect("invoke called with mismatched event type");
            method(&target, e);
        });

        Ok(HandlerDescriptor {
            event_type: TypeId::of::<E>(),
            supertypes: E::supertypes(),
            meta,
            filter: erased_filter,
            is_enabled,
            invoke,
            identity,
        })
    }
}

/// Identity for `unregister`: pointer to the target plus the method's
/// function-pointer address. Two descriptors built from the same
/// `(target, method)` pair compare equal; this matches the spec's choice
/// of identity-based removal at the descriptor level.
fn identity_token<T, E>(target: &Arc<T>, method: fn(&T, &mut E)) -> usize {
    let target_addr = Arc::as_ptr(target) as usize;
    let method_addr = method as usize;
    target_addr ^ method_addr.rotate_left(1)
}
