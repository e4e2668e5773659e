//! Shared fixtures for the facade crate's end-to-end tests: event types
//! and handler targets mirroring the scenarios from the design's
//! testable-properties section.

#![allow(dead_code)]

use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex, OnceLock};

use shardbus::{CancellableMut, CancellableRef, EnabledHandle, EventKind, Filter, Handler};

/// A plain, non-cancellable event with no declared ancestry.
pub struct Ping(pub &'static str);

impl EventKind for Ping {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A cancellable event.
pub struct Signal {
    pub cancelled: bool,
}

impl EventKind for Signal {
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

impl CancellableRef for Signal {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl CancellableMut for Signal {
    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

/// Base event type; `Derived` and `OtherDerived` both declare it as a
/// supertype.
pub struct BaseEvent;
impl EventKind for BaseEvent {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct DerivedEvent;
impl EventKind for DerivedEvent {
    fn supertypes() -> &'static [TypeId] {
        static IDS: OnceLock<[TypeId; 1]> = OnceLock::new();
        IDS.get_or_init(|| [TypeId::of::<BaseEvent>()])
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub struct OtherDerivedEvent;
impl EventKind for OtherDerivedEvent {
    fn supertypes() -> &'static [TypeId] {
        static IDS: OnceLock<[TypeId; 1]> = OnceLock::new();
        IDS.get_or_init(|| [TypeId::of::<BaseEvent>()])
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A handler target recording every invocation it receives, in order.
#[derive(Default)]
pub struct Recorder {
    log: Mutex<Vec<&'static str>>,
    enabled: EnabledHandle,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            enabled: EnabledHandle::new(),
        }
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            enabled: EnabledHandle::with_initial(enabled),
        }
    }

    pub fn push(&self, tag: &'static str) {
        self.log.lock().unwrap().push(tag);
    }

    pub fn snapshot(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }

    pub fn enabled_handle(&self) -> EnabledHandle {
        self.enabled.clone()
    }
}

impl Handler for Recorder {
    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }
}

/// A filter that always returns `false`, skipping its owning handler.
#[derive(Default)]
pub struct RejectAll;
impl<E> Filter<E> for RejectAll {
    fn filter(&self, _event: &E) -> bool {
        false
    }
}

/// Shared counter used by the async-bus feedback scenario.
#[derive(Default)]
pub struct SharedCounter(Arc<Mutex<Vec<u32>>>);

impl SharedCounter {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn handle(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.0)
    }
}

/// A cloneable counting event for the async bus, which requires `Clone`.
#[derive(Clone)]
pub struct Tick(pub u32);

impl EventKind for Tick {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handler target for the async feedback scenario: appends the tick's
/// payload to a shared, mutex-guarded list.
pub struct TickSink(pub Arc<Mutex<Vec<u32>>>);
impl Handler for TickSink {}

pub fn record_tick(t: &TickSink, e: &mut Tick) {
    t.0.lock().unwrap().push(e.0);
}
