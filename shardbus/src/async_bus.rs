//! The asynchronous bus: a work queue drained by `N` worker tasks, each
//! running its own private copy of the dispatcher against the parent's
//! most recently bound handler set.

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use shardbus_core::{CapacityExceeded, EventKind, HandlerDescriptor};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;

use crate::bus::{Bus, BusBuilder};

/// Default idle period before a worker parks waiting for the next event,
/// matching the design's documented default.
pub const THREAD_SLEEP_DELAY: Duration = Duration::from_millis(1000);

/// A callback invoked, under a lock shared by every worker, with each
/// event after its worker's private shard has finished dispatching it.
pub type Feedback = Box<dyn Fn(&dyn EventKind) + Send + Sync>;

struct QueuedEvent {
    event: Box<dyn EventKind>,
    type_id: TypeId,
    supertypes: &'static [TypeId],
}

struct Inner {
    template: Bus,
    worker_count: usize,
    manual_management: bool,
    sleep_delay: Duration,
    sender: StdMutex<Option<mpsc::UnboundedSender<QueuedEvent>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    feedback: Arc<StdMutex<Option<Feedback>>>,
    active_workers: Arc<AtomicUsize>,
}

/// Queues events for `N` worker tasks, each holding its own private
/// dispatcher copy so workers never share mutable handler state.
///
/// Posting never blocks on dispatch; callers that need the outcome of
/// dispatch set a [`Feedback`] callback, invoked once per event after its
/// worker finishes, serialized across all workers.
pub struct AsyncBus {
    inner: Arc<Inner>,
}

impl AsyncBus {
    /// Enqueue `event` for asynchronous dispatch and return immediately.
    ///
    /// `E` must be [`Clone`]: the clone is what travels through the
    /// queue and is handed to a worker's private shard, while the
    /// original value returns to the caller unprocessed — mirroring the
    /// design's "returns immediately with the unprocessed event" contract
    /// without requiring a second round-trip through the queue to get a
    /// value back.
    pub fn post<E: EventKind + Clone>(&self, event: E) -> E {
        let queued = QueuedEvent {
            event: Box::new(event.clone()),
            type_id: TypeId::of::<E>(),
            supertypes: E::supertypes(),
        };
        if let Some(sender) = self.inner.sender.lock().unwrap().as_ref() {
            if sender.send(queued).is_err() {
                tracing::warn!("async bus queue closed; event dropped");
            }
        } else {
            tracing::warn!("post() called with workers stopped; event dropped");
        }
        event
    }

    /// Set the feedback callback, replacing any previous one. Returns
    /// `self` for chaining, per the design's `async.set_feedback(cb) ->
    /// the async bus` contract.
    pub fn set_feedback<F>(&self, callback: F) -> &Self
    where
        F: Fn(&dyn EventKind) + Send + Sync + 'static,
    {
        *self.inner.feedback.lock().unwrap() = Some(Box::new(callback));
        self
    }

    /// Clear any feedback callback.
    pub fn clear_feedback(&self) {
        *self.inner.feedback.lock().unwrap() = None;
    }

    /// Spawn `worker_count` tasks, each rebuilding a private copy of the
    /// parent's bound handler set. Replaces any previously running
    /// workers' queue (a fresh channel is created), but does not join the
    /// old workers — call [`AsyncBus::stop_workers`] first if any are
    /// still running.
    pub async fn start_workers(&self) -> Result<(), CapacityExceeded> {
        let (tx, rx) = mpsc::unbounded_channel::<QueuedEvent>();
        let shared_rx = Arc::new(AsyncMutex::new(rx));

        let mut handles = Vec::with_capacity(self.inner.worker_count);
        for id in 0..self.inner.worker_count {
            let private_bus = self.inner.template.rebuild_copy()?;
            let rx = Arc::clone(&shared_rx);
            let feedback = Arc::clone(&self.inner.feedback);
            let manual = self.inner.manual_management;
            let delay = self.inner.sleep_delay;
            let active = ActiveHandle(Arc::clone(&self.inner.active_workers));
            handles.push(tokio::spawn(worker_loop(
                id,
                rx,
                private_bus,
                feedback,
                manual,
                delay,
                active,
            )));
        }

        *self.inner.sender.lock().unwrap() = Some(tx);
        *self.inner.workers.lock().unwrap() = handles;
        tracing::info!(workers = self.inner.worker_count, "async bus workers started");
        Ok(())
    }

    /// Close the queue and join every worker. Events still queued when
    /// this is called are discarded once the workers drain them without
    /// a sender to keep the channel open past that point; events
    /// enqueued after this call returns are not dispatched at all.
    pub async fn stop_workers(&self) {
        self.inner.sender.lock().unwrap().take();
        let handles: Vec<_> = std::mem::take(&mut *self.inner.workers.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("async bus workers stopped");
    }

    /// Number of events a still-running worker is currently holding the
    /// queue lock for (0 or 1, since one shared receiver serializes
    /// dequeues); exposed for diagnostics/tests, not part of the
    /// documented contract.
    pub fn active_worker_count(&self) -> usize {
        self.inner.active_workers.load(Ordering::Relaxed)
    }

    /// Build a fresh `AsyncBus` with the same handler set, worker count,
    /// and sleep/manual-management configuration, but no running workers
    /// and no feedback callback — matching the design's `copy_bus()`.
    pub fn copy_bus(&self) -> Result<AsyncBus, CapacityExceeded> {
        let template = self.inner.template.rebuild_copy()?;
        Ok(AsyncBus {
            inner: Arc::new(Inner {
                template,
                worker_count: self.inner.worker_count,
                manual_management: self.inner.manual_management,
                sleep_delay: self.inner.sleep_delay,
                sender: StdMutex::new(None),
                workers: StdMutex::new(Vec::new()),
                feedback: Arc::new(StdMutex::new(None)),
                active_workers: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }
}

/// A worker dequeues one event at a time from the channel shared (behind
/// an async mutex) with every sibling worker, runs it through its own
/// private [`Bus`], then invokes the feedback callback if one is set.
///
/// In the default mode, `recv().await` is the park/sleep suspension point
/// the design calls for: with nothing queued the worker simply isn't
/// polled again until a `send` wakes it. `manual_management` instead
/// spin-checks with `try_recv` on a `sleep_delay` interval, for callers
/// that want to manage scheduling themselves.
async fn worker_loop(
    _id: usize,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<QueuedEvent>>>,
    bus: Bus,
    feedback: Arc<StdMutex<Option<Feedback>>>,
    manual_management: bool,
    sleep_delay: Duration,
    active: ActiveHandle,
) {
    loop {
        let next = if manual_management {
            loop {
                let mut guard = receiver.lock().await;
                match guard.try_recv() {
                    Ok(queued) => break Some(queued),
                    Err(mpsc::error::TryRecvError::Disconnected) => break None,
                    Err(mpsc::error::TryRecvError::Empty) => {
                        drop(guard);
                        tokio::time::sleep(sleep_delay).await;
                    }
                }
            }
        } else {
            receiver.lock().await.recv().await
        };

        let Some(queued) = next else { break };
        active.enter();

        match bus.post_boxed(queued.event, queued.type_id, queued.supertypes) {
            Ok(processed) => {
                if let Some(cb) = feedback.lock().unwrap().as_deref() {
                    cb(processed.as_ref());
                }
            }
            Err(_not_bound) => {
                tracing::warn!("async worker's private bus was never bound; event dropped");
            }
        }

        active.exit();
    }
}

/// Tiny RAII-free counter tracking how many workers are mid-dispatch,
/// for [`AsyncBus::active_worker_count`].
struct ActiveHandle(Arc<AtomicUsize>);

impl ActiveHandle {
    fn enter(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    fn exit(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Accumulates handler descriptors and worker-pool configuration, then
/// produces an [`AsyncBus`] with its workers not yet started.
#[derive(Default)]
pub struct AsyncBusBuilder {
    pending: Vec<HandlerDescriptor>,
    max_per_shard: Option<usize>,
    worker_count: Option<usize>,
    manual_management: bool,
    sleep_delay: Option<Duration>,
}

impl AsyncBusBuilder {
    /// An empty builder. Defaults to one worker, automatic sleep/wake,
    /// and the design's default sleep delay.
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

    /// Per-shard capacity used if partitioning into an expander is
    /// required. See [`BusBuilder::max_per_shard`].
    pub fn max_per_shard(mut self, max: usize) -> Self {
        self.max_per_shard = Some(max);
        self
    }

    /// Number of worker tasks. Defaults to 1.
    pub fn workers(mut self, count: usize) -> Self {
        self.worker_count = Some(count.max(1));
        self
    }

    /// Disable blocking `recv` in favor of a `try_recv` spin-check on
    /// `sleep_delay`, for callers managing their own scheduling.
    pub fn manual_management(mut self, enabled: bool) -> Self {
        self.manual_management = enabled;
        self
    }

    /// Override the default idle/spin interval ([`THREAD_SLEEP_DELAY`]).
    pub fn sleep_delay(mut self, delay: Duration) -> Self {
        self.sleep_delay = Some(delay);
        self
    }

    /// Finalize: bind the handler set into a [`Bus`] exactly as
    /// [`BusBuilder`] would, then wrap it as an `AsyncBus`. Call
    /// [`AsyncBus::start_workers`] to begin dispatching.
    pub fn build(self) -> Result<AsyncBus, CapacityExceeded> {
        let mut builder = BusBuilder::new().register_all(self.pending);
        if let Some(cap) = self.max_per_shard {
            builder = builder.max_per_shard(cap);
        }
        let template = builder.build()?;

        Ok(AsyncBus {
            inner: Arc::new(Inner {
                template,
                worker_count: self.worker_count.unwrap_or(1),
                manual_management: self.manual_management,
                sleep_delay: self.sleep_delay.unwrap_or(THREAD_SLEEP_DELAY),
                sender: StdMutex::new(None),
                workers: StdMutex::new(Vec::new()),
                feedback: Arc::new(StdMutex::new(None)),
                active_workers: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }
}
