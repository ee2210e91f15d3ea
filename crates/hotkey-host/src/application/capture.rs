//! InputEventCapture: fans every hooked input event out to subscribers.
//!
//! One capture owns the OS hooks for the whole process.  Components that care
//! about input (hotkey trackers, the input blocker, a recording session)
//! register an [`InputSubscriber`] and receive every event in hook order.
//!
//! # Delivery modes
//!
//! - [`DeliveryMode::Realtime`]: subscribers run on the hook thread itself.
//!   Lowest latency, but a slow subscriber risks the OS dropping the hook.
//! - [`DeliveryMode::Queued`] (default): the hook thread pushes events into a
//!   single-producer/single-consumer queue drained by a dedicated consumer
//!   thread.  When at least one subscriber may suppress input, the hook
//!   thread waits for the consumer's verdict, bounded by
//!   [`CaptureOptions::suppression_timeout`]; past the timeout the event is
//!   let through and its ack expires, so a late
//!   [`RawInputEvent::mark_handled`] reports `false`.
//!
//! # Fault isolation
//!
//! A subscriber that returns an error or panics is logged and counted; the
//! remaining subscribers still receive the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use hotkey_core::ModifierTracker;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::infrastructure::input_capture::{
    CaptureError, HookCallback, HookDecision, HookHandle, InputEventKind, InputSource,
    RawInputEvent,
};

/// Default upper bound the hook thread waits for a suppression verdict.
pub const DEFAULT_SUPPRESSION_TIMEOUT: Duration = Duration::from_millis(150);

/// Where subscribers run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// On the hook thread, synchronously.
    Realtime,
    /// On a dedicated consumer thread fed by a queue.
    #[default]
    Queued,
}

/// Construction parameters for [`InputEventCapture::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub delivery_mode: DeliveryMode,
    pub suppression_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Queued,
            suppression_timeout: DEFAULT_SUPPRESSION_TIMEOUT,
        }
    }
}

/// A consumer of captured input.
///
/// Called on the consumer thread (queued mode) or the hook thread (realtime
/// mode), never concurrently with itself.  Must not block.
pub trait InputSubscriber: Send + Sync {
    /// Name used in fault logs.
    fn name(&self) -> &str;

    /// Handles one event.  Call [`RawInputEvent::mark_handled`] to swallow it.
    fn on_event(&self, event: &RawInputEvent) -> anyhow::Result<()>;

    /// `true` if this subscriber may mark events handled.  While no
    /// subscriber may suppress, the hook thread never waits for the consumer.
    fn may_suppress(&self) -> bool {
        false
    }
}

struct SubscriberEntry {
    id: Uuid,
    subscriber: Arc<dyn InputSubscriber>,
}

/// Copy-on-write list: dispatch clones the `Arc`, never holds the lock.
#[derive(Default)]
struct SubscriberRegistry {
    entries: RwLock<Arc<Vec<SubscriberEntry>>>,
}

impl SubscriberRegistry {
    fn add(&self, subscriber: Arc<dyn InputSubscriber>) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.write();
        let mut next: Vec<SubscriberEntry> = entries
            .iter()
            .map(|e| SubscriberEntry {
                id: e.id,
                subscriber: Arc::clone(&e.subscriber),
            })
            .collect();
        next.push(SubscriberEntry { id, subscriber });
        *entries = Arc::new(next);
        id
    }

    fn remove(&self, id: Uuid) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|e| e.id == id) {
            return false;
        }
        let next: Vec<SubscriberEntry> = entries
            .iter()
            .filter(|e| e.id != id)
            .map(|e| SubscriberEntry {
                id: e.id,
                subscriber: Arc::clone(&e.subscriber),
            })
            .collect();
        *entries = Arc::new(next);
        true
    }

    fn snapshot(&self) -> Arc<Vec<SubscriberEntry>> {
        Arc::clone(&self.entries.read())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn any_may_suppress(&self) -> bool {
        self.snapshot().iter().any(|e| e.subscriber.may_suppress())
    }
}

/// Keeps a subscriber registered.  Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: Uuid,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Unsubscribes now.  Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                debug!(subscription = %self.id, "input subscriber removed");
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct Dispatcher {
    registry: Arc<SubscriberRegistry>,
    delivered: AtomicU64,
    faults: AtomicU64,
}

impl Dispatcher {
    fn dispatch(&self, event: &RawInputEvent) {
        let entries = self.registry.snapshot();
        for entry in entries.iter() {
            let subscriber = &entry.subscriber;
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.faults.fetch_add(1, Ordering::Relaxed);
                    error!(subscriber = subscriber.name(), error = %e, "input subscriber failed");
                }
                Err(_) => {
                    self.faults.fetch_add(1, Ordering::Relaxed);
                    error!(subscriber = subscriber.name(), "input subscriber panicked");
                }
            }
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

/// The hook-side half of the capture.  Runs on the hook thread.
struct HookBridge {
    modifiers: Mutex<ModifierTracker>,
    registry: Arc<SubscriberRegistry>,
    dispatcher: Arc<Dispatcher>,
    queue: Option<Sender<RawInputEvent>>,
    stopped: Arc<AtomicBool>,
    suppression_timeout: Duration,
}

impl HookCallback for HookBridge {
    fn on_hook_event(&self, mut event: RawInputEvent) -> HookDecision {
        if self.stopped.load(Ordering::Acquire) {
            return HookDecision::PassThrough;
        }

        {
            let mut modifiers = self.modifiers.lock();
            match event.kind {
                InputEventKind::KeyDown { key } => modifiers.update(key, true),
                InputEventKind::KeyUp { key } => modifiers.update(key, false),
                _ => {}
            }
            event.modifiers = modifiers.snapshot();
        }

        let Some(queue) = &self.queue else {
            self.dispatcher.dispatch(&event);
            return HookDecision::from_handled(event.is_handled());
        };

        let wait_for_verdict = self.registry.any_may_suppress();
        let ack = event.ack().clone();
        if !wait_for_verdict {
            // Passed on before dispatch; a subscriber added meanwhile must not
            // count it as swallowed.
            ack.expire();
        }
        if queue.send(event).is_err() {
            return HookDecision::PassThrough;
        }
        if !wait_for_verdict {
            return HookDecision::PassThrough;
        }
        if ack.wait(self.suppression_timeout) || !ack.expire() {
            return HookDecision::from_handled(ack.is_handled());
        }
        warn!(
            timeout_ms = self.suppression_timeout.as_millis() as u64,
            "suppression verdict timed out; event passed through"
        );
        HookDecision::PassThrough
    }
}

fn run_consumer(
    events: Receiver<RawInputEvent>,
    shutdown: Receiver<()>,
    dispatcher: Arc<Dispatcher>,
    stopped: Arc<AtomicBool>,
) {
    debug!("input consumer thread started");
    loop {
        crossbeam_channel::select! {
            recv(events) -> msg => match msg {
                Ok(event) => {
                    if stopped.load(Ordering::Acquire) {
                        event.ack().complete();
                        break;
                    }
                    trace!(kind = ?event.kind, "dispatching queued event");
                    dispatcher.dispatch(&event);
                    event.ack().complete();
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }
    // Undelivered events are discarded; release any hook thread waiting on them.
    let discarded = events.try_iter().map(|e| e.ack().complete()).count();
    debug!(discarded, "input consumer thread stopped");
}

/// Process-wide input event fan-out.
pub struct InputEventCapture {
    options: CaptureOptions,
    source_name: &'static str,
    registry: Arc<SubscriberRegistry>,
    dispatcher: Arc<Dispatcher>,
    stopped: Arc<AtomicBool>,
    hook: Mutex<Option<HookHandle>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<Option<Sender<()>>>,
}

impl InputEventCapture {
    /// Installs hooks on `source` and starts delivering events.
    ///
    /// Hook installation failure is returned synchronously.
    pub fn start(source: &dyn InputSource, options: CaptureOptions) -> Result<Arc<Self>, CaptureError> {
        let registry = Arc::new(SubscriberRegistry::default());
        let dispatcher = Arc::new(Dispatcher {
            registry: Arc::clone(&registry),
            delivered: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        });
        let stopped = Arc::new(AtomicBool::new(false));

        let (queue, consumer, shutdown) = match options.delivery_mode {
            DeliveryMode::Realtime => (None, None, None),
            DeliveryMode::Queued => {
                let (event_tx, event_rx) = crossbeam_channel::unbounded();
                let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
                let consumer_dispatcher = Arc::clone(&dispatcher);
                let consumer_stopped = Arc::clone(&stopped);
                let handle = thread::Builder::new()
                    .name("hotkey-input-consumer".to_string())
                    .spawn(move || {
                        run_consumer(event_rx, shutdown_rx, consumer_dispatcher, consumer_stopped)
                    })
                    .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;
                (Some(event_tx), Some(handle), Some(shutdown_tx))
            }
        };

        let bridge = Arc::new(HookBridge {
            modifiers: Mutex::new(ModifierTracker::new()),
            registry: Arc::clone(&registry),
            dispatcher: Arc::clone(&dispatcher),
            queue,
            stopped: Arc::clone(&stopped),
            suppression_timeout: options.suppression_timeout,
        });

        let hook = match source.install(bridge) {
            Ok(hook) => hook,
            Err(e) => {
                error!(source = source.name(), error = %e, "input hook installation failed");
                stopped.store(true, Ordering::Release);
                drop(shutdown);
                if let Some(handle) = consumer {
                    let _ = handle.join();
                }
                return Err(e);
            }
        };

        info!(
            source = source.name(),
            mode = ?options.delivery_mode,
            "input capture started"
        );

        Ok(Arc::new(Self {
            options,
            source_name: source.name(),
            registry,
            dispatcher,
            stopped,
            hook: Mutex::new(Some(hook)),
            consumer: Mutex::new(consumer),
            shutdown: Mutex::new(shutdown),
        }))
    }

    /// Registers `subscriber`; it receives every event until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, subscriber: Arc<dyn InputSubscriber>) -> Subscription {
        let name = subscriber.name().to_string();
        let id = self.registry.add(subscriber);
        debug!(subscription = %id, subscriber = %name, "input subscriber added");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of events fully dispatched so far.
    pub fn delivered_count(&self) -> u64 {
        self.dispatcher.delivered.load(Ordering::Relaxed)
    }

    /// Number of subscriber errors and panics so far.
    pub fn fault_count(&self) -> u64 {
        self.dispatcher.faults.load(Ordering::Relaxed)
    }

    pub fn options(&self) -> CaptureOptions {
        self.options
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stops delivery, discards queued events and uninstalls the hooks.
    ///
    /// Idempotent.  Safe to call from a subscriber.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(source = self.source_name, "stopping input capture");

        drop(self.shutdown.lock().take());
        if let Some(handle) = self.consumer.lock().take() {
            if handle.thread().id() == thread::current().id() {
                debug!("stop requested from consumer thread; it exits after this event");
            } else if handle.join().is_err() {
                error!("input consumer thread panicked");
            }
        }
        if let Some(hook) = self.hook.lock().take() {
            hook.uninstall();
        }
        info!(
            delivered = self.delivered_count(),
            faults = self.fault_count(),
            "input capture stopped"
        );
    }
}

impl Drop for InputEventCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
