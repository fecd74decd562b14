//! The cost tracker: an event queue flushed in batches to the collector.
//!
//! Adapters hand finished [`UsageRecord`]s to the tracker through its
//! [`EventSink`]. Each record is stamped into a [`CostEvent`] and appended
//! to the queue. A flush runs when the queue reaches `batch_size`, when the
//! periodic timer fires, when [`Tracker::flush`] is called, and once more on
//! [`Tracker::shutdown`].
//!
//! At most one flush is in flight. A flush takes the whole queue as its
//! batch, so events tracked meanwhile land in a fresh queue; if delivery
//! fails after every retry the batch goes back to the front of the queue.

use crate::TrackerError;
use crate::pricing::PricingTable;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::transport::{HttpTransport, Transport};
use agentcost_config::TrackerConfig;
use agentcost_core::{CostEvent, EventSink, UsageRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// What a call to [`Tracker::flush`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to send, or another flush was already in flight.
    Skipped,
    /// The batch of this many events was accepted by the collector.
    Delivered(usize),
    /// Delivery failed after all retries; this many events were re-queued.
    Requeued(usize),
}

/// Collects cost events and ships them to the collector in batches.
///
/// Must be created inside a Tokio runtime. Call [`Tracker::shutdown`]
/// before the runtime goes away; dropping a tracker stops its timer but
/// does not flush.
pub struct Tracker {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// State reachable from the sink, the timer, and spawned flushes.
struct Shared {
    config: TrackerConfig,
    pricing: Arc<PricingTable>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    queue: Mutex<Vec<CostEvent>>,
    flushing: AtomicBool,
    idle: Notify,
}

impl Tracker {
    /// Build a tracker that delivers to `config.endpoint` over HTTP.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let transport = HttpTransport::new(config.endpoint.clone(), config.api_key.clone())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a tracker around a caller-supplied transport.
    pub fn with_transport(
        config: TrackerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;

        let pricing = PricingTable::with_defaults().with_overrides(&config.custom_pricing);
        let shared = Arc::new(Shared {
            retry: RetryPolicy::from(&config.retry),
            pricing: Arc::new(pricing),
            transport,
            queue: Mutex::new(Vec::new()),
            flushing: AtomicBool::new(false),
            idle: Notify::new(),
            config,
        });

        let timer = runtime.spawn(run_timer(Arc::downgrade(&shared)));

        if shared.config.debug {
            debug!(
                project_id = %shared.config.project_id,
                endpoint = %shared.config.endpoint,
                batch_size = shared.config.batch_size,
                flush_interval_ms = shared.config.flush_interval_ms,
                "Tracker initialized"
            );
        }

        Ok(Self {
            shared,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// The callback adapters report through.
    pub fn sink(&self) -> EventSink {
        let shared = Arc::clone(&self.shared);
        EventSink::new(move |record| shared.track(record))
    }

    /// The frozen pricing table adapters resolve against.
    pub fn pricing(&self) -> Arc<PricingTable> {
        Arc::clone(&self.shared.pricing)
    }

    /// The configuration this tracker was built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    /// Whether verbose diagnostics are enabled.
    pub fn debug(&self) -> bool {
        self.shared.config.debug
    }

    /// Events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.shared.lock_queue().len()
    }

    /// Whether a flush is in flight.
    pub fn is_flushing(&self) -> bool {
        self.shared.flushing.load(Ordering::Acquire)
    }

    /// Deliver everything queued right now.
    ///
    /// Returns [`FlushOutcome::Skipped`] without doing anything if the queue
    /// is empty or another flush is in flight.
    pub async fn flush(&self) -> FlushOutcome {
        match self.shared.begin_flush() {
            Some(in_flight) => in_flight.deliver().await,
            None => FlushOutcome::Skipped,
        }
    }

    /// Stop the timer and make one last delivery attempt.
    ///
    /// An in-flight flush is allowed to finish first, so events it re-queues
    /// get another chance here.
    pub async fn shutdown(self) -> FlushOutcome {
        self.stop_timer();
        self.shared.wait_idle().await;
        let outcome = self.flush().await;

        if self.debug() {
            debug!(?outcome, remaining = self.pending(), "Tracker shut down");
        }
        outcome
    }

    fn stop_timer(&self) {
        let handle = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.shared.config)
            .field("pending", &self.pending())
            .field("flushing", &self.is_flushing())
            .finish()
    }
}

/// Periodic flush loop. Exits once the tracker state is gone.
async fn run_timer(shared: std::sync::Weak<Shared>) {
    let period = match shared.upgrade() {
        Some(s) => s.config.flush_interval(),
        None => return,
    };
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        // Detached so that stopping the timer never cancels a delivery.
        if let Some(in_flight) = shared.begin_flush() {
            tokio::spawn(in_flight.deliver());
        }
    }
}

impl Shared {
    fn lock_queue(&self) -> MutexGuard<'_, Vec<CostEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sink target: stamp, enqueue, and flush if the batch is full.
    fn track(self: &Arc<Self>, record: UsageRecord) {
        let event = CostEvent::capture(&self.config.project_id, record);
        if self.config.debug {
            debug!(
                provider = %event.provider,
                model = %event.model,
                input_tokens = event.input_tokens,
                output_tokens = event.output_tokens,
                cost = event.cost,
                duration_ms = event.duration_ms,
                error = event.error().unwrap_or_default(),
                "Event queued"
            );
        }

        let queue_length = {
            let mut queue = self.lock_queue();
            queue.push(event);
            queue.len()
        };

        if self.config.debug {
            debug!(queue_length, "Queue updated");
        }

        if queue_length >= self.config.batch_size {
            // Without a runtime the batch simply waits for the next flush.
            let Ok(runtime) = Handle::try_current() else {
                return;
            };
            if let Some(in_flight) = self.begin_flush() {
                runtime.spawn(in_flight.deliver());
            }
        }
    }

    /// Claim the flushing flag and take the whole queue as a batch.
    fn begin_flush(self: &Arc<Self>) -> Option<InFlight> {
        if self.flushing.swap(true, Ordering::AcqRel) {
            if self.config.debug {
                debug!("Flush already in progress, skipping");
            }
            return None;
        }

        let batch = std::mem::take(&mut *self.lock_queue());
        // Constructed before the emptiness check so its Drop releases the flag.
        let in_flight = InFlight {
            shared: Arc::clone(self),
            batch,
            delivered: false,
        };
        if in_flight.batch.is_empty() {
            return None;
        }
        Some(in_flight)
    }

    /// Put a failed batch back ahead of anything queued since it was taken.
    fn requeue(&self, mut batch: Vec<CostEvent>) {
        let mut queue = self.lock_queue();
        batch.append(&mut queue);
        *queue = batch;

        if self.config.debug {
            debug!(queue_length = queue.len(), "Events re-queued");
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.flushing.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

/// A claimed batch. Dropping it undelivered re-queues the events, so a
/// cancelled flush loses nothing; dropping it always releases the flag.
struct InFlight {
    shared: Arc<Shared>,
    batch: Vec<CostEvent>,
    delivered: bool,
}

impl InFlight {
    async fn deliver(mut self) -> FlushOutcome {
        let shared = Arc::clone(&self.shared);
        let debug = shared.config.debug;
        let count = self.batch.len();

        if debug {
            debug!(count, endpoint = %shared.config.endpoint, "Flushing events");
        }

        let transport = &shared.transport;
        let batch = self.batch.as_slice();
        let mut attempt = 0u32;
        let result = retry_with_backoff(&shared.retry, move || {
            attempt += 1;
            let current = attempt;
            async move {
                let result = transport.deliver(batch).await;
                if let Err(e) = &result {
                    if debug {
                        debug!(attempt = current, error = %e, "Delivery attempt failed");
                    }
                }
                result
            }
        })
        .await;

        match result {
            Ok(()) => {
                self.delivered = true;
                if debug {
                    debug!(count, "Events sent successfully");
                }
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                warn!(
                    count,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "Failed to send events after retries, re-queueing"
                );
                FlushOutcome::Requeued(count)
            }
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.delivered && !self.batch.is_empty() {
            self.shared.requeue(std::mem::take(&mut self.batch));
        }
        self.shared.flushing.store(false, Ordering::Release);
        self.shared.idle.notify_waiters();
    }
}
