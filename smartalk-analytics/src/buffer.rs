//! Batched analytics event pipeline
//!
//! The EventBuffer accepts fire-and-forget `track` calls from anywhere in the
//! application, sanitizes payloads, and delivers the accumulated events to
//! the ingestion endpoint in one batch per flush.
//!
//! # Flush triggers
//!
//! - Queue length reaching `batch_size` (spawned on the ambient runtime)
//! - Recurring timer every `flush_interval` (see [`EventBuffer::start`])
//! - Explicit [`EventBuffer::flush`]
//!
//! All triggers share one path guarded by an in-flight flag: a trigger that
//! fires while a delivery is running is a no-op. Automatic triggers also
//! respect the retry backoff window; explicit flushes always attempt.
//!
//! # Delivery guarantees
//!
//! At-least-once intent. A failed batch is put back at the front of the
//! queue in its original order. The queue is capped at `max_buffer_size`;
//! past it the oldest events are dropped and counted. Nothing is flushed on
//! [`EventBuffer::destroy`].

use crate::retry::Backoff;
use crate::tracker::Tracker;
use crate::transport::{BatchTransport, HttpTransport, TransportError};
use smartalk_common::config::{validate_pipeline_limits, RetryConfig};
use smartalk_common::{AnalyticsConfig, Error, Event, RawEventData, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Runtime-adjustable buffer settings
#[derive(Debug, Clone, PartialEq)]
pub struct BufferOptions {
    /// When false, `track` is a no-op
    pub enabled: bool,
    /// Queue length that triggers an immediate flush
    pub batch_size: usize,
    /// Period of the recurring flush timer
    pub flush_interval: Duration,
    /// Upper bound on one batch delivery
    pub request_timeout: Duration,
    /// Queue ceiling; oldest events are dropped past it
    pub max_buffer_size: usize,
    pub retry: RetryConfig,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self::from(&AnalyticsConfig::default())
    }
}

impl From<&AnalyticsConfig> for BufferOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            enabled: config.enabled,
            batch_size: config.batch_size,
            flush_interval: config.flush_interval(),
            request_timeout: config.request_timeout(),
            max_buffer_size: config.max_buffer_size,
            retry: config.retry,
        }
    }
}

impl BufferOptions {
    pub fn validate(&self) -> Result<()> {
        validate_pipeline_limits(
            self.batch_size,
            self.flush_interval,
            self.request_timeout,
            self.max_buffer_size,
            self.retry,
        )
    }
}

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued
    Empty,
    /// Another flush was already delivering; this one did nothing
    InFlight,
    /// Automatic trigger skipped inside the retry window
    BackingOff,
    /// This many events reached the collector
    Delivered(usize),
    /// Delivery failed; this many events went back to the queue
    Requeued(usize),
}

/// Cumulative pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub tracked: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub failed_flushes: u64,
}

/// Handle to the event pipeline; clones share one queue
#[derive(Clone)]
pub struct EventBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    options: RwLock<BufferOptions>,
    queue: Mutex<VecDeque<Event>>,
    in_flight: AtomicBool,
    backoff: Mutex<Backoff>,
    stats: Mutex<BufferStats>,
    timer: Mutex<Option<JoinHandle<()>>>,
    transport: Arc<dyn BatchTransport>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventBuffer {
    pub fn new(transport: Arc<dyn BatchTransport>, options: BufferOptions) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                backoff: Mutex::new(Backoff::new(options.retry)),
                options: RwLock::new(options),
                queue: Mutex::new(VecDeque::new()),
                in_flight: AtomicBool::new(false),
                stats: Mutex::new(BufferStats::default()),
                timer: Mutex::new(None),
                transport,
            }),
        })
    }

    /// Buffer delivering over HTTP to `config.batch_endpoint()`
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)
            .map_err(|e| Error::Config(format!("Cannot build HTTP client: {}", e)))?;
        Self::new(Arc::new(transport), BufferOptions::from(config))
    }

    /// Replace the settings; invalid options leave the current ones intact
    pub fn configure(&self, options: BufferOptions) -> Result<()> {
        options.validate()?;

        let interval_changed = {
            let mut current = self.inner.write_options();
            let changed = current.flush_interval != options.flush_interval;
            lock(&self.inner.backoff).reconfigure(options.retry);
            *current = options.clone();
            changed
        };

        let dropped = {
            let mut queue = lock(&self.inner.queue);
            trim_overflow(&mut queue, options.max_buffer_size)
        };
        self.inner.record_dropped(dropped);

        if interval_changed && self.is_running() {
            self.start();
        }

        info!(
            enabled = options.enabled,
            batch_size = options.batch_size,
            flush_interval_ms = options.flush_interval.as_millis() as u64,
            max_buffer_size = options.max_buffer_size,
            "Analytics buffer configured"
        );
        Ok(())
    }

    pub fn options(&self) -> BufferOptions {
        self.inner.read_options().clone()
    }

    /// Sanitize and queue one event. Never fails.
    pub fn track(&self, event_type: &str, event_data: RawEventData, user_id: Option<&str>) {
        if !self.inner.read_options().enabled {
            return;
        }
        self.enqueue(Event::new(event_type, event_data, user_id));
    }

    /// Queue an already-built event (keeps its timestamp)
    pub fn enqueue(&self, event: Event) {
        let (enabled, batch_size, max_buffer_size) = {
            let options = self.inner.read_options();
            (options.enabled, options.batch_size, options.max_buffer_size)
        };
        if !enabled {
            return;
        }

        debug!(
            event_type = %event.event_type,
            user_id = event.user_id.as_deref().unwrap_or("-"),
            "Tracked analytics event"
        );

        let (len, dropped) = {
            let mut queue = lock(&self.inner.queue);
            queue.push_back(event);
            let dropped = trim_overflow(&mut queue, max_buffer_size);
            (queue.len(), dropped)
        };

        lock(&self.inner.stats).tracked += 1;
        self.inner.record_dropped(dropped);

        if len >= batch_size {
            self.schedule_flush();
        }
    }

    /// Deliver everything queued in one batch
    ///
    /// Never returns an error: delivery failures re-queue the batch and are
    /// reported as [`FlushOutcome::Requeued`].
    pub async fn flush(&self) -> FlushOutcome {
        if self.inner.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Flush already in flight, skipping");
            return FlushOutcome::InFlight;
        }

        let batch: Vec<Event> = lock(&self.inner.queue).drain(..).collect();
        let mut flight = Flight {
            inner: &self.inner,
            batch: Some(batch),
        };
        if flight.events().is_empty() {
            return FlushOutcome::Empty;
        }

        let timeout = self.inner.read_options().request_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.inner.transport.send_batch(flight.events()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };

        let batch = flight.take();
        let count = batch.len();

        match result {
            Ok(()) => {
                lock(&self.inner.backoff).record_success();
                lock(&self.inner.stats).delivered += count as u64;
                info!(count, "Delivered analytics batch");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                self.inner.requeue(batch);
                let retry_in = lock(&self.inner.backoff).record_failure();
                lock(&self.inner.stats).failed_flushes += 1;
                warn!(
                    error = %e,
                    count,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "Analytics flush failed, events re-queued"
                );
                FlushOutcome::Requeued(count)
            }
        }
    }

    /// Start (or restart) the recurring flush timer
    ///
    /// Needs a Tokio runtime; without one the call logs a warning and the
    /// buffer only flushes explicitly.
    pub fn start(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, analytics flush timer not started");
                return;
            }
        };

        let interval = self.inner.read_options().flush_interval;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Last handle gone: stop ticking
                let Some(inner) = weak.upgrade() else { break };
                EventBuffer { inner }.auto_flush().await;
            }
        });

        if let Some(previous) = lock(&self.inner.timer).replace(task) {
            previous.abort();
        }
        debug!(interval_ms = interval.as_millis() as u64, "Analytics flush timer started");
    }

    /// Cancel the flush timer. Queued events are not flushed.
    pub fn destroy(&self) {
        if let Some(task) = lock(&self.inner.timer).take() {
            task.abort();
            debug!("Analytics flush timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.timer)
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.queue).is_empty()
    }

    /// Copy of the queued events, oldest first
    pub fn snapshot(&self) -> Vec<Event> {
        lock(&self.inner.queue).iter().cloned().collect()
    }

    pub fn stats(&self) -> BufferStats {
        *lock(&self.inner.stats)
    }

    async fn auto_flush(&self) -> FlushOutcome {
        if !lock(&self.inner.backoff).is_ready(Instant::now()) {
            debug!("Inside retry window, automatic flush skipped");
            return FlushOutcome::BackingOff;
        }
        self.flush().await
    }

    fn schedule_flush(&self) {
        if self.inner.in_flight.load(Ordering::Acquire) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let buffer = self.clone();
                handle.spawn(async move {
                    buffer.auto_flush().await;
                });
            }
            Err(_) => debug!("No async runtime, batch waits for the next flush"),
        }
    }
}

impl Tracker for EventBuffer {
    fn track(&self, event_type: &str, event_data: RawEventData, user_id: Option<&str>) {
        EventBuffer::track(self, event_type, event_data, user_id);
    }
}

impl Inner {
    fn read_options(&self) -> std::sync::RwLockReadGuard<'_, BufferOptions> {
        self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_options(&self) -> std::sync::RwLockWriteGuard<'_, BufferOptions> {
        self.options.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a failed batch back ahead of anything tracked since
    fn requeue(&self, batch: Vec<Event>) {
        let max_buffer_size = self.read_options().max_buffer_size;
        let dropped = {
            let mut queue = lock(&self.queue);
            for event in batch.into_iter().rev() {
                queue.push_front(event);
            }
            trim_overflow(&mut queue, max_buffer_size)
        };
        self.record_dropped(dropped);
    }

    fn record_dropped(&self, dropped: usize) {
        if dropped == 0 {
            return;
        }
        let total = {
            let mut stats = lock(&self.stats);
            stats.dropped += dropped as u64;
            stats.dropped
        };
        warn!(dropped, total_dropped = total, "Analytics buffer full, oldest events dropped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
    }
}

/// In-flight marker; clears the flag and re-queues an unfinished batch on drop
struct Flight<'a> {
    inner: &'a Inner,
    batch: Option<Vec<Event>>,
}

impl Flight<'_> {
    fn events(&self) -> &[Event] {
        self.batch.as_deref().unwrap_or_default()
    }

    fn take(&mut self) -> Vec<Event> {
        self.batch.take().unwrap_or_default()
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        // Only non-empty if the flush future was cancelled mid-delivery
        if let Some(batch) = self.batch.take() {
            if !batch.is_empty() {
                self.inner.requeue(batch);
            }
        }
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

/// Drop oldest events beyond `max`; returns how many were dropped
fn trim_overflow(queue: &mut VecDeque<Event>, max: usize) -> usize {
    let excess = queue.len().saturating_sub(max);
    queue.drain(..excess);
    excess
}
