//! Tracking and event-history seams
//!
//! Consumers receive a `Arc<dyn Tracker>` from the application root instead
//! of reaching for a global analytics instance. [`MemoryTracker`] is the
//! in-process implementation used by tests and offline tooling; it also
//! serves as an [`EventReader`] over everything it recorded.

use smartalk_common::{Event, RawEventData};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fire-and-forget event sink
pub trait Tracker: Send + Sync {
    /// Record one event. Must never panic or block on I/O.
    fn track(&self, event_type: &str, event_data: RawEventData, user_id: Option<&str>);
}

/// Read access to previously emitted events
///
/// Production implementations are backed by a backend query; the contract is
/// only that one user's events come back in emission order.
pub trait EventReader: Send + Sync {
    fn events_for_user(&self, user_id: &str) -> Vec<Event>;
}

/// Tracker that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryTracker {
    events: Mutex<Vec<Event>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a pre-built event as-is (keeps its timestamp)
    pub fn record(&self, event: Event) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tracker for MemoryTracker {
    fn track(&self, event_type: &str, event_data: RawEventData, user_id: Option<&str>) {
        self.record(Event::new(event_type, event_data, user_id));
    }
}

impl EventReader for MemoryTracker {
    fn events_for_user(&self, user_id: &str) -> Vec<Event> {
        self.lock()
            .iter()
            .filter(|e| e.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }
}
