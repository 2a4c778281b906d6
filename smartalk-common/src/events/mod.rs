//! Event types for the SmarTalk analytics pipeline
//!
//! An [`Event`] is one observation of a user action. It is created by a
//! `track` call, buffered, and delivered to the ingestion endpoint in
//! batches. Its payload is always the sanitized [`EventData`] shape.

mod funnel_types;
mod payload;

pub use funnel_types::{FunnelStep, FUNNEL_EVENT_PREFIX, TOTAL_FUNNEL_STEPS};
pub use payload::{
    raw_data, sanitize, EventData, EventValue, RawEventData, RawValue, MAX_ARRAY_LEN,
    MAX_NESTING_DEPTH,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload key holding the 1-based funnel step number
pub const FUNNEL_STEP_KEY: &str = "funnelStep";

/// Payload key holding the funnel step name
pub const STEP_NAME_KEY: &str = "stepName";

/// Payload key repeating the acting user on funnel events
pub const USER_ID_KEY: &str = "userId";

/// A single tracked observation, as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Acting user; `None` for anonymous pre-auth events
    pub user_id: Option<String>,
    /// Free-form tag, e.g. `vtpr_start` or `funnel_activation`
    pub event_type: String,
    pub event_data: EventData,
    /// Assigned at track time
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Sanitize `raw` and stamp the current time
    pub fn new(event_type: impl Into<String>, raw: RawEventData, user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            event_type: event_type.into(),
            event_data: sanitize(raw),
            timestamp: crate::time::now(),
        }
    }

    /// Replace the timestamp (replays and tests)
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn get(&self, key: &str) -> Option<&EventValue> {
        self.event_data.get(key)
    }

    /// Step reached, for a `funnel_<step>` event whose `funnelStep` names
    /// that same step
    ///
    /// Other funnel events (`funnel_drop_off`, `funnel_alert`) may carry a
    /// step number but do not mean the step was reached.
    pub fn funnel_step(&self) -> Option<FunnelStep> {
        let name = self.event_type.strip_prefix(FUNNEL_EVENT_PREFIX)?;
        let step = FunnelStep::from_name(name)?;
        let number = self.get(FUNNEL_STEP_KEY)?.as_f64()?;
        (number == f64::from(step.number())).then_some(step)
    }
}
