//! Re-deliver recorded events
//!
//! Recordings are JSON lines, one wire-format [`Event`] per line (the shape
//! the collector receives). Blank lines are skipped. Payloads are sanitized
//! again on load since a recording may have been edited by hand.

use crate::buffer::{EventBuffer, FlushOutcome};
use serde::Serialize;
use smartalk_common::events::sanitize;
use smartalk_common::{Error, Event, RawValue, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const IN_FLIGHT_POLL: Duration = Duration::from_millis(20);

/// Result of replaying one recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub read: usize,
    pub delivered: usize,
    /// `read - delivered`; non-zero once a delivery fails
    pub undelivered: usize,
}

pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let content = std::fs::read_to_string(path)?;
    let events = parse_events(&content)?;
    debug!(path = %path.display(), count = events.len(), "Loaded recorded events");
    Ok(events)
}

pub fn parse_events(content: &str) -> Result<Vec<Event>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let mut event: Event = serde_json::from_str(line)
                .map_err(|e| Error::InvalidInput(format!("line {}: {}", index + 1, e)))?;
            let raw = std::mem::take(&mut event.event_data)
                .into_iter()
                .map(|(key, value)| (key, RawValue::from(value)))
                .collect();
            event.event_data = sanitize(raw);
            Ok(event)
        })
        .collect()
}

/// Re-deliver `events` with their recorded timestamps
///
/// Events are queued at most one batch at a time and that batch is drained
/// before the next is queued, so the buffer cap never drops a recorded
/// event. Stops at the first failed delivery. `delivered` counts every
/// batch the buffer delivered meanwhile, including size-triggered ones.
pub async fn replay(buffer: &EventBuffer, events: Vec<Event>) -> ReplaySummary {
    let read = events.len();
    let options = buffer.options();
    let chunk_size = options.batch_size.min(options.max_buffer_size).max(1);
    let delivered_before = buffer.stats().delivered;

    let mut events = events.into_iter().peekable();
    while events.peek().is_some() {
        for event in events.by_ref().take(chunk_size) {
            buffer.enqueue(event);
        }
        if !drain(buffer).await {
            break;
        }
    }

    let delivered = buffer.stats().delivered.saturating_sub(delivered_before) as usize;
    let summary = ReplaySummary {
        read,
        delivered,
        undelivered: read.saturating_sub(delivered),
    };
    info!(
        read = summary.read,
        delivered = summary.delivered,
        undelivered = summary.undelivered,
        "Replay finished"
    );
    summary
}

/// Flush until the queue is empty; false if a delivery failed
async fn drain(buffer: &EventBuffer) -> bool {
    loop {
        match buffer.flush().await {
            FlushOutcome::Delivered(_) => {}
            FlushOutcome::InFlight => tokio::time::sleep(IN_FLIGHT_POLL).await,
            FlushOutcome::Empty => return true,
            FlushOutcome::Requeued(count) => {
                warn!(count, "Replay stopped at failed delivery");
                return false;
            }
            FlushOutcome::BackingOff => return false,
        }
    }
}
