//! Per-user funnel progression

use crate::tracker::EventReader;
use serde::Serialize;
use smartalk_common::events::TOTAL_FUNNEL_STEPS;
use smartalk_common::time::elapsed_millis;
use smartalk_common::Event;

/// Where one user stands in the funnel, derived from their funnel events
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgression {
    pub user_id: String,
    /// Highest step number reached, 0 before the first funnel event
    pub current_step: u8,
    pub current_step_name: Option<String>,
    /// Distinct step names in the order they were first emitted
    pub completed_steps: Vec<String>,
    /// `current_step / 5`, a fraction in `[0, 1]`
    pub progress_percentage: f64,
    /// Milliseconds between the first and the most recent funnel event
    pub time_in_funnel: u64,
}

/// Progression of `user_id` from the events `reader` holds for them
pub fn get_user_progression(reader: &dyn EventReader, user_id: &str) -> UserProgression {
    progression_from_events(user_id, &reader.events_for_user(user_id))
}

/// Progression from one user's events in emission order
///
/// Only `funnel_<step>` events attributed to `user_id` count; anonymous
/// events are ignored. Duplicates and out-of-order steps are reported as
/// observed.
pub fn progression_from_events(user_id: &str, events: &[Event]) -> UserProgression {
    let funnel_events: Vec<_> = events
        .iter()
        .filter(|e| e.user_id.as_deref() == Some(user_id))
        .filter_map(|e| e.funnel_step().map(|step| (step, e.timestamp)))
        .collect();

    let current = funnel_events.iter().map(|(step, _)| *step).max();

    let mut completed_steps: Vec<String> = Vec::new();
    for (step, _) in &funnel_events {
        if !completed_steps.iter().any(|name| name == step.name()) {
            completed_steps.push(step.name().to_string());
        }
    }

    let time_in_funnel = match (funnel_events.first(), funnel_events.last()) {
        (Some((_, first)), Some((_, last))) => elapsed_millis(*first, *last),
        _ => 0,
    };

    let current_step = current.map_or(0, |step| step.number());

    UserProgression {
        user_id: user_id.to_string(),
        current_step,
        current_step_name: current.map(|step| step.name().to_string()),
        completed_steps,
        progress_percentage: f64::from(current_step) / f64::from(TOTAL_FUNNEL_STEPS),
        time_in_funnel,
    }
}
