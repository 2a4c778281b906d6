//! Funnel step emission
//!
//! [`FunnelTracker`] turns "user reached step X" into exactly one
//! `funnel_<step>` event on the injected [`Tracker`]. It also owns the two
//! analysis results that are reported back as events: cohort performance
//! and critical drop alerts.

use super::{AnalysisError, CohortRecord, DropAlert, Severity};
use crate::tracker::Tracker;
use smartalk_common::events::{FunnelStep, FUNNEL_STEP_KEY, STEP_NAME_KEY, USER_ID_KEY};
use smartalk_common::{RawEventData, RawValue};
use std::sync::Arc;
use tracing::{debug, warn};

pub const EXPERIMENT_STEP_EVENT: &str = "experiment_funnel_step";
pub const DROP_OFF_EVENT: &str = "funnel_drop_off";
pub const COHORT_PERFORMANCE_EVENT: &str = "cohort_performance";
pub const ALERT_EVENT: &str = "funnel_alert";

#[derive(Clone)]
pub struct FunnelTracker {
    tracker: Arc<dyn Tracker>,
}

impl FunnelTracker {
    pub fn new(tracker: Arc<dyn Tracker>) -> Self {
        Self { tracker }
    }

    /// Emit `funnel_<step>` with the step fields merged over `extra`
    ///
    /// `funnelStep`, `stepName` and `userId` always win over same-named keys
    /// in `extra`.
    pub fn track_step(&self, step: FunnelStep, user_id: &str, extra: RawEventData) {
        let mut data = extra;
        insert_step_fields(&mut data, step);
        data.insert(USER_ID_KEY.to_string(), RawValue::from(user_id));

        debug!(step = %step, user_id, "Funnel step reached");
        self.tracker.track(&step.event_type(), data, Some(user_id));
    }

    pub fn track_app_launch(&self, user_id: &str, extra: RawEventData) {
        self.track_step(FunnelStep::AppLaunch, user_id, extra);
    }

    pub fn track_onboarding_complete(&self, user_id: &str, extra: RawEventData) {
        self.track_step(FunnelStep::OnboardingComplete, user_id, extra);
    }

    pub fn track_interest_selected(&self, user_id: &str, extra: RawEventData) {
        self.track_step(FunnelStep::InterestSelected, user_id, extra);
    }

    pub fn track_vtpr_complete(&self, user_id: &str, extra: RawEventData) {
        self.track_step(FunnelStep::VtprComplete, user_id, extra);
    }

    pub fn track_activation(&self, user_id: &str, extra: RawEventData) {
        self.track_step(FunnelStep::Activation, user_id, extra);
    }

    /// Step reached by a user enrolled in an experiment variant
    pub fn track_experiment_funnel_step(
        &self,
        experiment_id: &str,
        variant: &str,
        step: FunnelStep,
        user_id: &str,
    ) {
        let mut data = RawEventData::new();
        data.insert("experimentId".to_string(), RawValue::from(experiment_id));
        data.insert("variant".to_string(), RawValue::from(variant));
        insert_step_fields(&mut data, step);

        self.tracker.track(EXPERIMENT_STEP_EVENT, data, Some(user_id));
    }

    /// User abandoned the funnel at `step`, optionally with a reason tag
    pub fn track_drop_off(&self, user_id: &str, step: FunnelStep, reason: Option<&str>) {
        let mut data = RawEventData::new();
        insert_step_fields(&mut data, step);
        data.insert("exitReason".to_string(), RawValue::from(reason));

        self.tracker.track(DROP_OFF_EVENT, data, Some(user_id));
    }

    /// Report one cohort's activation rate; returns the rate
    pub fn track_cohort_performance(&self, cohort: &CohortRecord) -> Result<f64, AnalysisError> {
        let activation_rate = cohort.activation_rate()?;

        let mut data = RawEventData::new();
        data.insert("cohortId".to_string(), RawValue::from(cohort.cohort_id.as_str()));
        data.insert("totalUsers".to_string(), RawValue::from(cohort.total_users));
        data.insert("activatedUsers".to_string(), RawValue::from(cohort.activated_users));
        data.insert(
            "avgTimeToActivation".to_string(),
            RawValue::from(cohort.avg_time_to_activation),
        );
        data.insert(
            "topDropOffStep".to_string(),
            RawValue::from(cohort.top_drop_off_step.clone()),
        );
        data.insert("activationRate".to_string(), RawValue::from(activation_rate));

        self.tracker.track(COHORT_PERFORMANCE_EVENT, data, None);
        Ok(activation_rate)
    }

    /// True for critical alerts, which are also emitted as `funnel_alert`
    pub fn should_trigger_alert(&self, alert: &DropAlert) -> bool {
        if alert.severity != Severity::Critical {
            return false;
        }

        warn!(step = %alert.step, deviation = alert.deviation, "Critical funnel drop");
        let mut data = RawEventData::new();
        data.insert("step".to_string(), RawValue::from(alert.step.as_str()));
        data.insert("severity".to_string(), RawValue::from(alert.severity.as_str()));
        data.insert("deviation".to_string(), RawValue::from(alert.deviation));
        self.tracker.track(ALERT_EVENT, data, None);
        true
    }
}

fn insert_step_fields(data: &mut RawEventData, step: FunnelStep) {
    data.insert(FUNNEL_STEP_KEY.to_string(), RawValue::from(step.number()));
    data.insert(STEP_NAME_KEY.to_string(), RawValue::from(step.name()));
}
