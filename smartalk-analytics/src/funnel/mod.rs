//! Conversion funnel analytics
//!
//! Pure computations over caller-supplied funnel data (counts gathered by
//! the backend or a query over stored events), plus [`FunnelTracker`], the
//! thin step-tracking layer that emits funnel events through a [`Tracker`].
//!
//! All computations reject malformed input with an [`AnalysisError`] rather
//! than letting NaN or infinity reach a dashboard.
//!
//! [`Tracker`]: crate::tracker::Tracker

mod anomaly;
mod cohort;
mod conversion;
mod experiment;
mod progression;
mod recommendations;
mod steps;

pub use anomaly::{detect_anomalies, Anomaly, DropAlert, Severity};
pub use cohort::{compare_cohorts, CohortComparison, CohortRecord, CohortSummary, Trend};
pub use conversion::{
    calculate_conversion_rates, identify_drop_off_points, ConversionRates, DropOffPoint,
    StepConversion,
};
pub use experiment::{
    calculate_experiment_impact, ExperimentImpact, ExperimentResults, Significance, VariantCounts,
};
pub use progression::{get_user_progression, progression_from_events, UserProgression};
pub use recommendations::{
    generate_optimization_recommendations, FunnelAnalysis, Priority, Recommendation,
};
pub use steps::FunnelTracker;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Funnel analysis input errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Funnel data needs at least {required} steps, got {actual}")]
    InsufficientSteps { required: usize, actual: usize },

    #[error("{subject:?} has zero users and cannot be used as a baseline")]
    ZeroUsers { subject: String },

    #[error("Threshold must be finite and within {range}, got {value}")]
    InvalidThreshold { value: f64, range: &'static str },

    #[error("{subject}: rate must be within [0, 1], got {value}")]
    InvalidRate { subject: String, value: f64 },

    #[error("{subject}: activated ({activated}) exceeds users ({users})")]
    InvalidCounts {
        subject: String,
        users: u64,
        activated: u64,
    },

    #[error("{subject}: baseline is zero")]
    ZeroBaseline { subject: String },

    #[error("No cohorts to compare")]
    NoCohorts,

    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidMeasurement { field: &'static str, value: f64 },
}

/// Users who reached one funnel step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelCount {
    pub step: String,
    pub users: u64,
}

impl FunnelCount {
    pub fn new(step: impl Into<String>, users: u64) -> Self {
        Self {
            step: step.into(),
            users,
        }
    }
}

/// Round half away from zero to `decimals` places
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.714285, 3), 0.714);
        assert_eq!(round_to(0.3714, 2), 0.37);
        assert_eq!(round_to(-0.43750000000000006, 4), -0.4375);
        assert_eq!(round_to(0.08000000000000002, 3), 0.08);
    }
}
