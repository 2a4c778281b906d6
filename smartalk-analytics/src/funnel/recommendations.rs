//! Rule-based optimization recommendations

use super::AnalysisError;
use serde::{Deserialize, Serialize};

/// Time at a step above which users are lingering (seconds)
pub const LINGER_THRESHOLD_SECS: f64 = 300.0;

/// Time at a step below which users are bouncing (seconds)
pub const BOUNCE_THRESHOLD_SECS: f64 = 10.0;

/// Drop-off rate at which the major drop-off gets a high-priority fix
pub const SEVERE_DROP_OFF_RATE: f64 = 0.5;

/// Summary of where and why users leave, as produced by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelAnalysis {
    pub major_drop_off: String,
    pub drop_off_rate: f64,
    /// Seconds
    pub avg_time_at_step: f64,
    #[serde(default)]
    pub common_exit_reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    /// Rule that produced this recommendation
    pub trigger: String,
    pub message: String,
}

const EXIT_REASON_RULES: [(&str, Priority, &str); 6] = [
    (
        "too_difficult",
        Priority::High,
        "Lower the starting difficulty and add an easier introductory lesson",
    ),
    (
        "technical_issues",
        Priority::High,
        "Investigate crashes and slow loads on this step before any content changes",
    ),
    (
        "too_long",
        Priority::Medium,
        "Shorten the step or split it into smaller stages",
    ),
    (
        "boring",
        Priority::Medium,
        "Add more engaging content and interactive elements",
    ),
    (
        "unclear_instructions",
        Priority::Medium,
        "Clarify the instructions and show an example before the task",
    ),
    (
        "no_time",
        Priority::Low,
        "Offer a save-and-resume option and a shorter session mode",
    ),
];

/// Deterministic recommendations for one funnel analysis
///
/// The drop-off rule comes first, then matched exit reasons in table order,
/// then the timing rule. Unknown reasons are ignored and each rule fires at
/// most once.
pub fn generate_optimization_recommendations(
    analysis: &FunnelAnalysis,
) -> Result<Vec<Recommendation>, AnalysisError> {
    let rate = analysis.drop_off_rate;
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(AnalysisError::InvalidRate {
            subject: analysis.major_drop_off.clone(),
            value: rate,
        });
    }
    let time = analysis.avg_time_at_step;
    if !time.is_finite() || time < 0.0 {
        return Err(AnalysisError::InvalidMeasurement {
            field: "avg_time_at_step",
            value: time,
        });
    }

    let mut recommendations = Vec::new();

    if rate >= SEVERE_DROP_OFF_RATE {
        recommendations.push(Recommendation {
            priority: Priority::High,
            trigger: "severe_drop_off".to_string(),
            message: format!(
                "Redesign the {} step: {:.0}% of users leave here",
                analysis.major_drop_off,
                rate * 100.0
            ),
        });
    }

    for (reason, priority, message) in EXIT_REASON_RULES {
        if analysis.common_exit_reasons.iter().any(|r| r == reason) {
            recommendations.push(Recommendation {
                priority,
                trigger: reason.to_string(),
                message: message.to_string(),
            });
        }
    }

    if time > LINGER_THRESHOLD_SECS {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            trigger: "long_time_at_step".to_string(),
            message: format!(
                "Users spend {:.0}s on {}; add progress cues or trim content",
                time, analysis.major_drop_off
            ),
        });
    } else if time < BOUNCE_THRESHOLD_SECS {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            trigger: "short_time_at_step".to_string(),
            message: format!(
                "Users leave {} within {:.0}s; make its value clear immediately",
                analysis.major_drop_off, time
            ),
        });
    }

    Ok(recommendations)
}
