//! Deviation of observed step rates from expected baselines

use super::{round_to, AnalysisError, FunnelCount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How far past the threshold an anomaly lies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Band for `|deviation| / threshold`, which exceeds 1 for any anomaly
    ///
    /// `(1, 1.5]` low, `(1.5, 2]` medium, `(2, 3]` high, above 3 critical.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 3.0 {
            Severity::Critical
        } else if ratio > 2.0 {
            Severity::High
        } else if ratio > 1.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub step: String,
    /// Step users over entry users, 3 dp
    pub actual_rate: f64,
    pub expected_rate: f64,
    /// `(actual - expected) / expected`, 4 dp
    pub deviation: f64,
    pub severity: Severity,
}

/// Alert candidate handed to [`FunnelTracker::should_trigger_alert`]
///
/// [`FunnelTracker::should_trigger_alert`]: super::FunnelTracker::should_trigger_alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropAlert {
    pub step: String,
    pub severity: Severity,
    pub deviation: f64,
}

impl From<&Anomaly> for DropAlert {
    fn from(anomaly: &Anomaly) -> Self {
        Self {
            step: anomaly.step.clone(),
            severity: anomaly.severity,
            deviation: anomaly.deviation,
        }
    }
}

/// Steps whose reach deviates from `expected` by more than `threshold`
///
/// `expected` maps step names to the expected fraction of entry users
/// reaching that step. Steps absent from either side are skipped, as is the
/// entry step. Results follow funnel order.
pub fn detect_anomalies(
    funnel: &[FunnelCount],
    expected: &BTreeMap<String, f64>,
    threshold: f64,
) -> Result<Vec<Anomaly>, AnalysisError> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(AnalysisError::InvalidThreshold {
            value: threshold,
            range: "(0, inf)",
        });
    }
    let entry = funnel.first().ok_or(AnalysisError::InsufficientSteps {
        required: 1,
        actual: 0,
    })?;
    if entry.users == 0 {
        return Err(AnalysisError::ZeroUsers {
            subject: entry.step.clone(),
        });
    }

    let mut anomalies = Vec::new();
    for count in &funnel[1..] {
        let Some(&expected_rate) = expected.get(&count.step) else {
            continue;
        };
        if !expected_rate.is_finite() || expected_rate < 0.0 {
            return Err(AnalysisError::InvalidRate {
                subject: count.step.clone(),
                value: expected_rate,
            });
        }
        if expected_rate == 0.0 {
            return Err(AnalysisError::ZeroBaseline {
                subject: count.step.clone(),
            });
        }

        let actual_rate = count.users as f64 / entry.users as f64;
        let deviation = (actual_rate - expected_rate) / expected_rate;
        if deviation.abs() > threshold {
            anomalies.push(Anomaly {
                step: count.step.clone(),
                actual_rate: round_to(actual_rate, 3),
                expected_rate,
                deviation: round_to(deviation, 4),
                severity: Severity::from_ratio(deviation.abs() / threshold),
            });
        }
    }

    Ok(anomalies)
}
