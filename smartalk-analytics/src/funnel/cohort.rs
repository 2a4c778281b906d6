//! Cohort activation metrics

use super::{round_to, AnalysisError};
use serde::{Deserialize, Serialize};

/// Aggregate counts for users acquired in the same time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRecord {
    pub cohort_id: String,
    pub total_users: u64,
    pub activated_users: u64,
    /// Seconds from acquisition to activation
    #[serde(default)]
    pub avg_time_to_activation: Option<f64>,
    #[serde(default)]
    pub top_drop_off_step: Option<String>,
}

impl CohortRecord {
    /// `activated_users / total_users`
    pub fn activation_rate(&self) -> Result<f64, AnalysisError> {
        if self.total_users == 0 {
            return Err(AnalysisError::ZeroUsers {
                subject: self.cohort_id.clone(),
            });
        }
        if self.activated_users > self.total_users {
            return Err(AnalysisError::InvalidCounts {
                subject: self.cohort_id.clone(),
                users: self.total_users,
                activated: self.activated_users,
            });
        }
        Ok(self.activated_users as f64 / self.total_users as f64)
    }
}

/// One cohort's headline numbers, as compared across cohorts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortSummary {
    pub id: String,
    pub activation_rate: f64,
    pub total_users: u64,
}

impl CohortSummary {
    pub fn new(id: impl Into<String>, activation_rate: f64, total_users: u64) -> Self {
        Self {
            id: id.into(),
            activation_rate,
            total_users,
        }
    }
}

/// Direction of activation rate from the first cohort to the last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortComparison {
    /// Unweighted mean, 3 dp
    pub avg_activation_rate: f64,
    pub best_performing_cohort: String,
    pub worst_performing_cohort: String,
    /// `(last - first) / first`, 2 dp; `None` when the first rate is zero
    pub improvement_rate: Option<f64>,
    pub trend: Trend,
}

/// Compare cohorts given in chronological order
///
/// Best and worst ties go to the first cohort encountered.
pub fn compare_cohorts(cohorts: &[CohortSummary]) -> Result<CohortComparison, AnalysisError> {
    let (first, last) = match (cohorts.first(), cohorts.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(AnalysisError::NoCohorts),
    };

    for cohort in cohorts {
        let rate = cohort.activation_rate;
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(AnalysisError::InvalidRate {
                subject: cohort.id.clone(),
                value: rate,
            });
        }
    }

    let mut best = first;
    let mut worst = first;
    for cohort in &cohorts[1..] {
        if cohort.activation_rate > best.activation_rate {
            best = cohort;
        }
        if cohort.activation_rate < worst.activation_rate {
            worst = cohort;
        }
    }

    let mean = cohorts.iter().map(|c| c.activation_rate).sum::<f64>() / cohorts.len() as f64;

    let improvement_rate = (first.activation_rate > 0.0).then(|| {
        round_to(
            (last.activation_rate - first.activation_rate) / first.activation_rate,
            2,
        )
    });

    let trend = if last.activation_rate > first.activation_rate {
        Trend::Improving
    } else if last.activation_rate < first.activation_rate {
        Trend::Declining
    } else {
        Trend::Stable
    };

    Ok(CohortComparison {
        avg_activation_rate: round_to(mean, 3),
        best_performing_cohort: best.id.clone(),
        worst_performing_cohort: worst.id.clone(),
        improvement_rate,
        trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_error() {
        assert_eq!(compare_cohorts(&[]), Err(AnalysisError::NoCohorts));
    }

    #[test]
    fn test_rate_out_of_range_is_error() {
        let cohorts = vec![CohortSummary::new("a", 0.3, 10), CohortSummary::new("b", 1.2, 10)];
        assert!(matches!(
            compare_cohorts(&cohorts),
            Err(AnalysisError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_declining_and_stable_trends() {
        let declining = vec![CohortSummary::new("a", 0.5, 10), CohortSummary::new("b", 0.4, 10)];
        assert_eq!(compare_cohorts(&declining).unwrap().trend, Trend::Declining);

        let stable = vec![
            CohortSummary::new("a", 0.4, 10),
            CohortSummary::new("b", 0.9, 10),
            CohortSummary::new("c", 0.4, 10),
        ];
        let comparison = compare_cohorts(&stable).unwrap();
        assert_eq!(comparison.trend, Trend::Stable);
        assert_eq!(comparison.improvement_rate, Some(0.0));
    }

    #[test]
    fn test_ties_go_to_first_encountered() {
        let cohorts = vec![
            CohortSummary::new("a", 0.4, 10),
            CohortSummary::new("b", 0.4, 10),
        ];
        let comparison = compare_cohorts(&cohorts).unwrap();
        assert_eq!(comparison.best_performing_cohort, "a");
        assert_eq!(comparison.worst_performing_cohort, "a");
    }

    #[test]
    fn test_zero_first_rate_has_no_improvement_rate() {
        let cohorts = vec![CohortSummary::new("a", 0.0, 10), CohortSummary::new("b", 0.2, 10)];
        let comparison = compare_cohorts(&cohorts).unwrap();
        assert_eq!(comparison.improvement_rate, None);
        assert_eq!(comparison.trend, Trend::Improving);
    }

    #[test]
    fn test_record_activation_rate() {
        let record = CohortRecord {
            cohort_id: "2024-01-01".to_string(),
            total_users: 200,
            activated_users: 70,
            avg_time_to_activation: None,
            top_drop_off_step: None,
        };
        assert!((record.activation_rate().unwrap() - 0.35).abs() < 1e-12);

        let empty = CohortRecord {
            total_users: 0,
            activated_users: 0,
            ..record.clone()
        };
        assert_eq!(
            empty.activation_rate(),
            Err(AnalysisError::ZeroUsers {
                subject: "2024-01-01".to_string()
            })
        );
        assert_eq!(
            empty.activation_rate().unwrap_err().to_string(),
            "\"2024-01-01\" has zero users and cannot be used as a baseline"
        );

        let inverted = CohortRecord {
            activated_users: 300,
            ..record
        };
        assert!(matches!(
            inverted.activation_rate(),
            Err(AnalysisError::InvalidCounts { .. })
        ));
    }
}
