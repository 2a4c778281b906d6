//! A/B experiment impact sizing

use super::{round_to, AnalysisError};
use serde::{Deserialize, Serialize};

/// Users exposed to one variant and how many of them activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantCounts {
    pub users: u64,
    pub activated: u64,
}

impl VariantCounts {
    pub fn new(users: u64, activated: u64) -> Self {
        Self { users, activated }
    }

    fn rate(&self, subject: &str) -> Result<f64, AnalysisError> {
        if self.users == 0 {
            return Err(AnalysisError::ZeroUsers {
                subject: subject.to_string(),
            });
        }
        if self.activated > self.users {
            return Err(AnalysisError::InvalidCounts {
                subject: subject.to_string(),
                users: self.users,
                activated: self.activated,
            });
        }
        Ok(self.activated as f64 / self.users as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub control: VariantCounts,
    pub treatment: VariantCounts,
}

/// Two-sided pooled two-proportion z-test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Significance {
    pub z_score: f64,
    pub p_value: f64,
}

impl Significance {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentImpact {
    pub control_activation_rate: f64,
    pub treatment_activation_rate: f64,
    /// Treatment minus control, in rate points
    pub absolute_improvement: f64,
    /// Absolute improvement over the control rate
    pub relative_improvement: f64,
    pub statistical_significance: Significance,
}

/// Compare treatment against control
///
/// Rates and improvements are rounded to 3 dp; the significance figures are
/// left unrounded.
pub fn calculate_experiment_impact(
    results: &ExperimentResults,
) -> Result<ExperimentImpact, AnalysisError> {
    let control = results.control.rate("control")?;
    let treatment = results.treatment.rate("treatment")?;
    if control == 0.0 {
        return Err(AnalysisError::ZeroBaseline {
            subject: "control activation rate".to_string(),
        });
    }

    let absolute = treatment - control;

    Ok(ExperimentImpact {
        control_activation_rate: round_to(control, 3),
        treatment_activation_rate: round_to(treatment, 3),
        absolute_improvement: round_to(absolute, 3),
        relative_improvement: round_to(absolute / control, 3),
        statistical_significance: two_proportion_z_test(&results.control, &results.treatment),
    })
}

fn two_proportion_z_test(control: &VariantCounts, treatment: &VariantCounts) -> Significance {
    let (n1, n2) = (control.users as f64, treatment.users as f64);
    let (p1, p2) = (control.activated as f64 / n1, treatment.activated as f64 / n2);
    let pooled = (control.activated + treatment.activated) as f64 / (n1 + n2);

    let standard_error = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if standard_error == 0.0 || !standard_error.is_finite() {
        // Everyone or nobody activated in both arms
        return Significance {
            z_score: 0.0,
            p_value: 1.0,
        };
    }

    let z_score = (p2 - p1) / standard_error;
    Significance {
        z_score,
        p_value: erfc(z_score.abs() / std::f64::consts::SQRT_2).clamp(0.0, 1.0),
    }
}

/// Complementary error function for `x >= 0`
///
/// Abramowitz & Stegun 7.1.26, absolute error below 1.5e-7.
fn erfc(x: f64) -> f64 {
    const P: f64 = 0.327_591_1;
    const A: [f64; 5] = [
        0.254_829_592,
        -0.284_496_736,
        1.421_413_741,
        -1.453_152_027,
        1.061_405_429,
    ];

    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, a| acc * t + a) * t;
    poly * (-x * x).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(control: (u64, u64), treatment: (u64, u64)) -> ExperimentResults {
        ExperimentResults {
            control: VariantCounts::new(control.0, control.1),
            treatment: VariantCounts::new(treatment.0, treatment.1),
        }
    }

    #[test]
    fn test_erfc_reference_points() {
        assert!((erfc(0.0) - 1.0).abs() < 1e-6);
        // Two-sided p for z = 1.96
        assert!((erfc(1.96 / std::f64::consts::SQRT_2) - 0.05).abs() < 1e-3);
        assert!(erfc(6.0) < 1e-9);
    }

    #[test]
    fn test_identical_arms_are_not_significant() {
        let impact = calculate_experiment_impact(&results((400, 100), (400, 100))).unwrap();
        assert_eq!(impact.absolute_improvement, 0.0);
        assert!(impact.statistical_significance.z_score.abs() < 1e-12);
        assert!((impact.statistical_significance.p_value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_pooled_rate() {
        let impact = calculate_experiment_impact(&results((10, 10), (10, 10))).unwrap();
        assert_eq!(
            impact.statistical_significance,
            Significance {
                z_score: 0.0,
                p_value: 1.0
            }
        );
    }

    #[test]
    fn test_invalid_counts_are_errors() {
        assert_eq!(
            calculate_experiment_impact(&results((0, 0), (10, 5))),
            Err(AnalysisError::ZeroUsers {
                subject: "control".to_string()
            })
        );
        assert!(matches!(
            calculate_experiment_impact(&results((10, 5), (10, 11))),
            Err(AnalysisError::InvalidCounts { .. })
        ));
        assert!(matches!(
            calculate_experiment_impact(&results((10, 0), (10, 5))),
            Err(AnalysisError::ZeroBaseline { .. })
        ));
    }

    #[test]
    fn test_negative_impact() {
        let impact = calculate_experiment_impact(&results((500, 220), (500, 180))).unwrap();
        assert_eq!(impact.absolute_improvement, -0.08);
        assert_eq!(impact.relative_improvement, -0.182);
        assert!(impact.statistical_significance.z_score < 0.0);
        assert!(impact.statistical_significance.is_significant(0.05));
    }
}
