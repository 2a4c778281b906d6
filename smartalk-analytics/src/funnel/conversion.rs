//! Step-to-step conversion rates and drop-off detection

use super::{round_to, AnalysisError, FunnelCount};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Incoming conversion rate of one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepConversion {
    pub step: String,
    /// `None` when the previous step had zero users
    pub rate: Option<f64>,
}

/// Conversion rates in funnel order, excluding the entry step
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRates {
    pub steps: Vec<StepConversion>,
    /// Last step over entry step
    pub overall: f64,
}

impl ConversionRates {
    /// Rate into `step`; `None` if unknown or not computable
    pub fn rate(&self, step: &str) -> Option<f64> {
        self.steps.iter().find(|s| s.step == step).and_then(|s| s.rate)
    }
}

/// Serializes as `{"<step>": rate, ..., "overall": rate}`
impl Serialize for ConversionRates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.steps.len() + 1))?;
        for step in &self.steps {
            map.serialize_entry(&step.step, &step.rate)?;
        }
        map.serialize_entry("overall", &self.overall)?;
        map.end()
    }
}

/// A transition losing at least the requested fraction of users
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropOffPoint {
    pub from_step: String,
    pub to_step: String,
    pub drop_off_rate: f64,
    pub users_lost: u64,
}

fn require_entry(funnel: &[FunnelCount]) -> Result<&FunnelCount, AnalysisError> {
    if funnel.len() < 2 {
        return Err(AnalysisError::InsufficientSteps {
            required: 2,
            actual: funnel.len(),
        });
    }
    let entry = &funnel[0];
    if entry.users == 0 {
        return Err(AnalysisError::ZeroUsers {
            subject: entry.step.clone(),
        });
    }
    Ok(entry)
}

/// `users[i] / users[i-1]` per step (3 dp) plus last over first
pub fn calculate_conversion_rates(funnel: &[FunnelCount]) -> Result<ConversionRates, AnalysisError> {
    let entry = require_entry(funnel)?;

    let steps = funnel
        .windows(2)
        .map(|pair| StepConversion {
            step: pair[1].step.clone(),
            rate: (pair[0].users > 0)
                .then(|| round_to(pair[1].users as f64 / pair[0].users as f64, 3)),
        })
        .collect();

    let last = &funnel[funnel.len() - 1];
    Ok(ConversionRates {
        steps,
        overall: round_to(last.users as f64 / entry.users as f64, 3),
    })
}

/// Consecutive transitions whose drop-off rate is at least `threshold`
///
/// Reported in funnel order. Transitions out of a zero-user step have
/// nobody to lose and are skipped.
pub fn identify_drop_off_points(
    funnel: &[FunnelCount],
    threshold: f64,
) -> Result<Vec<DropOffPoint>, AnalysisError> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(AnalysisError::InvalidThreshold {
            value: threshold,
            range: "[0, 1]",
        });
    }
    require_entry(funnel)?;

    Ok(funnel
        .windows(2)
        .filter(|pair| pair[0].users > 0 && pair[1].users <= pair[0].users)
        .filter_map(|pair| {
            let (from, to) = (&pair[0], &pair[1]);
            // lost/from == 1 - to/from, but exact at round thresholds
            let users_lost = from.users - to.users;
            let drop_off_rate = users_lost as f64 / from.users as f64;
            (drop_off_rate >= threshold).then(|| DropOffPoint {
                from_step: from.step.clone(),
                to_step: to.step.clone(),
                drop_off_rate: round_to(drop_off_rate, 3),
                users_lost,
            })
        })
        .collect())
}
