//! Canonical conversion funnel steps

use serde::{Deserialize, Serialize};

/// Number of steps in the canonical funnel
pub const TOTAL_FUNNEL_STEPS: u8 = 5;

/// Event type prefix shared by all funnel step events
pub const FUNNEL_EVENT_PREFIX: &str = "funnel_";

/// Ordered stage of the journey from first launch to activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStep {
    AppLaunch,
    OnboardingComplete,
    InterestSelected,
    VtprComplete,
    Activation,
}

impl FunnelStep {
    pub const ALL: [FunnelStep; 5] = [
        FunnelStep::AppLaunch,
        FunnelStep::OnboardingComplete,
        FunnelStep::InterestSelected,
        FunnelStep::VtprComplete,
        FunnelStep::Activation,
    ];

    /// 1-based position in the funnel
    pub fn number(self) -> u8 {
        match self {
            FunnelStep::AppLaunch => 1,
            FunnelStep::OnboardingComplete => 2,
            FunnelStep::InterestSelected => 3,
            FunnelStep::VtprComplete => 4,
            FunnelStep::Activation => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FunnelStep::AppLaunch => "app_launch",
            FunnelStep::OnboardingComplete => "onboarding_complete",
            FunnelStep::InterestSelected => "interest_selected",
            FunnelStep::VtprComplete => "vtpr_complete",
            FunnelStep::Activation => "activation",
        }
    }

    /// `funnel_<name>`
    pub fn event_type(self) -> String {
        format!("{}{}", FUNNEL_EVENT_PREFIX, self.name())
    }

    pub fn from_number(number: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|step| u64::from(step.number()) == number)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.name() == name)
    }
}

impl std::fmt::Display for FunnelStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_numbers_increase_monotonically() {
        let numbers: Vec<u8> = FunnelStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(FunnelStep::ALL.len(), TOTAL_FUNNEL_STEPS as usize);
    }

    #[test]
    fn test_name_and_number_lookups() {
        for step in FunnelStep::ALL {
            assert_eq!(FunnelStep::from_name(step.name()), Some(step));
            assert_eq!(FunnelStep::from_number(step.number() as u64), Some(step));
        }
        assert_eq!(FunnelStep::from_number(0), None);
        assert_eq!(FunnelStep::from_number(6), None);
        assert_eq!(FunnelStep::from_name("alert"), None);
    }

    #[test]
    fn test_event_type_prefix() {
        assert_eq!(FunnelStep::VtprComplete.event_type(), "funnel_vtpr_complete");
        assert_eq!(FunnelStep::AppLaunch.to_string(), "app_launch");
    }

    #[test]
    fn test_serde_uses_step_names() {
        let json = serde_json::to_string(&FunnelStep::InterestSelected).unwrap();
        assert_eq!(json, "\"interest_selected\"");
    }
}
