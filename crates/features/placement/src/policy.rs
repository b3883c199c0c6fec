use apex_domain::config::PlacementConfig;
use chrono::Duration;

/// Tunables of the placement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPolicy {
    /// How long a demoted candidate stays in `COOLDOWN`.
    pub cooldown: Duration,
}

impl PlacementPolicy {
    #[must_use]
    pub fn from_config(config: &PlacementConfig) -> Self {
        Self { cooldown: Duration::days(i64::from(config.cooldown_days)) }
    }
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self::from_config(&PlacementConfig::default())
    }
}
