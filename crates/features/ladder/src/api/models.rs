use crate::active::Rung;
use crate::service::{ThresholdSpec, ThresholdVersion, TierSpec};
use crate::validator::LadderViolation;
use apex_derive::api_model;
use apex_domain::ladder::{Domain, Tier, TierThreshold};
use chrono::{DateTime, Utc};

#[api_model]
/// New skill domain
pub struct CreateDomainRequest {
    /// Unique display name, compared case-insensitively
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[api_model]
pub struct UpdateDomainRequest {
    pub description: String,
}

#[api_model]
/// Skill domain
pub struct DomainResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<Domain> for DomainResponse {
    fn from(domain: Domain) -> Self {
        Self {
            id: domain.id.into_inner(),
            name: domain.name,
            description: domain.description,
            created_at: domain.created_at,
        }
    }
}

#[api_model]
/// Next tier of a domain's ladder
pub struct TierRequest {
    /// Must be one above the current top level
    pub level: u8,
    pub name: String,
    /// Omit for an unbounded tier
    #[serde(default)]
    pub max_slots: Option<u32>,
    /// Yearly cost in minor currency units
    #[serde(default)]
    pub yearly_cost: u64,
    /// Feature names such as `mock_interviews`
    #[serde(default)]
    pub features: Vec<String>,
}

impl From<TierRequest> for TierSpec {
    fn from(request: TierRequest) -> Self {
        Self {
            level: request.level,
            name: request.name,
            max_slots: request.max_slots,
            yearly_cost: request.yearly_cost,
            features: request.features,
        }
    }
}

#[api_model]
pub struct TierResponse {
    pub id: String,
    pub level: u8,
    pub name: String,
    pub max_slots: Option<u32>,
    pub yearly_cost: u64,
    pub features: Vec<String>,
}

impl From<Tier> for TierResponse {
    fn from(tier: Tier) -> Self {
        Self {
            id: tier.id.into_inner(),
            level: tier.level.get(),
            name: tier.name,
            max_slots: tier.max_slots,
            yearly_cost: tier.yearly_cost,
            features: tier.features.names().into_iter().map(str::to_owned).collect(),
        }
    }
}

#[api_model]
/// A tier with the score range currently in force
pub struct RungResponse {
    pub tier_id: String,
    pub level: u8,
    pub name: String,
    pub min_score: u8,
    pub max_score: u8,
    pub effective_date: DateTime<Utc>,
}

impl From<&Rung> for RungResponse {
    fn from(rung: &Rung) -> Self {
        Self {
            tier_id: rung.tier.id.to_string(),
            level: rung.tier.level.get(),
            name: rung.tier.name.clone(),
            min_score: rung.range.min,
            max_score: rung.range.max,
            effective_date: rung.effective_date,
        }
    }
}

#[api_model]
/// Domain with its tiers and the ladder in force
pub struct DomainDetailsResponse {
    pub domain: DomainResponse,
    pub tiers: Vec<TierResponse>,
    /// Empty while the ladder is incomplete
    pub ladder: Vec<RungResponse>,
    pub violations: Vec<LadderViolation>,
}

#[api_model]
pub struct ThresholdRequest {
    pub level: u8,
    pub min_score: u8,
    pub max_score: u8,
    /// `false` withdraws the tier from the ladder
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl From<&ThresholdRequest> for ThresholdSpec {
    fn from(request: &ThresholdRequest) -> Self {
        Self {
            level: request.level,
            min_score: request.min_score,
            max_score: request.max_score,
            is_active: request.is_active,
        }
    }
}

#[api_model]
/// Threshold publication; every tier must be covered or withdrawn
pub struct PublishThresholdsRequest {
    /// Defaults to now
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    pub thresholds: Vec<ThresholdRequest>,
}

impl PublishThresholdsRequest {
    pub(crate) fn specs(&self) -> Vec<ThresholdSpec> {
        self.thresholds.iter().map(ThresholdSpec::from).collect()
    }
}

#[api_model]
pub struct ThresholdResponse {
    pub tier_id: String,
    pub min_score: u8,
    pub max_score: u8,
    pub is_active: bool,
    pub effective_date: DateTime<Utc>,
    /// `scheduled`, `current`, `disabled` or `superseded`; history only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl From<TierThreshold> for ThresholdResponse {
    fn from(threshold: TierThreshold) -> Self {
        Self {
            tier_id: threshold.tier_id.into_inner(),
            min_score: threshold.range.min,
            max_score: threshold.range.max,
            is_active: threshold.is_active,
            effective_date: threshold.effective_date,
            state: None,
        }
    }
}

impl From<ThresholdVersion> for ThresholdResponse {
    fn from(version: ThresholdVersion) -> Self {
        Self { state: Some(version.state.as_str().to_owned()), ..Self::from(version.threshold) }
    }
}

#[api_model]
/// Dry-run result
pub struct ValidationResponse {
    pub valid: bool,
    pub violations: Vec<LadderViolation>,
}
