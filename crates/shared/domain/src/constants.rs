//! Entity names, score bounds and `OpenAPI` tags.

pub const DOMAIN: &str = "domain";
pub const TIER: &str = "tier";
pub const CANDIDATE: &str = "candidate";
pub const ATTEMPT: &str = "attempt";

pub const SYSTEM_TAG: &str = "System";
pub const LADDER_TAG: &str = "Ladder";
pub const PLACEMENT_TAG: &str = "Placement";

/// Lowest score an exam attempt or a threshold bound can take.
pub const MIN_SCORE: u8 = 0;
/// Highest score an exam attempt or a threshold bound can take.
pub const MAX_SCORE: u8 = 100;

pub const MIN_TIER_LEVEL: u8 = 1;
pub const MAX_TIER_LEVEL: u8 = 5;

pub const DEFAULT_COOLDOWN_DAYS: u32 = 14;

pub const PROFILE_LISTING: &str = "profile_listing";
pub const RECRUITER_CONTACT: &str = "recruiter_contact";
pub const PRIORITY_REFERRAL: &str = "priority_referral";
pub const MOCK_INTERVIEWS: &str = "mock_interviews";
