//! Skill domains, their tier ladders and the versioned score thresholds.

use crate::constants::{MAX_SCORE, MAX_TIER_LEVEL, MIN_TIER_LEVEL};
use crate::features::TierFeatures;
use crate::ids::{DomainId, TierId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    /// Unique, compared case-insensitively.
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Position on a ladder, `1` being the entry tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct TierLevel(u8);

impl TierLevel {
    pub const ENTRY: Self = Self(MIN_TIER_LEVEL);

    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level >= MIN_TIER_LEVEL && level <= MAX_TIER_LEVEL { Some(Self(level)) } else { None }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_entry(self) -> bool {
        self.0 == MIN_TIER_LEVEL
    }
}

impl TryFrom<u8> for TierLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level).ok_or_else(|| {
            format!("tier level {level} outside {MIN_TIER_LEVEL}..={MAX_TIER_LEVEL}")
        })
    }
}

impl From<TierLevel> for u8 {
    fn from(level: TierLevel) -> Self {
        level.0
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub domain_id: DomainId,
    pub level: TierLevel,
    pub name: String,
    /// `None` means unbounded; the entry tier is always unbounded.
    pub max_slots: Option<u32>,
    /// Yearly cost in minor currency units.
    pub yearly_cost: u64,
    pub features: TierFeatures,
}

impl Tier {
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.max_slots.is_some()
    }

    /// Whether `active` occupants leave room for one more.
    #[must_use]
    pub fn has_room_for(&self, active: usize) -> bool {
        self.max_slots.is_none_or(|slots| active < slots as usize)
    }
}

/// Inclusive whole-point score range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: u8,
    pub max: u8,
}

impl ScoreRange {
    #[must_use]
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// `min <= max` and both within the score scale.
    #[must_use]
    pub const fn is_well_formed(self) -> bool {
        self.min <= self.max && self.max <= MAX_SCORE
    }
}

impl fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// One version of a tier's score range. Versions are append-only; the latest version
/// whose `effective_date` has passed is the one in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub domain_id: DomainId,
    pub tier_id: TierId,
    pub range: ScoreRange,
    /// A version published as inactive withdraws the tier's range from that date on.
    pub is_active: bool,
    pub effective_date: DateTime<Utc>,
}

impl TierThreshold {
    #[must_use]
    pub const fn min_score(&self) -> u8 {
        self.range.min
    }

    #[must_use]
    pub const fn max_score(&self) -> u8 {
        self.range.max
    }
}
