use crate::constants::{MOCK_INTERVIEWS, PRIORITY_REFERRAL, PROFILE_LISTING, RECRUITER_CONTACT};
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Benefits unlocked by a tier.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct TierFeatures: u32 {
        const PROFILE_LISTING = 1 << 0;
        const RECRUITER_CONTACT = 1 << 1;
        const PRIORITY_REFERRAL = 1 << 2;
        const MOCK_INTERVIEWS = 1 << 3;

        const ALL = Self::PROFILE_LISTING.bits()
            | Self::RECRUITER_CONTACT.bits()
            | Self::PRIORITY_REFERRAL.bits()
            | Self::MOCK_INTERVIEWS.bits();
    }
}

impl TierFeatures {
    /// Combines feature names; unknown names are ignored.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        names.into_iter().map(Self::from).fold(Self::empty(), |acc, f| acc | f)
    }

    /// Names of the individual features set, in declaration order.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::PROFILE_LISTING, PROFILE_LISTING),
            (Self::RECRUITER_CONTACT, RECRUITER_CONTACT),
            (Self::PRIORITY_REFERRAL, PRIORITY_REFERRAL),
            (Self::MOCK_INTERVIEWS, MOCK_INTERVIEWS),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl From<&str> for TierFeatures {
    fn from(s: &str) -> Self {
        match s {
            PROFILE_LISTING => Self::PROFILE_LISTING,
            RECRUITER_CONTACT => Self::RECRUITER_CONTACT,
            PRIORITY_REFERRAL => Self::PRIORITY_REFERRAL,
            MOCK_INTERVIEWS => Self::MOCK_INTERVIEWS,
            "all" | "*" => Self::ALL,
            _ => Self::empty(),
        }
    }
}

impl From<u32> for TierFeatures {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl Serialize for TierFeatures {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for TierFeatures {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u32::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}
