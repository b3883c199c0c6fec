use apex_domain::ids::DomainId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LadderChange {
    DomainCreated,
    DomainRemoved,
    TierAdded { level: u8 },
    ThresholdsPublished { effective_date: DateTime<Utc> },
}

/// Published on the event bus after a ladder mutation commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderChanged {
    pub domain_id: DomainId,
    pub change: LadderChange,
    pub at: DateTime<Utc>,
}
