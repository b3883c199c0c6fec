//! Placement feature slice: candidates, their enrollment in skill domains and the
//! engine that moves them between tiers as graded scores arrive.

mod anonymize;
#[cfg(feature = "server")]
pub mod api;
mod engine;
mod error;
mod events;
mod policy;
mod service;
mod standings;

pub use crate::anonymize::Anonymizer;
pub use crate::engine::{Movement, PlacementOutcome};
pub use crate::error::{PlacementError, PlacementErrorExt};
pub use crate::events::{PlacementChanged, PlacementReason};
pub use crate::policy::PlacementPolicy;
pub use crate::service::{CapacityChange, PlacementService, Withdrawal};
pub use crate::standings::{CandidateDomainStatus, RankedCandidate};

use apex_database::Database;
use apex_domain::config::ApiConfig;
use apex_event_bus::EventBus;
use apex_kernel::clock::SharedClock;
use apex_kernel::domain::registry::InitializedSlice;

/// Feature inner state
#[apex_derive::apex_slice]
pub struct Placement {
    pub service: PlacementService,
}

/// Builds the placement slice from the `placement` config section.
///
/// # Errors
/// Returns an error when the anonymization salt is empty.
pub fn init(
    config: &ApiConfig,
    database: &Database,
    events: &EventBus,
    clock: &SharedClock,
) -> Result<InitializedSlice, PlacementError> {
    let salt = config.placement.anonymization_salt.trim();
    if salt.is_empty() {
        return Err(PlacementError::invalid("placement.anonymization_salt must not be empty"));
    }

    let policy = PlacementPolicy::from_config(&config.placement);
    let service = PlacementService::new(
        database.clone(),
        events.clone(),
        clock.clone(),
        policy,
        Anonymizer::new(salt),
    );

    tracing::info!(
        cooldown_days = config.placement.cooldown_days,
        "Placement feature initialized"
    );

    Ok(InitializedSlice::new(Placement::new(PlacementInner { service })))
}
