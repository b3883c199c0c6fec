//! Ladder feature slice: the domain registry, each domain's tier ladder and the
//! versioned score thresholds that map averages to tiers.

mod active;
#[cfg(feature = "server")]
pub mod api;
mod error;
mod events;
pub mod seed;
mod service;
pub mod validator;

pub use crate::active::{ActiveLadder, Rung};
pub use crate::error::{LadderError, LadderErrorExt};
pub use crate::events::{LadderChange, LadderChanged};
pub use crate::service::{
    LadderService, ThresholdSpec, ThresholdVersion, TierSpec, VersionState, tier_id,
};
pub use crate::validator::{LadderValidationError, LadderViolation, validate_ladder};

use apex_database::Database;
use apex_domain::config::ApiConfig;
use apex_event_bus::EventBus;
use apex_kernel::clock::SharedClock;
use apex_kernel::domain::registry::InitializedSlice;

/// Feature inner state
#[apex_derive::apex_slice]
pub struct Ladder {
    pub service: LadderService,
}

/// Builds the ladder slice and applies the seed migrations when enabled.
///
/// # Errors
/// Returns an error when a seed migration fails.
pub fn init(
    config: &ApiConfig,
    database: &Database,
    events: &EventBus,
    clock: &SharedClock,
) -> Result<InitializedSlice, LadderError> {
    let service = LadderService::new(database.clone(), events.clone(), clock.clone());

    if config.database.seed {
        seed::run(database, &service, config.database.migrations_dir.as_deref())?;
    }

    tracing::info!(domains = service.list_domains().len(), "Ladder feature initialized");

    Ok(InitializedSlice::new(Ladder::new(LadderInner { service })))
}
