//! Facade crate for the ApexHire feature slices and shared modules.
//! Re-exports domain/kernel primitives and aggregates feature initialization.
//! Keep this crate thin: it should compose other crates, not implement business logic.
//!
//! ## Usage
//! - Add `apex` with the `server` feature.
//! - Call `apex::init` to build the feature slices, then `apex::server::router` for the
//!   merged REST surface.

use apex_database::Database;
pub use apex_domain as domain;
use apex_domain::config::ApiConfig;
use apex_event_bus::EventBus;
pub use apex_kernel as kernel;
use apex_kernel::clock::SharedClock;

#[cfg(feature = "server")]
pub mod server {
    use apex_kernel::server::ApiState;
    use utoipa_axum::router::OpenApiRouter;

    pub use apex_kernel::server::system_router;

    /// Every enabled slice's routes plus the system endpoints.
    pub fn router() -> OpenApiRouter<ApiState> {
        OpenApiRouter::new()
            .merge(system_router())
            .merge(apex_ladder::api::router())
            .merge(apex_placement::api::router())
    }
}

/// Feature registry for runtime introspection.
pub mod features {
    pub use apex_ladder as ladder;
    pub use apex_placement as placement;

    /// Build-time enabled features (by Cargo feature).
    pub const ENABLED: &[&str] = &[
        #[cfg(feature = "server")]
        "server",
        "ladder",
        "placement",
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

/// Initialize all feature slices.
///
/// The ladder goes first: it applies the seed migrations the placement slice reads.
///
/// # Errors
/// Returns an error if any feature initialization fails.
pub fn init(
    config: &ApiConfig,
    database: &Database,
    events: &EventBus,
    clock: &SharedClock,
) -> Result<Vec<domain::registry::InitializedSlice>, Box<dyn std::error::Error + Send + Sync>> {
    let mut slices = Vec::new();

    // Domains, tiers and thresholds
    slices.push(features::ladder::init(config, database, events, clock)?);

    // Candidates and tier placement
    slices.push(features::placement::init(config, database, events, clock)?);

    Ok(slices)
}
