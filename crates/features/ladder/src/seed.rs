//! Versioned ladder seed data.
//!
//! Seeds are TOML documents applied through the database migration ledger, so each
//! version runs once and an edited document is refused instead of silently re-applied.

use crate::error::LadderError;
use crate::service::{LadderService, ThresholdSpec, TierSpec};
use apex_database::{Database, Migration, MigrationReport};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

pub const SLICE_KEY: &str = "ladder";

/// Seeds compiled into the binary.
#[must_use]
pub fn embedded_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            SLICE_KEY,
            "0001_core_domains",
            include_str!("../migrations/0001_core_domains.toml"),
        ),
        Migration::new(
            SLICE_KEY,
            "0002_dsa_recalibration",
            include_str!("../migrations/0002_dsa_recalibration.toml"),
        ),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedDocument {
    #[serde(default)]
    domains: Vec<SeedDomain>,
    #[serde(default)]
    threshold_sets: Vec<SeedThresholdSet>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedDomain {
    name: String,
    #[serde(default)]
    description: String,
    /// Defaults to the Unix epoch: seeded ladders are in force from the start.
    effective_date: Option<DateTime<Utc>>,
    tiers: Vec<SeedTier>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedTier {
    level: u8,
    name: String,
    max_slots: Option<u32>,
    #[serde(default)]
    yearly_cost: u64,
    #[serde(default)]
    features: Vec<String>,
    min_score: u8,
    max_score: u8,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedThresholdSet {
    domain: String,
    effective_date: DateTime<Utc>,
    ranges: Vec<ThresholdSpec>,
}

/// Applies the embedded seeds plus any `*.toml` files found in `extra_dir`.
///
/// # Errors
/// Fails on unreadable or malformed documents, edited documents that were already
/// applied, and seed data the ladder rules reject.
pub fn run(
    db: &Database,
    service: &LadderService,
    extra_dir: Option<&Path>,
) -> Result<MigrationReport, LadderError> {
    let mut migrations = embedded_migrations();
    if let Some(dir) = extra_dir {
        migrations.extend(Migration::load_dir(SLICE_KEY, dir)?);
    }

    let report = db.migrations().run(migrations, |migration| apply(service, migration))?;
    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "Ladder seed migrations complete"
    );
    Ok(report)
}

fn apply(service: &LadderService, migration: &Migration) -> Result<(), LadderError> {
    let document: SeedDocument = toml::from_str(migration.script())
        .map_err(|source| LadderError::Seed { source, context: Some(migration.key().into()) })?;

    for seed in document.domains {
        if service.find_domain(&seed.name).is_some() {
            debug!(domain = %seed.name, "Seed domain already present");
            continue;
        }
        seed_domain(service, seed)?;
    }

    for set in document.threshold_sets {
        let id = service.find_domain(&set.domain).ok_or_else(|| LadderError::DomainNotFound {
            message: set.domain.clone().into(),
            context: Some(migration.key().into()),
        })?;
        service.publish_thresholds(&id, &set.ranges, Some(set.effective_date))?;
    }

    Ok(())
}

fn seed_domain(service: &LadderService, seed: SeedDomain) -> Result<(), LadderError> {
    let domain = service.create_domain(&seed.name, &seed.description)?;
    let mut ranges = Vec::with_capacity(seed.tiers.len());

    for tier in seed.tiers {
        ranges.push(ThresholdSpec::new(tier.level, tier.min_score, tier.max_score));
        service.add_tier(
            &domain.id,
            TierSpec {
                level: tier.level,
                name: tier.name,
                max_slots: tier.max_slots,
                yearly_cost: tier.yearly_cost,
                features: tier.features,
            },
        )?;
    }

    let effective_date = seed.effective_date.unwrap_or(DateTime::UNIX_EPOCH);
    service.publish_thresholds(&domain.id, &ranges, Some(effective_date))?;
    Ok(())
}
