use crate::active::{ActiveLadder, current_version};
use crate::error::LadderError;
use crate::events::{LadderChange, LadderChanged};
use crate::validator::{LadderValidationError, validate_ladder};
use apex_database::{Database, DomainPartition};
use apex_domain::features::TierFeatures;
use apex_domain::ids::{DomainId, TierId};
use apex_domain::ladder::{Domain, ScoreRange, Tier, TierLevel, TierThreshold};
use apex_event_bus::EventBus;
use apex_kernel::clock::SharedClock;
use apex_kernel::slug_id;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

const MAX_NAME_LEN: usize = 64;

/// Tier definition accepted by [`LadderService::add_tier`].
#[derive(Debug, Clone, Deserialize)]
pub struct TierSpec {
    pub level: u8,
    pub name: String,
    #[serde(default)]
    pub max_slots: Option<u32>,
    #[serde(default)]
    pub yearly_cost: u64,
    #[serde(default)]
    pub features: Vec<String>,
}

/// One tier's range in a threshold publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThresholdSpec {
    pub level: u8,
    pub min_score: u8,
    pub max_score: u8,
    /// `false` withdraws the tier from the ladder as of the effective date.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl ThresholdSpec {
    #[must_use]
    pub const fn new(level: u8, min_score: u8, max_score: u8) -> Self {
        Self { level, min_score, max_score, is_active: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    /// Effective date still ahead.
    Scheduled,
    /// The version in force now.
    Current,
    /// In force now, but withdraws the tier.
    Disabled,
    /// Replaced by a later version.
    Superseded,
}

impl VersionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Current => "current",
            Self::Disabled => "disabled",
            Self::Superseded => "superseded",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdVersion {
    pub threshold: TierThreshold,
    pub state: VersionState,
}

/// Domain registry and ladder administration.
#[derive(Debug, Clone)]
pub struct LadderService {
    db: Database,
    events: EventBus,
    clock: SharedClock,
}

impl LadderService {
    #[must_use]
    pub const fn new(db: Database, events: EventBus, clock: SharedClock) -> Self {
        Self { db, events, clock }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // --- Domains ---

    /// # Errors
    /// [`LadderError::InvalidRequest`] for a blank or oversized name,
    /// [`LadderError::DomainExists`] when the name is taken.
    #[instrument(skip(self, description))]
    pub fn create_domain(&self, name: &str, description: &str) -> Result<Domain, LadderError> {
        let name = validated_name(name, "domain name")?;
        let now = self.now();
        let domain = Domain {
            id: slug_id(name),
            name: name.to_owned(),
            description: description.trim().to_owned(),
            created_at: now,
        };

        self.db.create_domain(domain.clone()).map_err(|err| LadderError::from(err).normalize())?;
        info!(domain = %domain.id, "Domain created");
        self.notify(&domain.id, LadderChange::DomainCreated);
        Ok(domain)
    }

    /// # Errors
    /// [`LadderError::DomainNotFound`] for an unknown domain.
    pub fn update_description(
        &self,
        id: &DomainId,
        description: &str,
    ) -> Result<Domain, LadderError> {
        self.db
            .transact(id, |partition| -> Result<Domain, LadderError> {
                partition.set_description(description.trim());
                Ok(partition.domain().clone())
            })
            .map_err(LadderError::normalize)
    }

    /// Removes a domain with its tiers and threshold history.
    ///
    /// # Errors
    /// [`LadderError::DomainInUse`] while candidates are enrolled.
    #[instrument(skip(self))]
    pub fn remove_domain(&self, id: &DomainId) -> Result<Domain, LadderError> {
        let domain = self.db.drop_domain(id).map_err(|err| LadderError::from(err).normalize())?;
        info!(domain = %id, "Domain removed");
        self.notify(id, LadderChange::DomainRemoved);
        Ok(domain)
    }

    #[must_use]
    pub fn list_domains(&self) -> Vec<Domain> {
        self.db.domains()
    }

    /// # Errors
    /// [`LadderError::DomainNotFound`] for an unknown domain.
    pub fn domain(&self, id: &DomainId) -> Result<Domain, LadderError> {
        self.read(id, |partition| partition.domain().clone())
    }

    #[must_use]
    pub fn find_domain(&self, name: &str) -> Option<DomainId> {
        self.db.find_domain(name)
    }

    // --- Tiers ---

    /// Appends the next tier to a domain's ladder.
    ///
    /// Levels grow one at a time from 1. The entry tier must be unbounded and bounded
    /// tiers need at least one slot. A new tier has no threshold until the next
    /// [`LadderService::publish_thresholds`].
    ///
    /// # Errors
    /// [`LadderError::InvalidRequest`] when any of the rules above is broken.
    #[instrument(skip(self, spec), fields(level = spec.level))]
    pub fn add_tier(&self, id: &DomainId, spec: TierSpec) -> Result<Tier, LadderError> {
        let level = TierLevel::new(spec.level).ok_or_else(|| {
            LadderError::invalid(format!("tier level {} is out of range", spec.level))
        })?;
        let name = validated_name(&spec.name, "tier name")?.to_owned();
        if level.is_entry() && spec.max_slots.is_some() {
            return Err(LadderError::invalid("the entry tier is always unbounded"));
        }
        if spec.max_slots == Some(0) {
            return Err(LadderError::invalid("a bounded tier needs at least one slot"));
        }
        let features = parse_features(&spec.features)?;

        let tier = self
            .db
            .transact(id, |partition| -> Result<Tier, LadderError> {
                let expected = partition.tiers().len() + 1;
                if usize::from(level.get()) != expected {
                    return Err(LadderError::invalid(format!(
                        "{} already has {} tiers; the next tier must be level {expected}",
                        partition.domain().name,
                        expected - 1
                    )));
                }

                let tier = Tier {
                    id: tier_id(id, level),
                    domain_id: id.clone(),
                    level,
                    name,
                    max_slots: spec.max_slots,
                    yearly_cost: spec.yearly_cost,
                    features,
                };
                partition.insert_tier(tier.clone())?;
                Ok(tier)
            })
            .map_err(LadderError::normalize)?;

        info!(domain = %id, tier = %tier.id, "Tier added");
        self.notify(id, LadderChange::TierAdded { level: level.get() });
        Ok(tier)
    }

    /// # Errors
    /// [`LadderError::DomainNotFound`] for an unknown domain.
    pub fn list_tiers(&self, id: &DomainId) -> Result<Vec<Tier>, LadderError> {
        self.read(id, |partition| partition.tiers().to_vec())
    }

    // --- Thresholds ---

    /// Checks a threshold proposal against the domain's tiers without storing anything.
    ///
    /// # Errors
    /// [`LadderError::InvalidLadder`] with every violation, or
    /// [`LadderError::InvalidRequest`] for levels the domain does not have.
    pub fn validate_proposal(
        &self,
        id: &DomainId,
        specs: &[ThresholdSpec],
    ) -> Result<(), LadderError> {
        let now = self.now();
        self.read(id, |partition| build_versions(partition, specs, now).map(|_| ()))?
    }

    /// Publishes a new threshold version for every tier named in `specs`.
    ///
    /// The proposal must form a complete ladder on its own: every tier either gets an
    /// active range or is explicitly withdrawn. Versions are appended; history is kept.
    ///
    /// # Errors
    /// [`LadderError::InvalidLadder`] for an incomplete proposal,
    /// [`LadderError::InvalidRequest`] when `effective_date` precedes the latest version.
    #[instrument(skip(self, specs), fields(tiers = specs.len()))]
    pub fn publish_thresholds(
        &self,
        id: &DomainId,
        specs: &[ThresholdSpec],
        effective_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<TierThreshold>, LadderError> {
        let effective_date = effective_date.unwrap_or_else(|| self.now());

        let versions = self
            .db
            .transact(id, |partition| -> Result<Vec<TierThreshold>, LadderError> {
                if let Some(latest) = partition.thresholds().iter().map(|t| t.effective_date).max()
                    && effective_date < latest
                {
                    return Err(LadderError::invalid(format!(
                        "effective date {effective_date} precedes the latest version ({latest})"
                    )));
                }

                let versions = build_versions(partition, specs, effective_date)?;
                partition.append_thresholds(versions.clone())?;
                Ok(versions)
            })
            .map_err(LadderError::normalize)?;

        info!(domain = %id, %effective_date, "Thresholds published");
        self.notify(id, LadderChange::ThresholdsPublished { effective_date });
        Ok(versions)
    }

    /// The ladder in force at `at` (defaults to now).
    ///
    /// # Errors
    /// [`LadderError::IncompleteLadder`] when the in-force thresholds do not form a ladder.
    pub fn active_ladder(
        &self,
        id: &DomainId,
        at: Option<DateTime<Utc>>,
    ) -> Result<ActiveLadder, LadderError> {
        let at = at.unwrap_or_else(|| self.now());
        self.read(id, |partition| ActiveLadder::resolve(partition, at))?
            .map_err(LadderError::incomplete)
    }

    /// Every stored version of one tier's threshold, oldest first.
    ///
    /// # Errors
    /// [`LadderError::InvalidRequest`] for a level the domain does not have.
    pub fn threshold_history(
        &self,
        id: &DomainId,
        level: u8,
    ) -> Result<Vec<ThresholdVersion>, LadderError> {
        let now = self.now();
        self.read(id, |partition| {
            let tier = TierLevel::new(level)
                .and_then(|level| partition.tier_at(level))
                .ok_or_else(|| {
                    LadderError::invalid(format!(
                        "{} has no tier at level {level}",
                        partition.domain().name
                    ))
                })?;
            let current = current_version(partition.thresholds(), &tier.id, now);

            Ok(partition
                .thresholds()
                .iter()
                .filter(|version| version.tier_id == tier.id)
                .map(|version| {
                    let state = if version.effective_date > now {
                        VersionState::Scheduled
                    } else if current.is_some_and(|c| std::ptr::eq(c, version)) {
                        if version.is_active {
                            VersionState::Current
                        } else {
                            VersionState::Disabled
                        }
                    } else {
                        VersionState::Superseded
                    };
                    ThresholdVersion { threshold: version.clone(), state }
                })
                .collect())
        })?
    }

    fn read<T>(
        &self,
        id: &DomainId,
        f: impl FnOnce(&DomainPartition) -> T,
    ) -> Result<T, LadderError> {
        self.db.read(id, f).map_err(|err| LadderError::from(err).normalize())
    }

    fn notify(&self, domain_id: &DomainId, change: LadderChange) {
        let event = LadderChanged { domain_id: domain_id.clone(), change, at: self.now() };
        if let Err(err) = self.events.publish(event) {
            warn!(error = %err, "Failed to publish ladder event");
        }
    }
}

/// Stable tier id: `tier:<domain key>-<level>`.
#[must_use]
pub fn tier_id(domain: &DomainId, level: TierLevel) -> TierId {
    let key = domain.as_str().split_once(':').map_or(domain.as_str(), |(_, key)| key);
    slug_id(&format!("{key}-{}", level.get()))
}

fn validated_name<'a>(name: &'a str, what: &str) -> Result<&'a str, LadderError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(LadderError::invalid(format!("{what} must be 1 to {MAX_NAME_LEN} characters")));
    }
    Ok(name)
}

fn parse_features(names: &[String]) -> Result<TierFeatures, LadderError> {
    if let Some(unknown) = names.iter().find(|name| TierFeatures::from(name.as_str()).is_empty()) {
        return Err(LadderError::invalid(format!("unknown tier feature '{unknown}'")));
    }
    Ok(TierFeatures::from_names(names.iter().map(String::as_str)))
}

/// Turns specs into threshold versions and validates them as a complete ladder.
fn build_versions(
    partition: &DomainPartition,
    specs: &[ThresholdSpec],
    effective_date: DateTime<Utc>,
) -> Result<Vec<TierThreshold>, LadderError> {
    let mut versions = Vec::with_capacity(specs.len());
    for spec in specs {
        let tier = TierLevel::new(spec.level)
            .and_then(|level| partition.tier_at(level))
            .ok_or_else(|| {
                LadderError::invalid(format!(
                    "{} has no tier at level {}",
                    partition.domain().name,
                    spec.level
                ))
            })?;
        if tier.level.is_entry() && !spec.is_active {
            return Err(LadderError::invalid("the entry tier cannot be withdrawn"));
        }
        versions.push(TierThreshold {
            domain_id: partition.domain().id.clone(),
            tier_id: tier.id.clone(),
            range: ScoreRange::new(spec.min_score, spec.max_score),
            is_active: spec.is_active,
            effective_date,
        });
    }

    let laddered: Vec<Tier> = partition
        .tiers()
        .iter()
        .filter(|tier| {
            !versions.iter().any(|version| version.tier_id == tier.id && !version.is_active)
        })
        .cloned()
        .collect();
    validate_ladder(&laddered, &versions).map_err(|err: LadderValidationError| {
        let context = Some(partition.domain().name.clone().into());
        LadderError::InvalidLadder { source: err, context }
    })?;

    Ok(versions)
}
