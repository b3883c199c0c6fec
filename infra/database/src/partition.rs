use crate::error::DatabaseError;
use apex_domain::ids::{AttemptId, CandidateId, TierId};
use apex_domain::ladder::{Domain, Tier, TierLevel, TierThreshold};
use apex_domain::performance::{CandidateDomainPerformance, ExamAttempt};
use fxhash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Committed attempt history. Staged copies share it and never clone it.
#[derive(Debug, Clone, Default)]
struct AttemptLog {
    entries: Vec<ExamAttempt>,
    /// Every id ever recorded, including those of purged candidates.
    ids: FxHashSet<AttemptId>,
}

/// Everything stored for one skill domain.
///
/// A partition is only ever mutated through [`crate::Database::transact`], which hands
/// out a staged copy and swaps it in on success. Attempts recorded or purged on the
/// staged copy are buffered and reach the shared log only after the swap.
#[derive(Debug, Clone)]
pub struct DomainPartition {
    domain: Domain,
    tiers: Vec<Tier>,
    thresholds: Vec<TierThreshold>,
    performances: FxHashMap<CandidateId, CandidateDomainPerformance>,
    log: Arc<AttemptLog>,
    staged_attempts: Vec<ExamAttempt>,
    staged_ids: FxHashSet<AttemptId>,
    purged: FxHashSet<CandidateId>,
    pub(crate) retired: bool,
}

impl DomainPartition {
    pub(crate) fn new(domain: Domain) -> Self {
        Self {
            domain,
            tiers: Vec::new(),
            thresholds: Vec::new(),
            performances: FxHashMap::default(),
            log: Arc::default(),
            staged_attempts: Vec::new(),
            staged_ids: FxHashSet::default(),
            purged: FxHashSet::default(),
            retired: false,
        }
    }

    #[must_use]
    pub const fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.domain.description = description.into();
    }

    // --- Tiers ---

    /// Tiers ordered by level.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    #[must_use]
    pub fn tier(&self, id: &TierId) -> Option<&Tier> {
        self.tiers.iter().find(|tier| &tier.id == id)
    }

    #[must_use]
    pub fn tier_at(&self, level: TierLevel) -> Option<&Tier> {
        self.tiers.iter().find(|tier| tier.level == level)
    }

    /// # Errors
    /// [`DatabaseError::Conflict`] when the id or level is taken,
    /// [`DatabaseError::Validation`] when the tier belongs to another domain.
    pub fn insert_tier(&mut self, tier: Tier) -> Result<(), DatabaseError> {
        if tier.domain_id != self.domain.id {
            return Err(DatabaseError::validation(format!(
                "tier {} belongs to {}, not {}",
                tier.id, tier.domain_id, self.domain.id
            )));
        }
        if self.tier(&tier.id).is_some() || self.tier_at(tier.level).is_some() {
            return Err(DatabaseError::conflict(format!(
                "{} ({}) already exists in {}",
                tier.level, tier.id, self.domain.name
            )));
        }

        let at = self.tiers.partition_point(|existing| existing.level < tier.level);
        self.tiers.insert(at, tier);
        Ok(())
    }

    /// # Errors
    /// [`DatabaseError::NotFound`] for an unknown tier.
    pub fn set_tier_capacity(
        &mut self,
        id: &TierId,
        max_slots: Option<u32>,
    ) -> Result<&Tier, DatabaseError> {
        let tier = self
            .tiers
            .iter_mut()
            .find(|tier| &tier.id == id)
            .ok_or_else(|| DatabaseError::not_found(format!("tier {id}")))?;
        tier.max_slots = max_slots;
        Ok(tier)
    }

    // --- Thresholds ---

    /// Every threshold version ever published, oldest first.
    #[must_use]
    pub fn thresholds(&self) -> &[TierThreshold] {
        &self.thresholds
    }

    /// Appends threshold versions; existing versions are never rewritten.
    ///
    /// # Errors
    /// [`DatabaseError::Validation`] when a version references a tier outside this domain.
    pub fn append_thresholds(
        &mut self,
        versions: impl IntoIterator<Item = TierThreshold>,
    ) -> Result<(), DatabaseError> {
        let versions: Vec<_> = versions.into_iter().collect();
        if let Some(orphan) = versions.iter().find(|v| self.tier(&v.tier_id).is_none()) {
            return Err(DatabaseError::validation(format!(
                "threshold references unknown tier {} in {}",
                orphan.tier_id, self.domain.name
            )));
        }
        self.thresholds.extend(versions);
        Ok(())
    }

    // --- Performances ---

    #[must_use]
    pub fn performance(&self, candidate: &CandidateId) -> Option<&CandidateDomainPerformance> {
        self.performances.get(candidate)
    }

    pub fn performance_mut(
        &mut self,
        candidate: &CandidateId,
    ) -> Option<&mut CandidateDomainPerformance> {
        self.performances.get_mut(candidate)
    }

    pub fn performances(&self) -> impl Iterator<Item = &CandidateDomainPerformance> {
        self.performances.values()
    }

    #[must_use]
    pub fn enrolled_count(&self) -> usize {
        self.performances.len()
    }

    /// Occupancy is derived from the rows, never stored.
    #[must_use]
    pub fn active_count(&self, tier: &TierId) -> usize {
        self.performances
            .values()
            .filter(|p| &p.current_tier_id == tier && p.status.occupies_slot())
            .count()
    }

    /// # Errors
    /// [`DatabaseError::Conflict`] when the candidate already has a row here.
    pub fn insert_performance(
        &mut self,
        performance: CandidateDomainPerformance,
    ) -> Result<(), DatabaseError> {
        if self.performances.contains_key(&performance.candidate_id) {
            return Err(DatabaseError::conflict(format!(
                "{} is already enrolled in {}",
                performance.candidate_id, self.domain.name
            )));
        }
        if self.tier(&performance.current_tier_id).is_none() {
            return Err(DatabaseError::validation(format!(
                "unknown tier {}",
                performance.current_tier_id
            )));
        }
        self.performances.insert(performance.candidate_id.clone(), performance);
        Ok(())
    }

    pub fn remove_performance(
        &mut self,
        candidate: &CandidateId,
    ) -> Option<CandidateDomainPerformance> {
        self.performances.remove(candidate)
    }

    // --- Attempts ---

    #[must_use]
    pub fn has_attempt(&self, id: &AttemptId) -> bool {
        self.log.ids.contains(id) || self.staged_ids.contains(id)
    }

    /// Appends an attempt; the log is insert-only.
    ///
    /// # Errors
    /// [`DatabaseError::Conflict`] when the attempt id was already recorded.
    pub fn record_attempt(&mut self, attempt: ExamAttempt) -> Result<(), DatabaseError> {
        if self.has_attempt(&attempt.attempt_id) {
            return Err(DatabaseError::conflict(format!("attempt {}", attempt.attempt_id)));
        }
        self.staged_ids.insert(attempt.attempt_id.clone());
        self.staged_attempts.push(attempt);
        Ok(())
    }

    /// A candidate's attempts in recording order.
    pub fn attempts_of<'a>(
        &'a self,
        candidate: &'a CandidateId,
    ) -> impl Iterator<Item = &'a ExamAttempt> + 'a {
        let committed =
            if self.purged.contains(candidate) { &[][..] } else { self.log.entries.as_slice() };
        committed
            .iter()
            .chain(&self.staged_attempts)
            .filter(move |a| &a.candidate_id == candidate)
    }

    /// Forgets a candidate's attempts and returns how many there were. Their ids stay
    /// recorded, so replaying one of them is still a conflict.
    pub fn remove_attempts_of(&mut self, candidate: &CandidateId) -> usize {
        let removed = self.attempts_of(candidate).count();
        self.staged_attempts.retain(|a| &a.candidate_id != candidate);
        self.purged.insert(candidate.clone());
        removed
    }

    #[must_use]
    pub fn attempt_count(&self) -> usize {
        let committed = if self.purged.is_empty() {
            self.log.entries.len()
        } else {
            self.log.entries.iter().filter(|a| !self.purged.contains(&a.candidate_id)).count()
        };
        committed + self.staged_attempts.len()
    }

    /// Folds buffered attempts and purges into the log. Called on the stored partition
    /// right after a staged copy replaced it, when the log is no longer shared.
    pub(crate) fn commit_attempts(&mut self) {
        if self.staged_attempts.is_empty() && self.purged.is_empty() {
            return;
        }

        let log = Arc::make_mut(&mut self.log);
        if !self.purged.is_empty() {
            log.entries.retain(|a| !self.purged.contains(&a.candidate_id));
            self.purged.clear();
        }
        log.ids.extend(self.staged_ids.drain());
        log.entries.append(&mut self.staged_attempts);
    }
}
