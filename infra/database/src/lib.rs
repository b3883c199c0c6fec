//! # Database Infrastructure
//!
//! In-memory storage for the placement engine, partitioned per skill domain.
//!
//! ## Key Features
//! - **Partition Isolation**: every domain owns a [`DomainPartition`] behind its own lock, so
//!   writes to different domains never contend.
//! - **Staged Transactions**: [`Database::transact`] runs a closure against a copy of the
//!   partition and publishes it only when the closure succeeds. The attempt history is
//!   shared with the copy, not duplicated.
//! - **Seed Migrations**: [`MigrationRunner`] applies versioned, checksummed seed scripts once.
//!
//! ## Example
//!
//! ```rust
//! use apex_database::{Database, DatabaseError};
//! use apex_domain::ids::DomainId;
//! use apex_domain::ladder::Domain;
//!
//! # fn main() -> Result<(), DatabaseError> {
//! let db = Database::builder().namespace("apex").init()?;
//! db.create_domain(Domain {
//!     id: DomainId::new("domain:dsa"),
//!     name: "DSA".into(),
//!     description: "Data structures and algorithms".into(),
//!     created_at: chrono::Utc::now(),
//! })?;
//!
//! let name = db.read(&DomainId::new("domain:dsa"), |p| p.domain().name.clone())?;
//! assert_eq!(name, "DSA");
//! # Ok(())
//! # }
//! ```

mod error;
mod migrations;
mod partition;

pub use error::{DatabaseError, DatabaseErrorExt};
pub use migrations::{AppliedMigration, Migration, MigrationReport, MigrationRunner, checksum};
pub use partition::DomainPartition;

use apex_domain::ids::{CandidateId, DomainId};
use apex_domain::ladder::Domain;
use apex_domain::performance::Candidate;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, instrument};

type PartitionHandle = Arc<Mutex<DomainPartition>>;

#[derive(Debug, Default)]
struct Catalog {
    partitions: FxHashMap<DomainId, PartitionHandle>,
    names: FxHashMap<String, DomainId>,
}

#[derive(Debug, Default)]
struct Registry {
    candidates: FxHashMap<CandidateId, Candidate>,
    /// Withdrawal started; hidden from lookups and refused by enrollment.
    withdrawing: FxHashSet<CandidateId>,
}

impl Registry {
    fn live(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.get(id).filter(|_| !self.withdrawing.contains(id))
    }
}

/// Inner state of the [`Database`] wrapper.
///
/// Lock order is partition, then candidates. The catalog lock is never held while a
/// partition is locked.
#[derive(Debug)]
pub struct DatabaseInner {
    namespace: String,
    catalog: RwLock<Catalog>,
    candidates: RwLock<Registry>,
    migrations: Mutex<FxHashMap<String, AppliedMigration>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        info!(namespace = %self.namespace, "Database handle dropped");
    }
}

/// Cheaply cloneable handle to the store.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

#[must_use = "builders do nothing unless you call .init()"]
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    namespace: Option<String>,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// # Errors
    /// [`DatabaseError::Validation`] when the namespace is missing or blank.
    #[instrument(skip(self), fields(namespace = self.namespace))]
    pub fn init(self) -> Result<Database, DatabaseError> {
        let namespace = self
            .namespace
            .filter(|ns| !ns.trim().is_empty())
            .ok_or_else(|| DatabaseError::validation("Namespace is required"))?;

        info!(%namespace, "In-memory store initialized");

        Ok(Database {
            inner: Arc::new(DatabaseInner {
                namespace,
                catalog: RwLock::new(Catalog::default()),
                candidates: RwLock::new(Registry::default()),
                migrations: Mutex::new(FxHashMap::default()),
            }),
        })
    }
}

impl Database {
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    // --- Domains ---

    /// Registers a domain with an empty partition.
    ///
    /// # Errors
    /// [`DatabaseError::Conflict`] when the id or the case-insensitive name is taken.
    pub fn create_domain(&self, domain: Domain) -> Result<(), DatabaseError> {
        let name_key = normalize_name(&domain.name);
        let mut catalog = self.inner.catalog.write();

        if catalog.partitions.contains_key(&domain.id) {
            return Err(DatabaseError::conflict(format!("domain {} already exists", domain.id)));
        }
        if catalog.names.contains_key(&name_key) {
            return Err(DatabaseError::conflict(format!(
                "a domain named '{}' already exists",
                domain.name
            )));
        }

        debug!(domain = %domain.id, name = %domain.name, "Creating domain partition");
        catalog.names.insert(name_key, domain.id.clone());
        catalog
            .partitions
            .insert(domain.id.clone(), Arc::new(Mutex::new(DomainPartition::new(domain))));
        Ok(())
    }

    /// Removes a domain that has no enrolled candidates.
    ///
    /// # Errors
    /// [`DatabaseError::NotFound`] for an unknown domain, [`DatabaseError::Constraint`]
    /// while performance rows still reference it.
    pub fn drop_domain(&self, id: &DomainId) -> Result<Domain, DatabaseError> {
        let handle = self.partition(id)?;
        let domain = {
            let mut partition = handle.lock();
            if partition.retired {
                return Err(unknown_domain(id));
            }
            if partition.enrolled_count() > 0 {
                return Err(DatabaseError::Constraint {
                    message: format!(
                        "{} candidates are still enrolled in {}",
                        partition.enrolled_count(),
                        partition.domain().name
                    )
                    .into(),
                    context: None,
                });
            }
            partition.retired = true;
            partition.domain().clone()
        };

        let mut catalog = self.inner.catalog.write();
        catalog.partitions.remove(id);
        catalog.names.remove(&normalize_name(&domain.name));
        Ok(domain)
    }

    /// All live domains, ordered by name.
    #[must_use]
    pub fn domains(&self) -> Vec<Domain> {
        let handles: Vec<_> = self.inner.catalog.read().partitions.values().cloned().collect();
        let mut domains: Vec<_> = handles
            .iter()
            .filter_map(|handle| {
                let partition = handle.lock();
                (!partition.retired).then(|| partition.domain().clone())
            })
            .collect();
        domains.sort_by(|a, b| a.name.cmp(&b.name));
        domains
    }

    #[must_use]
    pub fn domain_ids(&self) -> Vec<DomainId> {
        self.inner.catalog.read().partitions.keys().cloned().collect()
    }

    #[must_use]
    pub fn find_domain(&self, name: &str) -> Option<DomainId> {
        self.inner.catalog.read().names.get(&normalize_name(name)).cloned()
    }

    // --- Partition access ---

    /// Runs `f` against a staged copy of the domain partition, holding the partition lock.
    /// The copy replaces the stored partition only when `f` returns `Ok`; on `Err` nothing
    /// changes.
    ///
    /// Candidate registry reads are allowed inside `f`. Catalog operations are not.
    ///
    /// # Errors
    /// [`DatabaseError::NotFound`] for an unknown domain, otherwise whatever `f` returns.
    pub fn transact<T, E, F>(&self, id: &DomainId, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut DomainPartition) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let handle = self.partition(id)?;
        let mut partition = handle.lock();
        if partition.retired {
            return Err(unknown_domain(id).into());
        }

        let mut staged = partition.clone();
        let value = f(&mut staged)?;
        *partition = staged;
        partition.commit_attempts();
        Ok(value)
    }

    /// Runs `f` against the partition without staging.
    ///
    /// # Errors
    /// [`DatabaseError::NotFound`] for an unknown domain.
    pub fn read<T>(
        &self,
        id: &DomainId,
        f: impl FnOnce(&DomainPartition) -> T,
    ) -> Result<T, DatabaseError> {
        let handle = self.partition(id)?;
        let partition = handle.lock();
        if partition.retired {
            return Err(unknown_domain(id));
        }
        Ok(f(&partition))
    }

    fn partition(&self, id: &DomainId) -> Result<PartitionHandle, DatabaseError> {
        self.inner.catalog.read().partitions.get(id).cloned().ok_or_else(|| unknown_domain(id))
    }

    // --- Candidates ---

    /// # Errors
    /// [`DatabaseError::Conflict`] when the id is already registered.
    pub fn insert_candidate(&self, candidate: Candidate) -> Result<(), DatabaseError> {
        let mut registry = self.inner.candidates.write();
        if registry.candidates.contains_key(&candidate.id) {
            return Err(DatabaseError::conflict(format!(
                "candidate {} already registered",
                candidate.id
            )));
        }
        registry.candidates.insert(candidate.id.clone(), candidate);
        Ok(())
    }

    /// A registered candidate whose withdrawal has not started.
    #[must_use]
    pub fn candidate(&self, id: &CandidateId) -> Option<Candidate> {
        self.inner.candidates.read().live(id).cloned()
    }

    #[must_use]
    pub fn contains_candidate(&self, id: &CandidateId) -> bool {
        self.inner.candidates.read().live(id).is_some()
    }

    /// Marks a registered candidate as withdrawing; from now on [`Self::candidate`] and
    /// [`Self::contains_candidate`] no longer see them. Marking twice is allowed so an
    /// interrupted withdrawal can be resumed.
    pub fn begin_withdrawal(&self, id: &CandidateId) -> Option<Candidate> {
        let mut registry = self.inner.candidates.write();
        let candidate = registry.candidates.get(id).cloned()?;
        registry.withdrawing.insert(id.clone());
        Some(candidate)
    }

    pub fn remove_candidate(&self, id: &CandidateId) -> Option<Candidate> {
        let mut registry = self.inner.candidates.write();
        registry.withdrawing.remove(id);
        registry.candidates.remove(id)
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.inner.candidates.read().candidates.len()
    }

    // --- Migrations ---

    /// Ledger entries ordered by key.
    #[must_use]
    pub fn applied_migrations(&self) -> Vec<AppliedMigration> {
        let mut applied: Vec<_> = self.inner.migrations.lock().values().cloned().collect();
        applied.sort_by_key(AppliedMigration::key);
        applied
    }

    #[must_use]
    pub fn migrations(&self) -> MigrationRunner<'_> {
        MigrationRunner::new(self)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn unknown_domain(id: &DomainId) -> DatabaseError {
    DatabaseError::not_found(format!("domain {id}"))
}
