use crate::Database;
use crate::error::{DatabaseError, DatabaseErrorExt};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

/// A versioned seed script owned by one feature slice.
#[derive(Debug, Clone)]
pub struct Migration {
    slice_key: Cow<'static, str>,
    version: Cow<'static, str>,
    script: Cow<'static, str>,
    checksum: String,
}

impl Migration {
    #[must_use]
    pub fn new(
        slice_key: impl Into<Cow<'static, str>>,
        version: impl Into<Cow<'static, str>>,
        script: impl Into<Cow<'static, str>>,
    ) -> Self {
        let script = script.into();
        let checksum = checksum(&script);
        Self { slice_key: slice_key.into(), version: version.into(), script, checksum }
    }

    /// Loads every `*.toml` file in `dir` as a migration of `slice_key`.
    /// The file stem is the version, so files apply in lexical order.
    ///
    /// # Errors
    /// [`DatabaseError::Io`] when the directory or a file cannot be read.
    pub fn load_dir(
        slice_key: &'static str,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<Self>, DatabaseError> {
        let dir = dir.as_ref();
        let mut migrations = Vec::new();

        for entry in std::fs::read_dir(dir).context(dir.display().to_string())? {
            let path = entry.context(dir.display().to_string())?.path();
            if path.extension().is_none_or(|ext| ext != "toml") {
                continue;
            }
            let Some(version) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let script = std::fs::read_to_string(&path).context(path.display().to_string())?;
            migrations.push(Self::new(slice_key, version.to_owned(), script));
        }

        migrations.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(migrations)
    }

    #[must_use]
    pub fn slice_key(&self) -> &str {
        &self.slice_key
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    #[must_use]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.slice_key, self.version)
    }

    fn to_applied(&self, applied_at: DateTime<Utc>) -> AppliedMigration {
        AppliedMigration {
            slice_key: self.slice_key.to_string(),
            version: self.version.to_string(),
            checksum: self.checksum.clone(),
            applied_at,
        }
    }
}

/// Hex encoded SHA-256 of a migration script.
#[must_use]
pub fn checksum(script: &str) -> String {
    hex::encode(Sha256::digest(script.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub slice_key: String,
    pub version: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.slice_key, self.version)
    }
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Applies seed migrations once per database, recording each in the ledger.
#[derive(Debug)]
pub struct MigrationRunner<'a> {
    db: &'a Database,
}

impl<'a> MigrationRunner<'a> {
    #[must_use]
    pub const fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Runs `apply` for every migration not yet in the ledger, in `(slice, version)` order.
    ///
    /// The ledger stays locked for the whole run, so concurrent runners serialize. A
    /// migration is recorded only after `apply` returns `Ok`.
    ///
    /// # Errors
    /// [`DatabaseError::Migration`] for duplicate keys or a checksum that no longer matches
    /// the recorded one, or whatever `apply` returns.
    pub fn run<E, F>(
        &self,
        mut migrations: Vec<Migration>,
        mut apply: F,
    ) -> Result<MigrationReport, E>
    where
        F: FnMut(&Migration) -> Result<(), E>,
        E: From<DatabaseError>,
    {
        migrations.sort_by(|a, b| {
            let left = (a.slice_key.as_ref(), a.version.as_ref());
            left.cmp(&(b.slice_key.as_ref(), b.version.as_ref()))
        });
        if let Some(pair) = migrations.windows(2).find(|w| w[0].key() == w[1].key()) {
            return Err(DatabaseError::Migration {
                message: format!("duplicate migration {}", pair[0].key()).into(),
                context: None,
            }
            .into());
        }

        let mut ledger = self.db.inner.migrations.lock();
        let mut report = MigrationReport::default();

        for migration in &migrations {
            let key = migration.key();
            if let Some(applied) = ledger.get(&key) {
                ensure_checksum_match(migration, &applied.checksum)?;
                debug!(migration = %key, "Skipping migration");
                report.skipped.push(key);
                continue;
            }

            apply(migration)?;
            ledger.insert(key.clone(), migration.to_applied(Utc::now()));
            info!(migration = %key, "Applied migration");
            report.applied.push(key);
        }

        Ok(report)
    }
}

fn ensure_checksum_match(migration: &Migration, recorded: &str) -> Result<(), DatabaseError> {
    if migration.checksum == recorded {
        return Ok(());
    }
    Err(DatabaseError::Migration {
        message: format!(
            "checksum mismatch: recorded {recorded}, found {}",
            migration.checksum
        )
        .into(),
        context: Some(migration.key().into()),
    })
}
