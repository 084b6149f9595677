//! Schema versioning and migrations.
//!
//! A [`Schema`] is a registry of versioned migration steps; migrating
//! walks every step newer than the database's persisted version, in
//! ascending order, recording progress in the `schema_info` table after
//! each success. Metadata persistence goes through the same
//! exec/query/count primitives the connection manager exposes, so the
//! engine carries no backend-specific SQL beyond ANSI DDL/DML.

use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::info;

use crate::db::Db;
use crate::error::{Result, SchemaError};
use crate::value::Value;

/// Name of the metadata table holding the current schema version.
pub const SCHEMA_TABLE: &str = "schema_info";

const CREATE_SCHEMA_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS schema_info (version INTEGER NOT NULL)";
const SELECT_VERSION: &str = "SELECT version FROM schema_info";
const INSERT_VERSION: &str = "INSERT INTO schema_info (version) VALUES (?)";
const UPDATE_VERSION: &str = "UPDATE schema_info SET version = ?";

/// Migration target version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Apply every registered step newer than the current version.
    Latest,
    /// Apply steps up to and including this version.
    Version(u32),
}

/// A migration procedure, run against the connection being migrated.
type MigrationFn = Box<dyn Fn(&Db) -> Result<()> + Send + Sync>;

/// Registry of versioned migration steps.
///
/// Steps may be registered in any order; they are applied in ascending
/// version order. Versions start at 1 and must be unique.
#[derive(Default)]
pub struct Schema {
    steps: BTreeMap<u32, MigrationFn>,
}

impl Schema {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration step.
    ///
    /// # Errors
    ///
    /// [`SchemaError::InvalidVersion`] for version 0,
    /// [`SchemaError::DuplicateVersion`] when the version is taken.
    pub fn version<F>(&mut self, version: u32, step: F) -> Result<()>
    where
        F: Fn(&Db) -> Result<()> + Send + Sync + 'static,
    {
        if version == 0 {
            return Err(SchemaError::InvalidVersion.into());
        }
        if self.steps.contains_key(&version) {
            return Err(SchemaError::DuplicateVersion { version }.into());
        }
        self.steps.insert(version, Box::new(step));
        Ok(())
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The highest registered version, if any.
    pub fn latest(&self) -> Option<u32> {
        self.steps.keys().next_back().copied()
    }

    /// Reads the database's persisted schema version.
    ///
    /// A database without a `schema_info` table is uninitialized, which
    /// is version 0 and not an error.
    ///
    /// # Errors
    ///
    /// [`crate::DbError::NotConnected`] when the manager holds no live
    /// connection; connection-level errors from reading the metadata.
    pub fn current(&self, db: &Db) -> Result<u32> {
        if !db.table_exists(SCHEMA_TABLE)? {
            return Ok(0);
        }
        let mut rows = db.query(SELECT_VERSION, &[])?;
        match rows.next() {
            Some(row) => row.get(0),
            None => Ok(0),
        }
    }

    /// Brings the database to `target`, applying pending steps in
    /// ascending version order.
    ///
    /// The persisted version is updated after each successful step, so
    /// partial progress survives a later failure. A failing step stops
    /// migration immediately; its own side effects are not rolled back.
    /// Migrating to a target at or below the current version applies
    /// nothing; an explicit target below the current version is a
    /// downgrade and is rejected.
    ///
    /// # Errors
    ///
    /// Whatever [`current`](Self::current) fails with;
    /// [`SchemaError::Downgrade`] for a target below the current version;
    /// [`SchemaError::Step`] when a migration procedure fails.
    pub fn migrate(&self, db: &Db, target: Target) -> Result<()> {
        let current = self.current(db)?;
        if let Target::Version(t) = target {
            if t < current {
                return Err(SchemaError::Downgrade { current, target: t }.into());
            }
        }

        db.exec(CREATE_SCHEMA_TABLE, &[])?;
        if db.count(SELECT_VERSION, &[])? == 0 {
            db.exec(INSERT_VERSION, &[Value::from(current)])?;
        }

        let upper = match target {
            Target::Latest => Bound::Unbounded,
            Target::Version(t) => Bound::Included(t),
        };
        for (&version, step) in self.steps.range((Bound::Excluded(current), upper)) {
            info!(version, "applying migration");
            step(db).map_err(|e| SchemaError::Step {
                version,
                source: Box::new(e),
            })?;
            db.exec(UPDATE_VERSION, &[Value::from(version)])?;
        }

        Ok(())
    }
}
