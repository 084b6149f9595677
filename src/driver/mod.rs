//! Database driver abstraction.
//!
//! Backends are an explicit capability: a [`Driver`] turns a DSN into a
//! live [`DriverConn`], and a [`DriverRegistry`] maps driver identifiers
//! to implementations. The registry is injected where a [`crate::Db`] is
//! configured; there is no process-global driver table.

pub mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DbError, Error, Result};
use crate::value::{Rows, Value};

/// Opaque handle to a statement prepared on a specific connection.
///
/// Handles are only valid for the connection that prepared them; the
/// connection manager discards them on disconnect.
#[derive(Debug, Clone)]
pub struct StatementHandle {
    query: Arc<str>,
}

impl StatementHandle {
    /// Builds a handle for the given query text.
    pub fn new(query: &str) -> Self {
        Self {
            query: Arc::from(query),
        }
    }

    /// The exact query text this handle was prepared from.
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// A database backend capable of opening connections.
pub trait Driver: Send + Sync {
    /// Identifier this driver is registered under (e.g. `"sqlite"`).
    fn name(&self) -> &'static str;

    /// Opens a connection to the database identified by `dsn`.
    ///
    /// DSN contents are opaque to the core; interpretation is entirely up
    /// to the driver.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the backend cannot be reached
    /// or the DSN is rejected.
    fn connect(&self, dsn: &str) -> Result<Box<dyn DriverConn>>;
}

/// A live connection to a database backend.
///
/// All methods are synchronous; serialization of calls is the connection
/// manager's job, not the driver's.
pub trait DriverConn: Send {
    /// Compiles `query` and retains the compiled form for re-execution.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Prepare`] if the statement does not compile.
    fn prepare(&mut self, query: &str) -> Result<StatementHandle>;

    /// Executes a prepared statement, discarding any produced rows.
    ///
    /// Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Execution`] on parameter or execution failure.
    fn execute(&mut self, stmt: &StatementHandle, args: &[Value]) -> Result<u64>;

    /// Executes a prepared statement and materializes its result set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Execution`] on parameter or execution failure.
    fn query(&mut self, stmt: &StatementHandle, args: &[Value]) -> Result<Rows>;

    /// Probes the backend catalog for a table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the catalog cannot be read.
    fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Closes the connection, releasing all retained statements.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the close fails.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Registry mapping driver identifiers to implementations.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in SQLite driver registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .drivers
            .insert("sqlite".to_string(), Arc::new(sqlite::SqliteDriver));
        registry
    }

    /// Registers a driver under its own name.
    ///
    /// # Errors
    ///
    /// Registering two drivers under the same identifier is a
    /// configuration fault and fails with [`Error::Config`].
    pub fn register(&mut self, driver: Arc<dyn Driver>) -> Result<()> {
        let name = driver.name();
        if self.drivers.contains_key(name) {
            return Err(Error::Config {
                message: format!("driver `{name}` is already registered"),
            });
        }
        self.drivers.insert(name.to_string(), driver);
        Ok(())
    }

    /// Resolves a driver by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownDriver`] if nothing is registered under
    /// `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers.get(name).cloned().ok_or_else(|| {
            DbError::UnknownDriver {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Registered driver identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
