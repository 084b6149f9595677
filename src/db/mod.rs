//! Connection management.
//!
//! [`Db`] is the single point of access to one live database connection.
//! It serializes statement execution through an exclusive lock and caches
//! prepared statements by exact query text. Configuration (driver + DSN)
//! is immutable once set; connection state is not shared between copies.

pub mod cache;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::driver::{Driver, DriverConn, DriverRegistry, StatementHandle};
use crate::error::{DbError, Result};
use crate::value::{Rows, Value};

pub use cache::StatementCache;

/// Connection manager: one driver, one DSN, at most one live connection.
///
/// All statement execution goes through an exclusive lock held for the
/// duration of cache lookup, preparation, and dispatch. The lock is
/// released before a query's [`Rows`] are consumed, so cursor iteration
/// interleaves freely with other calls on the same manager.
pub struct Db {
    driver: Arc<dyn Driver>,
    dsn: String,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    conn: Option<Box<dyn DriverConn>>,
    cache: StatementCache,
}

impl Inner {
    /// Returns the cached prepared statement for `query`, preparing and
    /// caching it on a miss. Only called with the exclusive lock held.
    fn statement(&mut self, query: &str) -> Result<StatementHandle> {
        let conn = self.conn.as_mut().ok_or(DbError::NotConnected)?;
        if let Some(handle) = self.cache.get(query) {
            return Ok(handle.clone());
        }

        debug!(query, "preparing statement");
        let handle = conn.prepare(query)?;
        self.cache.insert(handle.clone());
        Ok(handle)
    }
}

impl Db {
    /// Configures a manager with an already-resolved driver.
    ///
    /// No I/O happens until [`connect`](Self::connect).
    pub fn new(driver: Arc<dyn Driver>, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Configures a manager by resolving `driver` through a registry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownDriver`] if the identifier is not
    /// registered.
    pub fn open(registry: &DriverRegistry, driver: &str, dsn: impl Into<String>) -> Result<Self> {
        Ok(Self::new(registry.resolve(driver)?, dsn))
    }

    /// The identifier of the configured driver.
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// The configured DSN, opaque to this layer.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Returns a new manager with the same driver and DSN, disconnected
    /// and with an empty statement cache.
    pub fn copy(&self) -> Self {
        Self::new(Arc::clone(&self.driver), self.dsn.clone())
    }

    /// True iff a live connection is held.
    pub fn connected(&self) -> bool {
        self.lock().conn.is_some()
    }

    /// Opens the underlying connection.
    ///
    /// A no-op when already connected (the statement cache survives only
    /// this never-disconnected path).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the driver cannot open the
    /// DSN; no connection is held afterwards.
    pub fn connect(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.conn.is_some() {
            return Ok(());
        }

        let conn = self.driver.connect(&self.dsn)?;
        debug!(driver = self.driver.name(), "connected");
        inner.conn = Some(conn);
        Ok(())
    }

    /// Closes the live connection and clears the statement cache.
    ///
    /// A trivial success when already disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] if the close fails; the handle
    /// and cache are gone either way and the manager must not be reused
    /// after a failed close.
    pub fn disconnect(&self) -> Result<()> {
        let mut inner = self.lock();
        if let Some(conn) = inner.conn.take() {
            // Cache entries are only valid for the connection being
            // closed; drop them before anything can fail.
            inner.cache.clear();
            conn.close()?;
            debug!("disconnected");
        }
        Ok(())
    }

    /// Executes a non-result statement (INSERT, UPDATE, DELETE, DDL)
    /// with positional parameters.
    ///
    /// # Errors
    ///
    /// [`DbError::NotConnected`] without a live connection,
    /// [`DbError::Prepare`] if the statement does not compile,
    /// [`DbError::Execution`] if it fails to run.
    pub fn exec(&self, query: &str, args: &[Value]) -> Result<()> {
        let mut inner = self.lock();
        let stmt = inner.statement(query)?;
        debug!(query, params = args.len(), "exec");

        let conn = inner.conn.as_mut().ok_or(DbError::NotConnected)?;
        conn.execute(&stmt, args)?;
        Ok(())
    }

    /// Executes a result-producing statement and returns its rows.
    ///
    /// The exclusive lock covers lookup, preparation, and dispatch only;
    /// the returned cursor is an owned snapshot consumed without the
    /// lock. The caller owns it and drops it to release the results.
    ///
    /// # Errors
    ///
    /// Same error kinds as [`exec`](Self::exec).
    pub fn query(&self, query: &str, args: &[Value]) -> Result<Rows> {
        let mut inner = self.lock();
        let stmt = inner.statement(query)?;
        debug!(query, params = args.len(), "query");

        let conn = inner.conn.as_mut().ok_or(DbError::NotConnected)?;
        conn.query(&stmt, args)
    }

    /// Runs a query and returns how many rows it produced, discarding
    /// them.
    ///
    /// # Errors
    ///
    /// Whatever [`query`](Self::query) fails with.
    pub fn count(&self, query: &str, args: &[Value]) -> Result<u64> {
        let rows = self.query(query, args)?;
        let mut n: u64 = 0;
        for _row in rows {
            n += 1;
        }
        Ok(n)
    }

    /// Probes the backend catalog for a table.
    ///
    /// # Errors
    ///
    /// [`DbError::NotConnected`] without a live connection,
    /// [`DbError::Connection`] if the catalog cannot be read.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let mut inner = self.lock();
        let conn = inner.conn.as_mut().ok_or(DbError::NotConnected)?;
        conn.table_exists(table)
    }

    /// Number of statements currently cached. Exposed for observability;
    /// the cache itself is a performance optimization, not behavior.
    pub fn cached_statements(&self) -> usize {
        self.lock().cache.len()
    }

    // A poisoned lock means a panic mid-operation; the manager state is
    // still structurally sound, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::value::Row;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Instrumented driver for exercising cache and failure paths.
    #[derive(Default)]
    struct MockDriver {
        fail_connect: bool,
        fail_close: bool,
        prepares: Arc<AtomicUsize>,
        executes: Arc<AtomicUsize>,
    }

    struct MockConn {
        fail_close: bool,
        prepares: Arc<AtomicUsize>,
        executes: Arc<AtomicUsize>,
    }

    impl Driver for MockDriver {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn connect(&self, _dsn: &str) -> Result<Box<dyn DriverConn>> {
            if self.fail_connect {
                return Err(DbError::Connection("mock refused".to_string()).into());
            }
            Ok(Box::new(MockConn {
                fail_close: self.fail_close,
                prepares: Arc::clone(&self.prepares),
                executes: Arc::clone(&self.executes),
            }))
        }
    }

    impl DriverConn for MockConn {
        fn prepare(&mut self, query: &str) -> Result<StatementHandle> {
            if query.starts_with("BAD") {
                return Err(DbError::Prepare {
                    query: query.to_string(),
                    reason: "mock syntax error".to_string(),
                }
                .into());
            }
            self.prepares.fetch_add(1, Ordering::SeqCst);
            Ok(StatementHandle::new(query))
        }

        fn execute(&mut self, _stmt: &StatementHandle, _args: &[Value]) -> Result<u64> {
            self.executes.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }

        fn query(&mut self, stmt: &StatementHandle, _args: &[Value]) -> Result<Rows> {
            self.executes.fetch_add(1, Ordering::SeqCst);
            Ok(Rows::new(
                vec!["q".to_string()],
                vec![Row::new(vec![Value::from(stmt.query())])],
            ))
        }

        fn table_exists(&mut self, _table: &str) -> Result<bool> {
            Ok(false)
        }

        fn close(self: Box<Self>) -> Result<()> {
            if self.fail_close {
                return Err(DbError::Connection("mock close failed".to_string()).into());
            }
            Ok(())
        }
    }

    fn mock_db(driver: MockDriver) -> Db {
        Db::new(Arc::new(driver), "mock://test")
    }

    #[test]
    fn test_exec_before_connect_fails() {
        let db = mock_db(MockDriver::default());
        let err = db.exec("INSERT INTO t VALUES (1)", &[]).unwrap_err();
        assert!(matches!(err, Error::Db(DbError::NotConnected)));

        let err = db.query("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err, Error::Db(DbError::NotConnected)));
    }

    #[test]
    fn test_connect_and_disconnect() {
        let db = mock_db(MockDriver::default());
        assert!(!db.connected());

        db.connect().unwrap();
        assert!(db.connected());

        db.disconnect().unwrap();
        assert!(!db.connected());

        // Disconnecting again is a trivial success.
        db.disconnect().unwrap();
    }

    #[test]
    fn test_connect_failure_holds_no_connection() {
        let db = mock_db(MockDriver {
            fail_connect: true,
            ..MockDriver::default()
        });

        let err = db.connect().unwrap_err();
        assert!(matches!(err, Error::Db(DbError::Connection(_))));
        assert!(!db.connected());
    }

    #[test]
    fn test_close_failure_still_clears_state() {
        let db = mock_db(MockDriver {
            fail_close: true,
            ..MockDriver::default()
        });
        db.connect().unwrap();
        db.exec("INSERT INTO t VALUES (1)", &[]).unwrap();
        assert_eq!(db.cached_statements(), 1);

        let err = db.disconnect().unwrap_err();
        assert!(matches!(err, Error::Db(DbError::Connection(_))));
        assert!(!db.connected());
        assert_eq!(db.cached_statements(), 0);
    }

    #[test]
    fn test_statement_prepared_once_per_query_text() {
        let prepares = Arc::new(AtomicUsize::new(0));
        let db = mock_db(MockDriver {
            prepares: Arc::clone(&prepares),
            ..MockDriver::default()
        });
        db.connect().unwrap();

        db.exec("INSERT INTO t VALUES (1)", &[]).unwrap();
        db.exec("INSERT INTO t VALUES (1)", &[]).unwrap();
        db.query("INSERT INTO t VALUES (1)", &[]).unwrap();
        assert_eq!(prepares.load(Ordering::SeqCst), 1);

        db.exec("INSERT INTO t VALUES (2)", &[]).unwrap();
        assert_eq!(prepares.load(Ordering::SeqCst), 2);
        assert_eq!(db.cached_statements(), 2);
    }

    #[test]
    fn test_disconnect_clears_cache() {
        let prepares = Arc::new(AtomicUsize::new(0));
        let db = mock_db(MockDriver {
            prepares: Arc::clone(&prepares),
            ..MockDriver::default()
        });
        db.connect().unwrap();
        db.exec("SELECT 1", &[]).unwrap();
        assert_eq!(db.cached_statements(), 1);

        db.disconnect().unwrap();
        assert_eq!(db.cached_statements(), 0);

        // The same text must be re-prepared on the new connection.
        db.connect().unwrap();
        db.exec("SELECT 1", &[]).unwrap();
        assert_eq!(prepares.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_redundant_connect_keeps_cache() {
        let prepares = Arc::new(AtomicUsize::new(0));
        let db = mock_db(MockDriver {
            prepares: Arc::clone(&prepares),
            ..MockDriver::default()
        });
        db.connect().unwrap();
        db.exec("SELECT 1", &[]).unwrap();

        db.connect().unwrap();
        db.exec("SELECT 1", &[]).unwrap();
        assert_eq!(prepares.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prepare_failure_not_cached() {
        let db = mock_db(MockDriver::default());
        db.connect().unwrap();

        let err = db.exec("BAD SQL", &[]).unwrap_err();
        assert!(matches!(err, Error::Db(DbError::Prepare { .. })));
        assert_eq!(db.cached_statements(), 0);
    }

    #[test]
    fn test_copy_is_disconnected_with_empty_cache() {
        let db = mock_db(MockDriver::default());
        db.connect().unwrap();
        db.exec("SELECT 1", &[]).unwrap();
        assert_eq!(db.cached_statements(), 1);

        let copied = db.copy();
        assert_eq!(copied.driver_name(), "mock");
        assert_eq!(copied.dsn(), "mock://test");
        assert!(!copied.connected());
        assert_eq!(copied.cached_statements(), 0);

        // The original is untouched.
        assert!(db.connected());
        assert_eq!(db.cached_statements(), 1);
    }

    #[test]
    fn test_count_consumes_rows() {
        let db = mock_db(MockDriver::default());
        db.connect().unwrap();
        assert_eq!(db.count("SELECT 1", &[]).unwrap(), 1);
    }

    #[test]
    fn test_cursor_consumed_after_lock_released() {
        let db = mock_db(MockDriver::default());
        db.connect().unwrap();

        let rows = db.query("SELECT 1", &[]).unwrap();
        // Another call on the same manager while the cursor is live.
        db.exec("INSERT INTO t VALUES (1)", &[]).unwrap();

        let collected: Vec<Row> = rows.collect();
        assert_eq!(collected.len(), 1);
    }
}
