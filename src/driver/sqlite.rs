//! `SQLite` driver backed by rusqlite.
//!
//! The DSN is either `":memory:"` (or empty) for an in-memory database,
//! or a filesystem path. Compiled statements are retained in rusqlite's
//! connection-level cache, so re-executing a handle the connection
//! manager has already prepared does not recompile it.

use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::driver::{Driver, DriverConn, StatementHandle};
use crate::error::{DbError, Error, Result};
use crate::value::{Row, Rows, Value};

/// In-memory DSN recognized by [`SqliteDriver`].
pub const MEMORY_DSN: &str = ":memory:";

/// The built-in `SQLite` driver, registered as `"sqlite"`.
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn connect(&self, dsn: &str) -> Result<Box<dyn DriverConn>> {
        let in_memory = dsn.is_empty() || dsn == MEMORY_DSN;
        let conn = if in_memory {
            Connection::open_in_memory()
        } else {
            Connection::open(dsn)
        }
        .map_err(|e| DbError::Connection(e.to_string()))?;

        configure(&conn, in_memory)?;
        debug!(dsn, "opened sqlite connection");
        Ok(Box::new(SqliteConn { conn }))
    }
}

/// Applies the standard connection settings.
fn configure(conn: &Connection, in_memory: bool) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .map_err(|e| DbError::Connection(e.to_string()))?;

    // WAL improves concurrent read/write on file-backed databases; it is
    // meaningless for in-memory ones. The pragma returns the new mode.
    if !in_memory {
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| DbError::Connection(e.to_string()))?;
    }

    Ok(())
}

struct SqliteConn {
    conn: Connection,
}

impl DriverConn for SqliteConn {
    fn prepare(&mut self, query: &str) -> Result<StatementHandle> {
        // Compiling through prepare_cached leaves the compiled statement
        // in the connection's cache for later execute/query calls.
        self.conn
            .prepare_cached(query)
            .map_err(|e| prepare_error(query, &e))?;
        Ok(StatementHandle::new(query))
    }

    fn execute(&mut self, stmt: &StatementHandle, args: &[Value]) -> Result<u64> {
        let query = stmt.query();
        {
            let mut prepared = self
                .conn
                .prepare_cached(query)
                .map_err(|e| prepare_error(query, &e))?;
            let mut rows = prepared
                .query(params_from_iter(args.iter().map(to_sqlite)))
                .map_err(|e| execution_error(query, &e))?;
            // Row-producing statements are legal here; results are
            // discarded.
            while let Some(_row) = rows.next().map_err(|e| execution_error(query, &e))? {}
        }
        Ok(self.conn.changes())
    }

    fn query(&mut self, stmt: &StatementHandle, args: &[Value]) -> Result<Rows> {
        let query = stmt.query();
        let mut prepared = self
            .conn
            .prepare_cached(query)
            .map_err(|e| prepare_error(query, &e))?;

        let columns: Vec<String> = prepared
            .column_names()
            .iter()
            .map(|c| (*c).to_string())
            .collect();
        let column_count = prepared.column_count();

        let mut rows = prepared
            .query(params_from_iter(args.iter().map(to_sqlite)))
            .map_err(|e| execution_error(query, &e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| execution_error(query, &e))? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                let value: rusqlite::types::Value =
                    row.get(index).map_err(|e| execution_error(query, &e))?;
                values.push(from_sqlite(value));
            }
            out.push(Row::new(values));
        }

        Ok(Rows::new(columns, out))
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(count > 0)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self { conn } = *self;
        conn.close()
            .map_err(|(_conn, e)| DbError::Connection(e.to_string()).into())
    }
}

fn prepare_error(query: &str, e: &rusqlite::Error) -> Error {
    DbError::Prepare {
        query: query.to_string(),
        reason: e.to_string(),
    }
    .into()
}

fn execution_error(query: &str, e: &rusqlite::Error) -> Error {
    DbError::Execution {
        query: query.to_string(),
        reason: e.to_string(),
    }
    .into()
}

fn to_sqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(v) => rusqlite::types::Value::Integer(*v),
        Value::Real(v) => rusqlite::types::Value::Real(*v),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Blob(v) => rusqlite::types::Value::Blob(v.clone()),
    }
}

fn from_sqlite(value: rusqlite::types::Value) -> Value {
    match value {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(v) => Value::Integer(v),
        rusqlite::types::Value::Real(v) => Value::Real(v),
        rusqlite::types::Value::Text(v) => Value::Text(v),
        rusqlite::types::Value::Blob(v) => Value::Blob(v),
    }
}
