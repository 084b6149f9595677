//! # dbkit
//!
//! Minimal relational database access layer.
//!
//! Two cooperating pieces: a connection manager ([`Db`]) that serializes
//! statement execution through an exclusive lock and caches prepared
//! statements, and a schema migration engine ([`Schema`]) that brings a
//! database's structure to a target version, persisting progress in a
//! `schema_info` table after every successful step.
//!
//! ## Features
//!
//! - **Statement caching**: each distinct query text is prepared once per
//!   connection; the cache never outlives the connection that filled it
//! - **Versioned migrations**: steps registered in any order, applied
//!   ascending, partial progress survives failure
//! - **Explicit drivers**: backends resolve through an injected
//!   [`DriverRegistry`], never a process-global table
//!
//! ## Example
//!
//! ```
//! use dbkit::{Db, DriverRegistry, Schema, Target};
//!
//! # fn main() -> dbkit::Result<()> {
//! let registry = DriverRegistry::with_defaults();
//! let db = Db::open(&registry, "sqlite", ":memory:")?;
//! db.connect()?;
//!
//! let mut schema = Schema::new();
//! schema.version(1, |db| {
//!     db.exec("CREATE TABLE foo (id INTEGER PRIMARY KEY, value TEXT)", &[])
//! })?;
//! schema.migrate(&db, Target::Latest)?;
//!
//! db.exec(
//!     "INSERT INTO foo (id, value) VALUES (?, ?)",
//!     &[1.into(), "hello".into()],
//! )?;
//! assert_eq!(db.count("SELECT * FROM foo", &[])?, 1);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod db;
pub mod driver;
pub mod error;
pub mod schema;
pub mod value;

// Re-export commonly used types at crate root
pub use error::{DbError, Error, Result, SchemaError};

pub use db::{Db, StatementCache};

pub use driver::sqlite::SqliteDriver;
pub use driver::{Driver, DriverConn, DriverRegistry, StatementHandle};

pub use schema::{SCHEMA_TABLE, Schema, Target};

pub use value::{FromValue, Row, Rows, Value};
