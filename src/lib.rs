//! Backend-agnostic database client core.
//!
//! The crate supplies the pieces every backend shares and none should
//! reimplement: a process-wide [`DriverRegistry`] that locates and loads
//! driver modules with reference-counted collection of unused drivers, a
//! [`Connection`] abstraction that multiplexes prepared-statement reuse
//! through a bounded LRU [`StatementCache`] and hosts typed extension slots
//! for backend-private state, and a [`Dialect`] layer translating portable
//! type and keyword names into backend SQL fragments.
//!
//! Backend adapters stay outside the crate: a driver module only has to
//! export a connection factory and a dialect factory (see [`driver`]), and
//! a pool only has to implement [`ConnectionPool::put`]. Everything here is
//! synchronous; blocking backend I/O is the only suspension point.
//!
//! ```rust
//! use sql_drivers::{ConnectionConfig, DriverRegistry};
//!
//! let config = ConnectionConfig::new("postgresql")
//!     .with("dbname", "inventory")
//!     .with("@stmt_cache_size", "32");
//!
//! let registry = DriverRegistry::new();
//! registry.add_search_path("/usr/lib/sql-drivers");
//! // registry.connect(&config) resolves the driver module and opens a
//! // session; drivers with no remaining connections are reclaimed by
//! // registry.collect_unused().
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod statement;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::StatementCache;
pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionPool, DriverConnection};
pub use dialect::Dialect;
pub use driver::{Driver, LoadedDriver, StaticDriver};
pub use error::SqlDriverError;
pub use registry::DriverRegistry;
pub use statement::{DriverStatement, Statement};
