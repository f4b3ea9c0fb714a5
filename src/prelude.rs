//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so downstream code
//! and backend adapters can get started with a single `use`.

pub use crate::cache::StatementCache;
pub use crate::config::{ConnectionConfig, keys};
pub use crate::connection::{Connection, ConnectionPool, DriverConnection};
pub use crate::dialect::Dialect;
pub use crate::driver::{ConnectFactory, DialectFactory, Driver, LoadedDriver, StaticDriver};
pub use crate::error::SqlDriverError;
pub use crate::registry::DriverRegistry;
pub use crate::statement::{DriverStatement, Statement};
