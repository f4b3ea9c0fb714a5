//! Driver factories: the polymorphic interface the registry manages, its
//! statically linked variant, and the runtime-loaded variant.

mod loaded;

pub use loaded::{LoadedDriver, module_filenames};

use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::connection::DriverConnection;
use crate::dialect::Dialect;
use crate::error::SqlDriverError;

/// Connection factory entry point exposed by a backend adapter.
pub type ConnectFactory =
    fn(&ConnectionConfig) -> Result<Box<dyn DriverConnection>, SqlDriverError>;

/// Dialect factory entry point exposed by a backend adapter.
pub type DialectFactory = fn() -> Dialect;

/// Factory capable of opening connections for one backend.
///
/// A driver is shared by the registry and by every connection it created;
/// it is destroyed only when no holder remains. The two variants are
/// [`StaticDriver`] (compiled in) and [`LoadedDriver`] (backed by a
/// runtime-loaded module).
pub trait Driver: Send + Sync {
    /// Open a backend session for `config`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's connection failure.
    fn open_connection(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, SqlDriverError>;

    /// The backend's dialect, queried once at driver construction and shared
    /// read-only by all its connections. For a loaded driver the dialect
    /// must not be held past the driver itself.
    fn dialect(&self) -> Arc<Dialect>;

    /// Whether the registry may garbage-collect this driver once nothing
    /// outside the registry holds it.
    fn collectable(&self) -> bool {
        true
    }
}

/// Driver for a backend compiled directly into the caller.
///
/// Built from the same two factory entry points a loadable module would
/// export; reports itself permanently in use so
/// [`collect_unused`](crate::registry::DriverRegistry::collect_unused)
/// never removes it.
pub struct StaticDriver {
    connect: ConnectFactory,
    dialect: Arc<Dialect>,
}

impl StaticDriver {
    #[must_use]
    pub fn new(connect: ConnectFactory, get_dialect: DialectFactory) -> Self {
        Self {
            connect,
            dialect: Arc::new(get_dialect()),
        }
    }
}

impl Driver for StaticDriver {
    fn open_connection(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, SqlDriverError> {
        (self.connect)(config)
    }

    fn dialect(&self) -> Arc<Dialect> {
        Arc::clone(&self.dialect)
    }

    fn collectable(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for StaticDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDriver").finish_non_exhaustive()
    }
}
