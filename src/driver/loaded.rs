//! Runtime-loaded driver modules.
//!
//! A loadable module for driver name `X` exports two entry points,
//! `sql_drivers_X_open_connection` and `sql_drivers_X_get_dialect`, with the
//! signatures of [`ConnectFactory`] and [`DialectFactory`]. Modules are
//! resolved through [`libloading`]; the symbol types are asserted, not
//! checked, so the module must be built against the same crate version.
#![allow(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tracing::trace;

use crate::config::ConnectionConfig;
use crate::connection::DriverConnection;
use crate::dialect::Dialect;
use crate::driver::{ConnectFactory, DialectFactory, Driver};
use crate::error::SqlDriverError;

const MODULE_SOVERSION: &str = "0";

/// The two conventional filenames for driver name `name` on this platform,
/// versioned variant first.
#[must_use]
pub fn module_filenames(name: &str) -> [String; 2] {
    if cfg!(target_os = "windows") {
        [
            format!("sql_drivers_{name}-{MODULE_SOVERSION}.dll"),
            format!("sql_drivers_{name}.dll"),
        ]
    } else if cfg!(target_os = "macos") {
        [
            format!("libsql_drivers_{name}.{MODULE_SOVERSION}.dylib"),
            format!("libsql_drivers_{name}.dylib"),
        ]
    } else {
        [
            format!("libsql_drivers_{name}.so.{MODULE_SOVERSION}"),
            format!("libsql_drivers_{name}.so"),
        ]
    }
}

/// Driver backed by a runtime-loaded module.
///
/// The dialect is produced by module code, so it is queried once at load
/// time and, together with the resolved entry points, torn down before the
/// module handle; unloading the module first would leave the dialect's
/// destructor pointing into unmapped code.
pub struct LoadedDriver {
    // Declaration order doubles as teardown order: everything the module
    // allocated goes before the library handle unloads.
    dialect: Arc<Dialect>,
    connect: ConnectFactory,
    library: Library,
    path: PathBuf,
}

impl LoadedDriver {
    /// Open the first candidate module that loads and resolve both entry
    /// points from it.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError::DriverNotFound`] when no candidate opens,
    /// and [`SqlDriverError::ModuleLoad`] when the accepted module is
    /// missing either entry point. Both are fatal configuration errors;
    /// there is no fallback past the candidate order.
    pub fn load(name: &str, candidates: &[PathBuf]) -> Result<Self, SqlDriverError> {
        let mut opened = None;
        for candidate in candidates {
            match unsafe { Library::new(candidate) } {
                Ok(library) => {
                    opened = Some((library, candidate.clone()));
                    break;
                }
                Err(err) => {
                    trace!(module = %candidate.display(), %err, "driver module candidate failed to open");
                }
            }
        }
        let Some((library, path)) = opened else {
            return Err(SqlDriverError::DriverNotFound(format!(
                "no module found for driver {name}"
            )));
        };

        let connect: ConnectFactory =
            resolve(&library, &format!("sql_drivers_{name}_open_connection"))?;
        let get_dialect: DialectFactory =
            resolve(&library, &format!("sql_drivers_{name}_get_dialect"))?;
        let dialect = Arc::new(get_dialect());

        Ok(Self {
            dialect,
            connect,
            library,
            path,
        })
    }

    /// Path of the module that was accepted.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn resolve<T: Copy>(library: &Library, symbol: &str) -> Result<T, SqlDriverError> {
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|entry| *entry)
        .map_err(|err| {
            SqlDriverError::ModuleLoad(format!("failed to resolve entry point {symbol}: {err}"))
        })
}

impl Driver for LoadedDriver {
    fn open_connection(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, SqlDriverError> {
        (self.connect)(config)
    }

    fn dialect(&self) -> Arc<Dialect> {
        Arc::clone(&self.dialect)
    }
}

impl std::fmt::Debug for LoadedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDriver")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
