//! Process-wide directory of loaded drivers.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use tracing::debug;

use crate::config::{ConnectionConfig, keys};
use crate::connection::Connection;
use crate::driver::{Driver, LoadedDriver, module_filenames};
use crate::error::SqlDriverError;

lazy_static! {
    static ref GLOBAL_REGISTRY: DriverRegistry = DriverRegistry::new();
}

struct RegistryState {
    drivers: HashMap<String, Arc<dyn Driver>>,
    search_paths: Vec<PathBuf>,
    use_default_path: bool,
}

/// Directory mapping driver name to loaded [`Driver`], with the module
/// search paths used to resolve names that are not yet installed.
///
/// One mutex guards lookup, installation, and unused-driver collection;
/// module loading itself happens outside it, and install races between
/// concurrent first-time loads resolve as "first successfully installed
/// wins". A driver name maps to at most one driver instance at any time.
///
/// The process-wide instance behind [`global`](DriverRegistry::global) is
/// initialized on first use and never torn down in any guaranteed order
/// relative to other process-wide state; tests sharing it must not assume
/// a pristine registry between runs.
pub struct DriverRegistry {
    state: Mutex<RegistryState>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// An empty registry with no search paths and the default system search
    /// enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                drivers: HashMap::new(),
                search_paths: Vec::new(),
                use_default_path: true,
            }),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> &'static DriverRegistry {
        &GLOBAL_REGISTRY
    }

    /// Resolve a driver by name, loading its module on first use.
    ///
    /// The name comes from `explicit_name` when given, else from
    /// [`ConnectionConfig::driver`]. A cached driver is returned as-is;
    /// otherwise candidate module paths are built from the `@module`
    /// override, the configured search paths plus any `@modules_path`
    /// directories, and finally the default system search, and the loaded
    /// driver is installed under first-wins rules.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError::ConfigError`] when no driver name is
    /// available, [`SqlDriverError::DriverNotFound`] when no candidate
    /// module opens, and [`SqlDriverError::ModuleLoad`] when the accepted
    /// module is missing an entry point.
    pub fn find_driver(
        &self,
        config: &ConnectionConfig,
        explicit_name: Option<&str>,
    ) -> Result<Arc<dyn Driver>, SqlDriverError> {
        let name = match explicit_name.filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => config.driver.as_str(),
        };
        if name.is_empty() {
            return Err(SqlDriverError::ConfigError(
                "no driver name in configuration".to_owned(),
            ));
        }

        let (search_paths, use_default_path) = {
            let state = self.lock();
            if let Some(driver) = state.drivers.get(name) {
                return Ok(Arc::clone(driver));
            }
            (state.search_paths.clone(), state.use_default_path)
        };

        // Loading runs unlocked; a concurrent load of the same name is
        // settled by install_driver, first successfully installed wins.
        let candidates = module_candidates(name, config, &search_paths, use_default_path);
        let driver: Arc<dyn Driver> = Arc::new(LoadedDriver::load(name, &candidates)?);
        debug!(driver = name, "loaded driver module");
        Ok(self.install_driver(name, driver, false))
    }

    /// Install a driver under `name`.
    ///
    /// With `force` false an already-installed driver wins and `driver` is
    /// discarded; either way the displaced driver is dropped only after the
    /// registry lock is released, so its teardown (module unload included)
    /// never runs under the lock.
    pub fn install_driver(
        &self,
        name: &str,
        driver: Arc<dyn Driver>,
        force: bool,
    ) -> Arc<dyn Driver> {
        let mut displaced = None;
        let installed = {
            let mut state = self.lock();
            match state.drivers.entry(name.to_owned()) {
                Entry::Occupied(existing) if !force => {
                    displaced = Some(driver);
                    Arc::clone(existing.get())
                }
                Entry::Occupied(mut existing) => {
                    displaced = Some(existing.insert(Arc::clone(&driver)));
                    driver
                }
                Entry::Vacant(slot) => {
                    debug!(driver = name, "installed driver");
                    Arc::clone(slot.insert(driver))
                }
            }
        };
        drop(displaced);
        installed
    }

    /// Remove every collectable driver with no holder besides the registry.
    ///
    /// The removed references are dropped outside the guarded section;
    /// expensive teardown never runs while the registry is locked.
    pub fn collect_unused(&self) {
        let mut garbage: Vec<Arc<dyn Driver>> = Vec::new();
        {
            let mut state = self.lock();
            state.drivers.retain(|name, driver| {
                if driver.collectable() && Arc::strong_count(driver) == 1 {
                    debug!(driver = %name, "collecting unused driver");
                    garbage.push(Arc::clone(driver));
                    false
                } else {
                    true
                }
            });
        }
        drop(garbage);
    }

    /// Append a directory consulted when resolving a module by naming
    /// convention.
    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        self.lock().search_paths.push(path.into());
    }

    pub fn clear_search_paths(&self) {
        self.lock().search_paths.clear();
    }

    /// Whether the default system search is consulted after the configured
    /// paths (enabled unless turned off here).
    pub fn use_default_search_path(&self, enabled: bool) {
        self.lock().use_default_path = enabled;
    }

    /// Resolve the driver for `config` and open a connection through it.
    ///
    /// # Errors
    ///
    /// Propagates driver resolution and connection-opening failures.
    pub fn connect(&self, config: &ConnectionConfig) -> Result<Connection, SqlDriverError> {
        let driver = self.find_driver(config, None)?;
        Connection::open(driver, config)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // The state is a plain map and stays consistent under unwinding.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DriverRegistry")
            .field("drivers", &state.drivers.keys().collect::<Vec<_>>())
            .field("search_paths", &state.search_paths)
            .field("use_default_path", &state.use_default_path)
            .finish()
    }
}

/// Candidate module paths for `name`, in resolution order: the `@module`
/// override alone if present, else the conventional filenames under each
/// search path and `@modules_path` entry, then the bare filenames for the
/// default system search.
fn module_candidates(
    name: &str,
    config: &ConnectionConfig,
    search_paths: &[PathBuf],
    use_default_path: bool,
) -> Vec<PathBuf> {
    if let Some(module) = config.get(keys::MODULE).filter(|m| !m.is_empty()) {
        return vec![PathBuf::from(module)];
    }
    let filenames = module_filenames(name);
    let extra: Vec<PathBuf> = config
        .get(keys::MODULES_PATH)
        .map(|raw| std::env::split_paths(raw).collect())
        .unwrap_or_default();

    let mut candidates = Vec::new();
    for dir in search_paths.iter().chain(extra.iter()) {
        for filename in &filenames {
            candidates.push(dir.join(filename));
        }
    }
    if use_default_path {
        candidates.extend(filenames.iter().map(PathBuf::from));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::module_candidates;
    use crate::config::{ConnectionConfig, keys};
    use crate::driver::module_filenames;

    #[test]
    fn explicit_module_overrides_conventions() {
        let config = ConnectionConfig::new("mysql").with(keys::MODULE, "/opt/custom/mysql.so");
        let candidates = module_candidates("mysql", &config, &[PathBuf::from("/lib")], true);
        assert_eq!(candidates, vec![PathBuf::from("/opt/custom/mysql.so")]);
    }

    #[test]
    fn search_paths_precede_default_search() {
        let config = ConnectionConfig::new("mysql");
        let [versioned, plain] = module_filenames("mysql");
        let candidates =
            module_candidates("mysql", &config, &[PathBuf::from("/a"), PathBuf::from("/b")], true);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/a").join(&versioned),
                PathBuf::from("/a").join(&plain),
                PathBuf::from("/b").join(&versioned),
                PathBuf::from("/b").join(&plain),
                PathBuf::from(&versioned),
                PathBuf::from(&plain),
            ]
        );
    }

    #[test]
    fn modules_path_extends_search_and_default_can_be_disabled() {
        let config = ConnectionConfig::new("mysql").with(keys::MODULES_PATH, "/x");
        let [versioned, plain] = module_filenames("mysql");
        let candidates = module_candidates("mysql", &config, &[], false);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/x").join(&versioned),
                PathBuf::from("/x").join(&plain),
            ]
        );
    }
}
