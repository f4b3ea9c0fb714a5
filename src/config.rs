use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SqlDriverError;

/// Reserved configuration keys recognized by the core.
///
/// Everything else in [`ConnectionConfig::properties`] is passed through to
/// the backend adapter untouched.
pub mod keys {
    /// Prepared-statement cache capacity (int, default 64; `<= 0` disables
    /// the cache).
    pub const STMT_CACHE_SIZE: &str = "@stmt_cache_size";
    /// `"on"`/`"off"`; selects the prepared/cached path at connection
    /// construction time (default `"on"`).
    pub const USE_PREPARED: &str = "@use_prepared";
    /// Explicit last-insert-id query, overriding the dialect's.
    pub const SEQUENCE_LAST: &str = "@sequence_last";
    /// Explicit driver module path, overriding filename conventions.
    pub const MODULE: &str = "@module";
    /// Extra module search directories, platform path-separator delimited.
    pub const MODULES_PATH: &str = "@modules_path";
}

/// Parsed connection configuration.
///
/// This is the flat key/value form a connection string parses into; the
/// parsing itself lives with the caller. The core reads the reserved `@`
/// keys (see [`keys`]) and hands the whole configuration to the driver's
/// connection factory.
///
/// ```rust
/// use sql_drivers::ConnectionConfig;
///
/// let config = ConnectionConfig::new("sqlite3")
///     .with("db", ":memory:")
///     .with("@stmt_cache_size", "16");
/// assert_eq!(config.get("db"), Some(":memory:"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver name the registry resolves, e.g. `"postgresql"`.
    pub driver: String,
    /// All remaining key/value properties, reserved `@` keys included.
    pub properties: HashMap<String, String>,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            properties: HashMap::new(),
        }
    }

    /// Builder-style property insertion.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Read an integer property, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError::ConfigError`] when the property is present
    /// but not a valid integer; malformed settings are fatal, not ignored.
    pub fn get_int(&self, key: &str, default: i64) -> Result<i64, SqlDriverError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                SqlDriverError::ConfigError(format!("property {key} is not an integer: {raw:?}"))
            }),
        }
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectionConfig
where
    K: Into<String>,
    V: Into<String>,
{
    /// Build a driverless configuration from parsed key/value pairs; the
    /// caller fills [`ConnectionConfig::driver`] separately or supplies an
    /// explicit name to the registry.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            driver: String::new(),
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
