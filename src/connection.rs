//! Live backend session: statement routing, the statement cache, typed
//! extension slots, and the pool-or-destroy disposal policy.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::cache::StatementCache;
use crate::config::{ConnectionConfig, keys};
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::SqlDriverError;
use crate::statement::{DriverStatement, Statement};

/// Adapter-side session contract.
///
/// A driver's connection factory returns one of these; the core wraps it in
/// a [`Connection`] that layers caching, extension state, and disposal on
/// top. Implementations downcast through [`as_any`] for anything
/// backend-specific.
///
/// [`as_any`]: DriverConnection::as_any
pub trait DriverConnection: Send {
    /// Create an unprepared statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError`] when the backend rejects the statement.
    fn create_statement(&mut self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlDriverError>;

    /// Create a prepared statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError`] when preparation fails.
    fn prepare_statement(&mut self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlDriverError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The `put` contract a pool implementation exposes to the core.
///
/// Reuse policy is entirely the pool's concern; the core only hands over
/// recyclable connections on disposal.
pub trait ConnectionPool: Send + Sync {
    fn put(&self, connection: Connection);
}

/// One live backend session.
///
/// Owns its [`StatementCache`], holds the creating [`Driver`] and its
/// [`Dialect`], optionally knows the pool it can return itself to, and
/// hosts type-keyed extension slots for backend-private state. A connection
/// and its statements are single-owner at any instant; nothing here is
/// internally synchronized for concurrent use.
pub struct Connection {
    // Declaration order doubles as teardown order on a plain drop: cached
    // statements go first, then the session, and the driver (with any
    // module backing it) is released last.
    cache: Arc<Mutex<StatementCache>>,
    session: Box<dyn DriverConnection>,
    extensions: HashMap<TypeId, Box<dyn Any + Send>>,
    pool: Option<Arc<dyn ConnectionPool>>,
    dialect: Arc<Dialect>,
    sequence_last: Option<String>,
    default_is_prepared: bool,
    recyclable: bool,
    driver: Option<Arc<dyn Driver>>,
}

impl Connection {
    /// Open a connection through `driver`, honoring the reserved
    /// configuration keys (`@stmt_cache_size`, `@use_prepared`,
    /// `@sequence_last`).
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError::ConfigError`] for malformed reserved keys,
    /// or whatever the driver's connection factory reports.
    pub fn open(driver: Arc<dyn Driver>, config: &ConnectionConfig) -> Result<Self, SqlDriverError> {
        let session = driver.open_connection(config)?;
        let dialect = driver.dialect();
        Self::from_session(session, dialect, Some(driver), config)
    }

    pub(crate) fn from_session(
        session: Box<dyn DriverConnection>,
        dialect: Arc<Dialect>,
        driver: Option<Arc<dyn Driver>>,
        config: &ConnectionConfig,
    ) -> Result<Self, SqlDriverError> {
        let cache_size = config.get_int(keys::STMT_CACHE_SIZE, 64)?;
        let mut cache = StatementCache::new();
        cache.set_size(usize::try_from(cache_size).unwrap_or(0));

        let default_is_prepared = match config.get_or(keys::USE_PREPARED, "on") {
            "on" => true,
            "off" => false,
            other => {
                return Err(SqlDriverError::ConfigError(format!(
                    "{} should be either 'on' or 'off', got {other:?}",
                    keys::USE_PREPARED
                )));
            }
        };

        let sequence_last = config
            .get(keys::SEQUENCE_LAST)
            .filter(|q| !q.is_empty())
            .map(ToOwned::to_owned);

        Ok(Self {
            cache: Arc::new(Mutex::new(cache)),
            session,
            extensions: HashMap::new(),
            pool: None,
            dialect,
            sequence_last,
            default_is_prepared,
            recyclable: true,
            driver,
        })
    }

    /// Prepare a statement, routing to the unprepared or prepared/cached
    /// path as selected by `@use_prepared` at construction time.
    ///
    /// # Errors
    ///
    /// Propagates the backend's statement-creation error.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement, SqlDriverError> {
        if self.default_is_prepared {
            self.get_prepared_statement(sql)
        } else {
            self.get_statement(sql)
        }
    }

    /// Always-fresh unprepared statement; never touches the cache.
    ///
    /// # Errors
    ///
    /// Propagates the backend's statement-creation error.
    pub fn get_statement(&mut self, sql: &str) -> Result<Statement, SqlDriverError> {
        let statement = self.session.create_statement(sql)?;
        Ok(Statement::new(statement, None))
    }

    /// Prepared statement through the cache.
    ///
    /// With an inactive cache this always prepares fresh and disposal
    /// destroys the statement. With an active cache, a hit reuses the
    /// cached statement and a miss prepares a new one; either way the cache
    /// is attached so disposal returns the statement to it.
    ///
    /// # Errors
    ///
    /// Propagates the backend's preparation error.
    pub fn get_prepared_statement(&mut self, sql: &str) -> Result<Statement, SqlDriverError> {
        if !self.lock_cache().active() {
            let statement = self.session.prepare_statement(sql)?;
            return Ok(Statement::new(statement, None));
        }
        let fetched = self.lock_cache().fetch(sql);
        let statement = match fetched {
            Some(cached) => cached,
            None => self.session.prepare_statement(sql)?,
        };
        Ok(Statement::new(statement, Some(Arc::clone(&self.cache))))
    }

    /// Fresh prepared statement that bypasses the cache entirely.
    ///
    /// # Errors
    ///
    /// Propagates the backend's preparation error.
    pub fn get_prepared_uncached_statement(
        &mut self,
        sql: &str,
    ) -> Result<Statement, SqlDriverError> {
        let statement = self.session.prepare_statement(sql)?;
        Ok(Statement::new(statement, None))
    }

    /// The query returning the last inserted id: the `@sequence_last`
    /// override when configured, else the dialect's.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError::NotSupported`] when neither the
    /// configuration nor the dialect supplies one, so callers can branch on
    /// the missing capability.
    pub fn sequence_last_query(&self) -> Result<String, SqlDriverError> {
        if let Some(query) = &self.sequence_last {
            return Ok(query.clone());
        }
        let query = self.dialect.sequence_last();
        if query.is_empty() {
            Err(SqlDriverError::NotSupported(
                "backend defines no last-insert-id query".to_owned(),
            ))
        } else {
            Ok(query)
        }
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<Dialect> {
        &self.dialect
    }

    #[must_use]
    pub fn driver(&self) -> Option<&Arc<dyn Driver>> {
        self.driver.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> &dyn DriverConnection {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> &mut dyn DriverConnection {
        self.session.as_mut()
    }

    /// Destroy every cached statement, releasing the backend resources they
    /// hold.
    pub fn clear_cache(&mut self) {
        self.lock_cache().clear();
    }

    #[must_use]
    pub fn recyclable(&self) -> bool {
        self.recyclable
    }

    /// Toggle whether this connection may ever be pooled; once `false`,
    /// disposal always destroys.
    pub fn set_recyclable(&mut self, recyclable: bool) {
        self.recyclable = recyclable;
    }

    pub fn set_pool(&mut self, pool: Arc<dyn ConnectionPool>) {
        self.pool = Some(pool);
    }

    #[must_use]
    pub fn pool(&self) -> Option<&Arc<dyn ConnectionPool>> {
        self.pool.as_ref()
    }

    /// Dispose of a connection.
    ///
    /// With an associated pool and the recyclable flag set, the pool
    /// reference is taken out first and the connection handed to
    /// [`ConnectionPool::put`]; reuse policy is the pool's. Otherwise the
    /// statement cache is cleared, a temporary strong reference to the
    /// owning driver is taken, the connection is destroyed, and only then
    /// is that reference released — the driver, and any module backing it,
    /// outlives the session's own teardown.
    pub fn dispose(mut connection: Connection) {
        if let Some(pool) = connection.pool.take() {
            if connection.recyclable {
                trace!("returning connection to pool");
                pool.put(connection);
                return;
            }
        }
        debug!("destroying connection");
        connection.clear_cache();
        let driver = connection.driver.take();
        drop(connection);
        drop(driver);
    }

    fn lock_cache(&self) -> MutexGuard<'_, StatementCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn cached_statement_count(&self) -> usize {
        self.lock_cache().len()
    }
}

/// Type-keyed extension slots for backend-private per-connection state.
///
/// An adapter attaches one value per concrete type; the core never learns
/// the value's shape.
impl Connection {
    #[must_use]
    pub fn extension_get<T: Any + Send>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn extension_get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Detach and return the slot value for `T`, leaving the slot empty.
    pub fn extension_release<T: Any + Send>(&mut self) -> Option<Box<T>> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Replace the slot value for `T`; `None` clears the slot.
    pub fn extension_reset<T: Any + Send>(&mut self, value: Option<Box<T>>) {
        match value {
            Some(value) => {
                self.extensions.insert(TypeId::of::<T>(), value);
            }
            None => {
                self.extensions.remove(&TypeId::of::<T>());
            }
        }
    }

    /// Type-erased form of [`extension_reset`](Connection::extension_reset)
    /// for adapters that carry the slot key separately.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDriverError::ExtensionMismatch`] when a non-null
    /// replacement's concrete type differs from `key`; replacing a slot
    /// with a value of another type is a programming error and fails
    /// loudly instead of corrupting the slot.
    pub fn extension_reset_raw(
        &mut self,
        key: TypeId,
        value: Option<Box<dyn Any + Send>>,
    ) -> Result<(), SqlDriverError> {
        match value {
            Some(value) => {
                let actual = (*value).type_id();
                if actual != key {
                    return Err(SqlDriverError::ExtensionMismatch(format!(
                        "replacement value has type {actual:?}, slot key is {key:?}"
                    )));
                }
                self.extensions.insert(key, value);
            }
            None => {
                self.extensions.remove(&key);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("default_is_prepared", &self.default_is_prepared)
            .field("recyclable", &self.recyclable)
            .field("pooled", &self.pool.is_some())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
