//! Caller-facing statement handle and the adapter-side statement contract.

use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::cache::StatementCache;

/// Backend-owned prepared or unprepared query handle.
///
/// The core treats the statement as opaque: it only needs the SQL text (the
/// cache key) and the ability to reset bound parameters before the
/// statement is reused. Adapters downcast through [`as_any`] to reach their
/// concrete type.
///
/// [`as_any`]: DriverStatement::as_any
pub trait DriverStatement: Send {
    /// The SQL text this statement was created from.
    fn sql(&self) -> &str;

    /// Clear bound parameters and any result state.
    fn reset(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One query handle, owned at any moment by exactly one of caller or cache.
///
/// Dropping the handle is disposal: a statement obtained through an active
/// cache returns to that cache, anything else destroys the backend
/// statement. Statements must be disposed before the connection that
/// created them.
pub struct Statement {
    inner: Option<Box<dyn DriverStatement>>,
    cache: Option<Arc<Mutex<StatementCache>>>,
}

impl Statement {
    pub(crate) fn new(
        inner: Box<dyn DriverStatement>,
        cache: Option<Arc<Mutex<StatementCache>>>,
    ) -> Self {
        Self {
            inner: Some(inner),
            cache,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        self.backend().sql()
    }

    /// Clear bound parameters and result state.
    pub fn reset(&mut self) {
        self.backend_mut().reset();
    }

    /// Whether disposal returns this statement to a cache instead of
    /// destroying it.
    #[must_use]
    pub fn returns_to_cache(&self) -> bool {
        self.cache.is_some()
    }

    #[must_use]
    pub fn backend(&self) -> &dyn DriverStatement {
        self.inner
            .as_deref()
            .expect("statement accessed after disposal")
    }

    pub fn backend_mut(&mut self) -> &mut dyn DriverStatement {
        self.inner
            .as_deref_mut()
            .expect("statement accessed after disposal")
    }

    /// Adapter-side view of the concrete statement type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.backend().as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.backend_mut().as_any_mut().downcast_mut::<T>()
    }

    /// Dispose of a statement explicitly; identical to dropping it.
    pub fn dispose(statement: Statement) {
        drop(statement);
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.inner.as_deref().map(DriverStatement::sql))
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        let Some(statement) = self.inner.take() else {
            return;
        };
        if let Some(cache) = self.cache.take() {
            // Poisoned cache: fall through and let the statement drop.
            if let Ok(mut cache) = cache.lock() {
                cache.put(statement);
            }
        }
    }
}
