//! In-memory mock backend and recording pool for tests and downstream
//! harnesses. Enabled by the `test-utils` feature.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionPool, DriverConnection};
use crate::dialect::Dialect;
use crate::driver::Driver;
use crate::error::SqlDriverError;
use crate::statement::DriverStatement;

/// Ordered record of backend lifecycle events, shared across the mock
/// driver, its sessions, and their statements.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count_of(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Index of the first occurrence of `event`, if recorded.
    #[must_use]
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Mock driver producing [`MockSession`] connections.
pub struct MockDriver {
    dialect: Arc<Dialect>,
    log: Arc<EventLog>,
    fail_open: AtomicBool,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::with_dialect(Dialect::new())
    }

    #[must_use]
    pub fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect: Arc::new(dialect),
            log: EventLog::new(),
            fail_open: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `open_connection` fail with a connection
    /// error.
    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn log(&self) -> Arc<EventLog> {
        Arc::clone(&self.log)
    }
}

impl Driver for MockDriver {
    fn open_connection(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, SqlDriverError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SqlDriverError::ConnectionError(
                "mock backend refused the connection".to_owned(),
            ));
        }
        self.log.record("open connection");
        Ok(Box::new(MockSession {
            log: Arc::clone(&self.log),
        }))
    }

    fn dialect(&self) -> Arc<Dialect> {
        Arc::clone(&self.dialect)
    }
}

impl Drop for MockDriver {
    fn drop(&mut self) {
        self.log.record("drop driver");
    }
}

/// Mock backend session; every statement it creates records its lifecycle
/// into the driver's [`EventLog`].
pub struct MockSession {
    log: Arc<EventLog>,
}

impl DriverConnection for MockSession {
    fn create_statement(&mut self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlDriverError> {
        self.log.record(format!("create statement: {sql}"));
        Ok(Box::new(MockStatement::unprepared(sql, Arc::clone(&self.log))))
    }

    fn prepare_statement(&mut self, sql: &str) -> Result<Box<dyn DriverStatement>, SqlDriverError> {
        self.log.record(format!("prepare statement: {sql}"));
        Ok(Box::new(MockStatement::new(sql, Arc::clone(&self.log))))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.log.record("drop connection");
    }
}

/// Mock statement with observable bound parameters.
pub struct MockStatement {
    sql: String,
    prepared: bool,
    params: Vec<String>,
    log: Arc<EventLog>,
}

impl MockStatement {
    /// A prepared mock statement.
    #[must_use]
    pub fn new(sql: impl Into<String>, log: Arc<EventLog>) -> Self {
        Self {
            sql: sql.into(),
            prepared: true,
            params: Vec::new(),
            log,
        }
    }

    #[must_use]
    pub fn unprepared(sql: impl Into<String>, log: Arc<EventLog>) -> Self {
        Self {
            sql: sql.into(),
            prepared: false,
            params: Vec::new(),
            log,
        }
    }

    pub fn bind(&mut self, value: impl Into<String>) {
        self.params.push(value.into());
    }

    #[must_use]
    pub fn params(&self) -> &[String] {
        &self.params
    }

    #[must_use]
    pub fn prepared(&self) -> bool {
        self.prepared
    }
}

impl DriverStatement for MockStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn reset(&mut self) {
        self.params.clear();
        self.log.record(format!("reset statement: {}", self.sql));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for MockStatement {
    fn drop(&mut self) {
        self.log.record(format!("drop statement: {}", self.sql));
    }
}

/// Pool that records every connection handed to it instead of reusing any.
#[derive(Default)]
pub struct RecordingPool {
    returned: Mutex<Vec<Connection>>,
}

impl RecordingPool {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.returned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every connection returned so far.
    #[must_use]
    pub fn drain(&self) -> Vec<Connection> {
        std::mem::take(&mut *self.returned.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ConnectionPool for RecordingPool {
    fn put(&self, connection: Connection) {
        self.returned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(connection);
    }
}
