//! Bounded least-recently-used cache of prepared statements.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::statement::DriverStatement;

/// Per-connection reuse pool for prepared statements, keyed by SQL text.
///
/// The cache is inactive until its one-time [`set_size`](StatementCache::set_size)
/// call; capacity is fixed at activation and never exceeded, and it holds at
/// most one entry per distinct SQL text. Fetching an entry removes it, so no
/// statement is ever handed to two callers at once.
pub struct StatementCache {
    entries: HashMap<String, Box<dyn DriverStatement>>,
    // Recency order of keys in `entries`; front is most recently used.
    order: VecDeque<String>,
    capacity: usize,
    configured: bool,
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementCache {
    /// An inactive cache; activate with [`set_size`](StatementCache::set_size).
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: 0,
            configured: false,
        }
    }

    /// One-way activation latch.
    ///
    /// The first call decides forever: a positive `capacity` activates the
    /// cache at that fixed size, zero leaves it permanently inactive. Every
    /// later call is ignored.
    pub fn set_size(&mut self, capacity: usize) {
        if self.configured {
            return;
        }
        self.configured = true;
        self.capacity = capacity;
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.capacity > 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return a statement to the cache.
    ///
    /// An inactive cache destroys the statement immediately. Otherwise the
    /// statement is reset and inserted at the most-recently-used position;
    /// an existing entry for the same SQL text is replaced, and at capacity
    /// the least-recently-used entry is evicted first.
    pub fn put(&mut self, mut statement: Box<dyn DriverStatement>) {
        if !self.active() {
            return;
        }
        statement.reset();
        let sql = statement.sql().to_owned();
        if self.entries.contains_key(&sql) {
            self.entries.insert(sql.clone(), statement);
            self.touch(&sql);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_back() {
                trace!(sql = %oldest, "evicting least recently used statement");
                self.entries.remove(&oldest);
            }
        }
        self.order.push_front(sql.clone());
        self.entries.insert(sql, statement);
    }

    /// Take the statement cached for `sql`, removing its entry entirely.
    /// A miss is not an error.
    pub fn fetch(&mut self, sql: &str) -> Option<Box<dyn DriverStatement>> {
        let statement = self.entries.remove(sql)?;
        if let Some(position) = self.order.iter().position(|key| key == sql) {
            self.order.remove(position);
        }
        Some(statement)
    }

    /// Destroy every cached statement and empty the structure.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn touch(&mut self, sql: &str) {
        if let Some(position) = self.order.iter().position(|key| key == sql) {
            self.order.remove(position);
        }
        self.order.push_front(sql.to_owned());
    }
}

impl std::fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .field("configured", &self.configured)
            .finish()
    }
}
