//! Prepared-statement cache.

use std::collections::HashMap;

use crate::driver::StatementHandle;

/// Cache mapping exact query text to a prepared statement handle.
///
/// Keys are the literal statement text, embedded values included; this is
/// not a template system. Entries are bound to the connection that
/// prepared them, so the connection manager clears the cache whenever
/// that connection goes away.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: HashMap<String, StatementHandle>,
}

impl StatementCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the handle for `query`.
    pub fn get(&self, query: &str) -> Option<&StatementHandle> {
        self.entries.get(query)
    }

    /// Inserts a handle, keyed by its own query text.
    pub fn insert(&mut self, handle: StatementHandle) {
        self.entries.insert(handle.query().to_string(), handle);
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached statements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = StatementCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("SELECT 1").is_none());

        cache.insert(StatementHandle::new("SELECT 1"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("SELECT 1").unwrap().query(), "SELECT 1");
    }

    #[test]
    fn test_reinsert_same_query_keeps_one_entry() {
        let mut cache = StatementCache::new();
        cache.insert(StatementHandle::new("SELECT 1"));
        cache.insert(StatementHandle::new("SELECT 1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = StatementCache::new();
        cache.insert(StatementHandle::new("SELECT 1"));
        cache.insert(StatementHandle::new("SELECT 2"));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
