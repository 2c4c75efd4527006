use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::ast::Statement;
use crate::error::SiftResult;

/// Memoizes raw query text to its parsed statement.
///
/// Entries are held weakly: once no caller keeps the `Arc` alive, the
/// entry is reclaimable, which bounds memory for ad hoc or generated query
/// strings. Parsing is pure and idempotent, so the critical section is
/// best effort per key: a race costs at most a redundant parse, never an
/// inconsistent result.
#[derive(Default)]
pub struct ParseCache {
    entries: Mutex<HashMap<String, Weak<Statement>>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `text`, parsing through `supplier` on a miss.
    pub fn get_or_parse<F>(&self, text: &str, supplier: F) -> SiftResult<Arc<Statement>>
    where
        F: FnOnce(&str) -> SiftResult<Statement>,
    {
        if let Some(statement) = self.lookup(text) {
            debug!(query = text, "parse cache hit");
            return Ok(statement);
        }

        debug!(query = text, "parse cache miss");
        let statement = Arc::new(supplier(text)?);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // Another thread may have parsed the same text meanwhile; either
        // result is equivalent, keep the one already present if still alive
        if let Some(existing) = entries.get(text).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.insert(text.to_string(), Arc::downgrade(&statement));

        Ok(statement)
    }

    fn lookup(&self, text: &str) -> Option<Arc<Statement>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(text).and_then(Weak::upgrade)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_second_parse_is_cached() {
        let cache = ParseCache::new();
        let parses = AtomicUsize::new(0);

        let supplier = |text: &str| {
            parses.fetch_add(1, Ordering::SeqCst);
            parser::parse(text)
        };

        let first = cache.get_or_parse("get \"key\"", supplier).unwrap();
        let second = cache.get_or_parse("get \"key\"", supplier).unwrap();

        assert_eq!(parses.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_distinct_texts_parse_separately() {
        let cache = ParseCache::new();
        let parses = AtomicUsize::new(0);

        let supplier = |text: &str| {
            parses.fetch_add(1, Ordering::SeqCst);
            parser::parse(text)
        };

        let _a = cache.get_or_parse("get \"a\"", supplier).unwrap();
        let _b = cache.get_or_parse("get \"b\"", supplier).unwrap();

        assert_eq!(parses.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_entry_reclaimed_after_last_arc_drops() {
        let cache = ParseCache::new();
        let parses = AtomicUsize::new(0);

        let supplier = |text: &str| {
            parses.fetch_add(1, Ordering::SeqCst);
            parser::parse(text)
        };

        let statement = cache.get_or_parse("get \"key\"", supplier).unwrap();
        assert_eq!(cache.len(), 1);

        drop(statement);
        assert_eq!(cache.len(), 0);

        // Reclaimed entries are parsed again
        let _again = cache.get_or_parse("get \"key\"", supplier).unwrap();
        assert_eq!(parses.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let cache = ParseCache::new();

        let result = cache.get_or_parse("nonsense", parser::parse);
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
