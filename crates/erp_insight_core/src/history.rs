//! crates/erp_insight_core/src/history.rs
//!
//! The in-memory history of queries run during one session.

use crate::domain::QueryHistoryItem;
use std::collections::VecDeque;
use uuid::Uuid;

/// Number of entries kept by [`QueryHistory::default`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A bounded, most-recent-first list of past queries.
#[derive(Debug, Clone)]
pub struct QueryHistory {
    items: VecDeque<QueryHistoryItem>,
    capacity: usize,
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl QueryHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts `item` at the front, evicting the oldest entries past capacity.
    pub fn record(&mut self, item: QueryHistoryItem) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    /// Entries from most recent to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &QueryHistoryItem> {
        self.items.iter()
    }

    /// The entry at `index`, where 0 is the most recent.
    pub fn get(&self, index: usize) -> Option<&QueryHistoryItem> {
        self.items.get(index)
    }

    pub fn latest(&self) -> Option<&QueryHistoryItem> {
        self.items.front()
    }

    pub fn find(&self, id: Uuid) -> Option<&QueryHistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QueryKind, QueryResult};

    fn item(query: &str) -> QueryHistoryItem {
        QueryHistoryItem::from_result(query, QueryKind::NaturalLanguage, &QueryResult::default())
    }

    #[test]
    fn keeps_the_fifty_most_recent_newest_first() {
        let mut history = QueryHistory::default();
        for n in 1..=51 {
            history.record(item(&format!("query {n}")));
        }

        assert_eq!(history.len(), 50);
        let queries: Vec<&str> = history.iter().map(|i| i.query.as_str()).collect();
        assert_eq!(queries.first(), Some(&"query 51"));
        assert_eq!(queries.last(), Some(&"query 2"));
        assert!(!queries.contains(&"query 1"));

        let expected: Vec<String> = (2..=51).rev().map(|n| format!("query {n}")).collect();
        assert_eq!(queries, expected);
    }

    #[test]
    fn lookup_by_index_and_id() {
        let mut history = QueryHistory::with_capacity(3);
        assert!(history.is_empty());
        assert!(history.latest().is_none());

        history.record(item("first"));
        history.record(item("second"));
        let id = history.latest().map(|i| i.id).unwrap();

        assert_eq!(history.get(0).map(|i| i.query.as_str()), Some("second"));
        assert_eq!(history.get(1).map(|i| i.query.as_str()), Some("first"));
        assert_eq!(history.find(id).map(|i| i.query.as_str()), Some("second"));
        assert!(history.find(Uuid::new_v4()).is_none());

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }
}
