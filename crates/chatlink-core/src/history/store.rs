use super::types::{upsert_entry, HistoryQuery, ServerHistoryEntry};
use crate::error::BootstrapError;
use crate::url::CanonicalUrl;

use parking_lot::RwLock;
use std::sync::Arc;
use time::OffsetDateTime;

/// Storage backend for server history.
///
/// Implementations report storage failures as errors; `HistoryRepository`
/// decides which of them reach the caller.
pub trait HistoryStore: Send + Sync + 'static {
    fn query(&self, query: &HistoryQuery) -> anyhow::Result<Vec<ServerHistoryEntry>>;
    fn remove(&self, id: &str) -> anyhow::Result<()>;
    fn upsert(
        &self,
        url: &CanonicalUrl,
        username: Option<&str>,
        at: OffsetDateTime,
    ) -> anyhow::Result<ServerHistoryEntry>;
}

/// Process-local history, lost on exit.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<Vec<ServerHistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<ServerHistoryEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn query(&self, query: &HistoryQuery) -> anyhow::Result<Vec<ServerHistoryEntry>> {
        Ok(query.select(self.entries.read().iter()))
    }

    fn remove(&self, id: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            anyhow::bail!("history entry {} not found", id);
        }
        Ok(())
    }

    fn upsert(
        &self,
        url: &CanonicalUrl,
        username: Option<&str>,
        at: OffsetDateTime,
    ) -> anyhow::Result<ServerHistoryEntry> {
        Ok(upsert_entry(&mut self.entries.write(), url, username, at))
    }
}

/// The history component the controller talks to.
///
/// Reads degrade to an empty list when storage is unavailable; writes report
/// their failure so the caller can log it and keep its view unchanged.
#[derive(Clone)]
pub struct HistoryRepository {
    store: Arc<dyn HistoryStore>,
    limit: usize,
}

impl HistoryRepository {
    pub fn new(store: Arc<dyn HistoryStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn query(&self, filter: Option<&str>) -> Vec<ServerHistoryEntry> {
        let query = HistoryQuery::new(filter, self.limit);
        match self.store.query(&query) {
            Ok(mut entries) => {
                entries.retain(|e| e.username.is_some());
                entries.truncate(self.limit);
                entries
            }
            Err(e) => {
                let err = BootstrapError::StorageUnavailable(e);
                log::warn!("History query failed, showing no suggestions: {:#}", err);
                Vec::new()
            }
        }
    }

    pub fn remove(&self, entry: &ServerHistoryEntry) -> Result<(), BootstrapError> {
        self.store
            .remove(&entry.id)
            .map_err(|source| BootstrapError::DeleteFailed {
                id: entry.id.clone(),
                source,
            })
    }

    pub fn record(
        &self,
        url: &CanonicalUrl,
        username: Option<&str>,
    ) -> Result<ServerHistoryEntry, BootstrapError> {
        self.store
            .upsert(url, username, OffsetDateTime::now_utc())
            .map_err(BootstrapError::StorageUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::types::tests::entry;
    use crate::url::{normalize, UrlRules};

    struct BrokenStore;

    impl HistoryStore for BrokenStore {
        fn query(&self, _query: &HistoryQuery) -> anyhow::Result<Vec<ServerHistoryEntry>> {
            anyhow::bail!("database locked")
        }

        fn remove(&self, _id: &str) -> anyhow::Result<()> {
            anyhow::bail!("database locked")
        }

        fn upsert(
            &self,
            _url: &CanonicalUrl,
            _username: Option<&str>,
            _at: OffsetDateTime,
        ) -> anyhow::Result<ServerHistoryEntry> {
            anyhow::bail!("database locked")
        }
    }

    /// Ignores the query and hands back everything, like a careless backend.
    struct LeakyStore(Vec<ServerHistoryEntry>);

    impl HistoryStore for LeakyStore {
        fn query(&self, _query: &HistoryQuery) -> anyhow::Result<Vec<ServerHistoryEntry>> {
            Ok(self.0.clone())
        }

        fn remove(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn upsert(
            &self,
            _url: &CanonicalUrl,
            _username: Option<&str>,
            _at: OffsetDateTime,
        ) -> anyhow::Result<ServerHistoryEntry> {
            anyhow::bail!("read only")
        }
    }

    fn sample_store() -> Arc<MemoryHistoryStore> {
        Arc::new(MemoryHistoryStore::with_entries(vec![
            entry("1", "https://one.example.com", Some("u1"), 1),
            entry("2", "https://two.example.com", Some("u2"), 2),
            entry("3", "https://three.example.com", None, 3),
            entry("4", "https://four.example.com", Some("u4"), 4),
            entry("5", "https://five.example.com", Some("u5"), 5),
        ]))
    }

    #[test]
    fn query_is_bounded_and_sorted() {
        let repo = HistoryRepository::new(sample_store(), 3);
        let ids: Vec<String> = repo.query(None).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["5", "4", "2"]);
    }

    #[test]
    fn query_degrades_to_empty_on_storage_error() {
        let repo = HistoryRepository::new(Arc::new(BrokenStore), 3);
        assert!(repo.query(Some("one")).is_empty());
    }

    #[test]
    fn query_enforces_username_and_limit_on_any_backend() {
        let leaky = LeakyStore(vec![
            entry("a", "https://a.example.com", None, 1),
            entry("b", "https://b.example.com", Some("b"), 2),
            entry("c", "https://c.example.com", Some("c"), 3),
        ]);
        let repo = HistoryRepository::new(Arc::new(leaky), 1);
        let result = repo.query(None);
        assert_eq!(result.len(), 1);
        assert!(result[0].username.is_some());
    }

    #[test]
    fn remove_drops_entry_from_later_queries() {
        let store = sample_store();
        let repo = HistoryRepository::new(store.clone(), 10);
        let target = repo.query(Some("four")).remove(0);

        repo.remove(&target).unwrap();

        assert!(repo.query(Some("four")).is_empty());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn failed_remove_reports_delete_failed() {
        let repo = HistoryRepository::new(Arc::new(BrokenStore), 3);
        let target = entry("x", "https://x.example.com", Some("x"), 1);
        match repo.remove(&target) {
            Err(BootstrapError::DeleteFailed { id, .. }) => assert_eq!(id, "x"),
            other => panic!("expected DeleteFailed, got {:?}", other),
        }
    }

    #[test]
    fn record_makes_entry_eligible_once_authenticated() {
        let store = Arc::new(MemoryHistoryStore::new());
        let repo = HistoryRepository::new(store.clone(), 3);
        let url = normalize("acme", &UrlRules::default()).unwrap();

        repo.record(&url, None).unwrap();
        assert!(repo.query(None).is_empty());

        repo.record(&url, Some("ann")).unwrap();
        let entries = repo.query(Some("acme"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].username.as_deref(), Some("ann"));
        assert_eq!(store.len(), 1);
    }
}
