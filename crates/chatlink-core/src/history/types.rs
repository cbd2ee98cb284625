use crate::url::CanonicalUrl;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Number of suggestions shown under the server input.
pub const DEFAULT_HISTORY_LIMIT: usize = 3;

/// A server the user connected to before.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHistoryEntry {
    pub id: String,
    /// Always a normalizer output, never raw input
    pub url: String,
    /// Set once the user authenticated on this server
    #[serde(default)]
    pub username: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Bounded, filtered, recency-sorted history read.
///
/// Only entries with a username are eligible. The filter is a literal,
/// case-insensitive substring of the URL: pattern metacharacters in it are
/// escaped, so `a%b` or `a.b` only match themselves.
#[derive(Clone, Debug)]
pub struct HistoryQuery {
    filter: Option<String>,
    pattern: Option<Regex>,
    limit: usize,
}

impl HistoryQuery {
    pub fn new(filter: Option<&str>, limit: usize) -> Self {
        let filter = filter.filter(|f| !f.is_empty()).map(str::to_string);
        let pattern = filter.as_deref().and_then(|f| {
            RegexBuilder::new(&regex::escape(f))
                .case_insensitive(true)
                .build()
                .map_err(|e| log::warn!("Unusable history filter {:?}: {}", f, e))
                .ok()
        });
        Self {
            filter,
            pattern,
            limit,
        }
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn matches(&self, entry: &ServerHistoryEntry) -> bool {
        if entry.username.is_none() {
            return false;
        }
        match (&self.filter, &self.pattern) {
            (None, _) => true,
            (Some(_), Some(pattern)) => pattern.is_match(&entry.url),
            (Some(_), None) => false,
        }
    }

    /// Apply the query to a full entry list.
    pub fn select<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a ServerHistoryEntry>,
    ) -> Vec<ServerHistoryEntry> {
        let mut selected: Vec<ServerHistoryEntry> = entries
            .into_iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        selected.truncate(self.limit);
        selected
    }
}

/// Create or refresh the entry for `url`.
///
/// An existing entry keeps its id and its username unless a new one is given.
pub fn upsert_entry(
    entries: &mut Vec<ServerHistoryEntry>,
    url: &CanonicalUrl,
    username: Option<&str>,
    at: OffsetDateTime,
) -> ServerHistoryEntry {
    if let Some(existing) = entries.iter_mut().find(|e| e.url == url.as_str()) {
        if let Some(name) = username {
            existing.username = Some(name.to_string());
        }
        existing.updated_at = at;
        return existing.clone();
    }

    let entry = ServerHistoryEntry {
        id: uuid::Uuid::new_v4().to_string(),
        url: url.as_str().to_string(),
        username: username.map(str::to_string),
        updated_at: at,
    };
    entries.push(entry.clone());
    entry
}
