pub mod store;
pub mod types;

pub use store::{HistoryRepository, HistoryStore, MemoryHistoryStore};
pub use types::{upsert_entry, HistoryQuery, ServerHistoryEntry, DEFAULT_HISTORY_LIMIT};
