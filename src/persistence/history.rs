use super::read_json_or_default;

use anyhow::{Context, Result};
use chatlink_core::history::{upsert_entry, HistoryQuery, HistoryStore, ServerHistoryEntry};
use chatlink_core::CanonicalUrl;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Current history file schema version
pub const HISTORY_VERSION: u32 = 1;

fn default_history_version() -> u32 {
    HISTORY_VERSION
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default = "default_history_version")]
    version: u32,
    #[serde(default)]
    entries: Vec<ServerHistoryEntry>,
}

impl Default for HistoryFile {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            entries: Vec::new(),
        }
    }
}

/// Server history kept in a JSON file.
pub struct JsonHistoryStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HistoryFile> {
        read_json_or_default(&self.path)
    }

    /// Load, modify and save the entry list under a lock.
    ///
    /// On Unix the file is also flock'ed so a second process cannot interleave
    /// its own update. Nothing is written when `updater` fails.
    fn update<F, R>(&self, updater: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<ServerHistoryEntry>) -> Result<R>,
    {
        let _guard = self.lock.lock();

        #[cfg(unix)]
        {
            use std::io::{Read, Seek, Write};

            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.path)
                .with_context(|| format!("Failed to open {}", self.path.display()))?;

            unsafe { libc::flock(std::os::unix::io::AsRawFd::as_raw_fd(&file), libc::LOCK_EX) };

            let mut content = String::new();
            file.read_to_string(&mut content)?;
            let mut data: HistoryFile = if content.trim().is_empty() {
                HistoryFile::default()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", self.path.display()))?
            };

            let result = updater(&mut data.entries)?;

            let new_content = serde_json::to_string_pretty(&data)?;
            file.seek(std::io::SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(new_content.as_bytes())?;

            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600));

            // Lock is released when `file` is dropped
            return Ok(result);
        }

        #[cfg(not(unix))]
        {
            let mut data = self.load()?;
            let result = updater(&mut data.entries)?;
            super::write_private(&self.path, &serde_json::to_string_pretty(&data)?)?;
            Ok(result)
        }
    }
}

impl HistoryStore for JsonHistoryStore {
    fn query(&self, query: &HistoryQuery) -> Result<Vec<ServerHistoryEntry>> {
        let data = self.load()?;
        Ok(query.select(&data.entries))
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            if entries.len() == before {
                anyhow::bail!("history entry {} not found", id);
            }
            Ok(())
        })
    }

    fn upsert(
        &self,
        url: &CanonicalUrl,
        username: Option<&str>,
        at: OffsetDateTime,
    ) -> Result<ServerHistoryEntry> {
        self.update(|entries| Ok(upsert_entry(entries, url, username, at)))
    }
}
