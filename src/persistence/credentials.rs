use super::{read_json_or_default, write_private};

use anyhow::Result;
use chatlink_core::CredentialStore;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Credentials kept in an owner-only JSON map file.
pub struct JsonCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl CredentialStore for JsonCredentialStore {
    fn set_credential(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut values: BTreeMap<String, String> = read_json_or_default(&self.path)?;
        values.insert(key.to_string(), value.to_string());
        write_private(&self.path, &serde_json::to_string_pretty(&values)?)
    }

    fn get_credential(&self, key: &str) -> Result<Option<String>> {
        let values: BTreeMap<String, String> = read_json_or_default(&self.path)?;
        Ok(values.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("credentials.json"));
        store
            .set_credential("basic_auth-https://acme.rocket.chat", "YTpi")
            .unwrap();
        store
            .set_credential("basic_auth-https://other.example.com", "Yzpk")
            .unwrap();

        assert_eq!(
            store
                .get_credential("basic_auth-https://acme.rocket.chat")
                .unwrap()
                .as_deref(),
            Some("YTpi")
        );
        assert_eq!(store.get_credential("missing").unwrap(), None);
    }

    #[test]
    fn later_extraction_supersedes_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("credentials.json"));
        store.set_credential("k", "old").unwrap();
        store.set_credential("k", "new").unwrap();
        assert_eq!(store.get_credential("k").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let store = JsonCredentialStore::new(&path);
        assert!(store.set_credential("k", "v").is_err());
        assert!(store.get_credential("k").is_err());
    }
}
