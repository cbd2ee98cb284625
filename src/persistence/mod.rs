pub mod credentials;
pub mod history;

pub use credentials::JsonCredentialStore;
pub use history::JsonHistoryStore;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Server history file name inside the config directory
pub const HISTORY_FILE: &str = "servers_history.json";
/// Credential file name inside the config directory
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatlink")
}

/// Write `content` to `path`, creating parent directories, readable by the
/// owner only.
pub(crate) fn write_private(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

/// Read a JSON file, treating a missing or empty file as the default value.
pub(crate) fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
