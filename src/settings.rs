use crate::persistence::{get_config_dir, write_private};

use anyhow::Result;
use chatlink_core::BootstrapConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings schema version - increment when making breaking changes
pub const SETTINGS_VERSION: u32 = 1;

fn default_settings_version() -> u32 {
    SETTINGS_VERSION
}

/// App settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    /// Settings schema version for migration support
    #[serde(default = "default_settings_version")]
    pub version: u32,
    /// Server input rules and bootstrap behavior
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    /// Last server a connect intent was dispatched to
    #[serde(default)]
    pub last_server: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            bootstrap: BootstrapConfig::default(),
            last_server: None,
        }
    }
}

impl AppSettings {
    /// Bootstrap config whose initial input is the remembered last server,
    /// falling back to the configured one.
    pub fn bootstrap_config(&self) -> BootstrapConfig {
        let mut config = self.bootstrap.clone();
        if let Some(last) = self.last_server.as_ref().filter(|s| !s.is_empty()) {
            config.initial_server = last.clone();
        }
        config
    }
}

/// Get the settings file path
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

/// Load app settings from the default location
pub fn load_settings() -> AppSettings {
    load_settings_from(&get_settings_path())
}

/// Save app settings to the default location
pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_settings_to(&get_settings_path(), settings)
}

/// Load app settings with partial recovery and migration
pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        log::info!("Settings file not found at {}, using defaults", path.display());
        return AppSettings::default();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Failed to read settings file {}: {}", path.display(), e);
            return AppSettings::default();
        }
    };

    match serde_json::from_str::<AppSettings>(&content) {
        Ok(settings) => return migrate_settings(settings, path),
        Err(e) => {
            log::warn!("Failed to parse settings directly: {}, attempting partial recovery", e);
        }
    }

    match recover_settings_from_json(&content) {
        Ok(settings) => {
            log::info!("Successfully recovered settings with partial data");
            let settings = migrate_settings(settings, path);
            if let Err(e) = save_settings_to(path, &settings) {
                log::warn!("Failed to save recovered settings: {}", e);
            }
            settings
        }
        Err(e) => {
            log::error!("Failed to recover settings from {}: {}", path.display(), e);
            log::error!("Using default settings. Your old settings file has been preserved.");
            AppSettings::default()
        }
    }
}

/// Extract valid fields from a malformed settings file, defaulting the rest
fn recover_settings_from_json(content: &str) -> Result<AppSettings> {
    use anyhow::Context;

    let value: serde_json::Value =
        serde_json::from_str(content).context("Settings file is not valid JSON")?;
    let obj = value
        .as_object()
        .context("Settings file root is not a JSON object")?;

    let mut settings = AppSettings::default();

    if let Some(v) = obj.get("version").and_then(|v| v.as_u64()) {
        settings.version = v as u32;
    }

    if let Some(v) = obj.get("bootstrap") {
        if let Ok(bootstrap) = serde_json::from_value::<BootstrapConfig>(v.clone()) {
            settings.bootstrap = bootstrap;
        } else {
            log::warn!("Could not parse bootstrap settings, using default");
        }
    }

    if let Some(v) = obj.get("last_server").and_then(|v| v.as_str()) {
        settings.last_server = Some(v.to_string());
    }

    Ok(settings)
}

/// Migrate settings from older versions to the current version
fn migrate_settings(mut settings: AppSettings, path: &Path) -> AppSettings {
    let original_version = settings.version;

    if settings.version == 0 {
        log::info!("Migrating settings from pre-versioning (v0) to v1");
        settings.version = 1;
    }

    if settings.version < SETTINGS_VERSION {
        log::warn!(
            "Settings version {} is older than current version {}, some settings may use defaults",
            original_version,
            SETTINGS_VERSION
        );
        settings.version = SETTINGS_VERSION;
    }

    if original_version != settings.version {
        log::info!("Settings migrated from v{} to v{}", original_version, settings.version);
        if let Err(e) = save_settings_to(path, &settings) {
            log::warn!("Failed to save migrated settings: {}", e);
        }
    }

    settings
}

/// Save app settings to `path`
pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)?;
    write_private(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json"));
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.bootstrap, BootstrapConfig::default());
        assert!(settings.last_server.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = AppSettings::default();
        settings.bootstrap.url_rules.default_domain = "example.org".to_string();
        settings.last_server = Some("https://team.example.org".to_string());

        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path);

        assert_eq!(loaded.bootstrap.url_rules.default_domain, "example.org");
        assert_eq!(loaded.last_server.as_deref(), Some("https://team.example.org"));
    }

    #[test]
    fn partial_recovery_keeps_valid_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"version": 1, "bootstrap": {"history_limit": "lots"}, "last_server": "https://acme.rocket.chat"}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path);

        assert_eq!(settings.last_server.as_deref(), Some("https://acme.rocket.chat"));
        assert_eq!(settings.bootstrap, BootstrapConfig::default());
    }

    #[test]
    fn garbage_falls_back_to_defaults_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json at all").unwrap();

        let settings = load_settings_from(&path);

        assert!(settings.last_server.is_none());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json at all");
    }

    #[test]
    fn v0_settings_are_migrated_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"version": 0}"#).unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.version, 1);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\"version\": 1"));
    }

    #[test]
    fn last_server_becomes_initial_input() {
        let mut settings = AppSettings::default();
        settings.bootstrap.initial_server = "fallback".to_string();
        assert_eq!(settings.bootstrap_config().initial_server, "fallback");

        settings.last_server = Some("https://acme.rocket.chat".to_string());
        assert_eq!(
            settings.bootstrap_config().initial_server,
            "https://acme.rocket.chat"
        );
    }
}
