use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::url::UrlRules;

use serde::{Deserialize, Serialize};

/// Public workspace reachable without an invitation.
pub const DEFAULT_OPEN_WORKSPACE_URL: &str = "https://open.rocket.chat";

/// Settings for one bootstrap flow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub url_rules: UrlRules,
    /// Input submitted automatically when the flow starts (empty = none)
    #[serde(default)]
    pub initial_server: String,
    #[serde(default = "default_open_workspace_url")]
    pub open_workspace_url: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Submit `initial_server` on construction
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

fn default_open_workspace_url() -> String {
    DEFAULT_OPEN_WORKSPACE_URL.to_string()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_auto_connect() -> bool {
    true
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            url_rules: UrlRules::default(),
            initial_server: String::new(),
            open_workspace_url: default_open_workspace_url(),
            history_limit: default_history_limit(),
            auto_connect: default_auto_connect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: BootstrapConfig = serde_json::from_str(r#"{"initial_server":"acme"}"#).unwrap();
        assert_eq!(config.initial_server, "acme");
        assert_eq!(config.history_limit, 3);
        assert!(config.auto_connect);
        assert_eq!(config.url_rules.loopback_host, "localhost");
        assert_eq!(config.open_workspace_url, DEFAULT_OPEN_WORKSPACE_URL);
    }
}
