use crate::certificate::Certificate;
use crate::history::ServerHistoryEntry;
use crate::url::CanonicalUrl;

use serde::{Deserialize, Serialize};

/// What the controller hands to the connection manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionIntent {
    pub url: CanonicalUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    /// Username remembered for this server, when picked from history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Base64 `user:pass` extracted from the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<String>,
}

/// Where the bootstrap flow is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootstrapPhase {
    /// Waiting for input
    #[default]
    Idle,
    /// Normalizing input and building the intent
    Resolving,
    /// Intent handed to the connection manager
    Dispatched,
    /// Returning to the previous server; terminal
    Closing,
}

/// A server address delivered from outside, e.g. an opened invite link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLinkEvent {
    pub server: String,
}

/// Results of background work, applied on the owning thread by
/// `BootstrapController::handle_event`.
#[derive(Clone, Debug)]
pub enum BootstrapEvent {
    /// A history query finished. Only the latest issued generation is applied.
    HistoryLoaded {
        generation: u64,
        entries: Vec<ServerHistoryEntry>,
    },
    /// A history entry was deleted from storage
    HistoryRemoved { id: String },
    /// The user picked a certificate
    CertificatePicked(Certificate),
    /// The user confirmed removing the certificate at `path`
    CertificateRemovalConfirmed { path: String },
    /// A deep link arrived
    DeepLink(DeepLinkEvent),
}

/// Session-scoped state of one bootstrap flow. Cloned for rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapState {
    pub text: String,
    pub phase: BootstrapPhase,
    pub history: Vec<ServerHistoryEntry>,
    pub certificate: Option<Certificate>,
    /// Server that was active when this flow opened, if any
    pub previous_server: Option<String>,
}

impl BootstrapState {
    /// Back navigation returns to the previous server.
    pub fn can_go_back(&self) -> bool {
        self.previous_server.is_some() && self.phase != BootstrapPhase::Closing
    }
}

/// User actions worth counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageEvent {
    ConnectToWorkspace,
    JoinOpenWorkspace,
    DeepLinkReceived,
    CertificatePicked,
    CertificateRemoved,
    HistoryEntryRemoved,
}

impl UsageEvent {
    pub fn name(self) -> &'static str {
        match self {
            UsageEvent::ConnectToWorkspace => "new_server_connect_to_workspace",
            UsageEvent::JoinOpenWorkspace => "new_server_join_open_workspace",
            UsageEvent::DeepLinkReceived => "new_server_deep_link",
            UsageEvent::CertificatePicked => "new_server_certificate_picked",
            UsageEvent::CertificateRemoved => "new_server_certificate_removed",
            UsageEvent::HistoryEntryRemoved => "new_server_history_removed",
        }
    }

    pub fn log(self) {
        log::info!(target: "chatlink::usage", "{}", self.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_omits_empty_optionals() {
        let intent = ConnectionIntent {
            url: crate::url::normalize("acme", &Default::default()).unwrap(),
            certificate: None,
            username: None,
            basic_auth: None,
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert_eq!(json, r#"{"url":"https://acme.rocket.chat"}"#);
    }

    #[test]
    fn can_go_back_needs_previous_server() {
        let mut state = BootstrapState::default();
        assert!(!state.can_go_back());
        state.previous_server = Some("https://old.example.com".to_string());
        assert!(state.can_go_back());
        state.phase = BootstrapPhase::Closing;
        assert!(!state.can_go_back());
    }
}
