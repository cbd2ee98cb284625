use serde::{Deserialize, Serialize};
use std::future::Future;

/// Client TLS certificate chosen by the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub path: String,
    pub display_name: String,
}

impl Certificate {
    /// Build from a picker result, which may hand back a `file://` URI.
    pub fn from_picked_uri(uri: &str, display_name: impl Into<String>) -> Self {
        Self {
            path: uri.replace("file://", ""),
            display_name: display_name.into(),
        }
    }
}

/// Platform file chooser for client certificates.
pub trait CertificatePicker: Send + Sync + 'static {
    /// `Ok(None)` when the user dismissed the chooser.
    fn pick_certificate(&self) -> impl Future<Output = anyhow::Result<Option<Certificate>>> + Send;
}

/// Holds the certificate selected for the current bootstrap attempt.
#[derive(Clone, Debug, Default)]
pub struct CertificateSelector {
    current: Option<Certificate>,
}

impl CertificateSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Certificate> {
        self.current.as_ref()
    }

    /// Apply a picker outcome. Cancellation and errors keep the previous
    /// certificate. Returns whether the selection changed.
    pub fn apply_pick(&mut self, outcome: anyhow::Result<Option<Certificate>>) -> bool {
        match outcome {
            Ok(Some(certificate)) => {
                log::info!("Using client certificate {}", certificate.display_name);
                self.current = Some(certificate);
                true
            }
            Ok(None) => {
                log::debug!("{}", crate::error::BootstrapError::PickerCancelled);
                false
            }
            Err(e) => {
                log::warn!("Certificate picker failed: {:#}", e);
                false
            }
        }
    }

    /// Ask the picker and apply its outcome.
    pub async fn pick<P: CertificatePicker>(&mut self, picker: &P) -> Option<&Certificate> {
        let outcome = picker.pick_certificate().await;
        self.apply_pick(outcome);
        self.current()
    }

    pub fn clear(&mut self) {
        if let Some(old) = self.current.take() {
            log::info!("Cleared client certificate {}", old.display_name);
        }
    }
}
