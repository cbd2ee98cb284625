use chatlink_core::{BootstrapHandler, Certificate, CertificatePicker, ConnectionIntent};

use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;

/// Platform handler for a terminal session.
///
/// There is no connection manager behind it: a dispatched intent is printed
/// as JSON on stdout for whatever consumes this process's output.
pub struct HeadlessHandler {
    cert_path: Option<PathBuf>,
    last_intent: Mutex<Option<ConnectionIntent>>,
}

impl HeadlessHandler {
    pub fn new(cert_path: Option<PathBuf>) -> Self {
        Self {
            cert_path,
            last_intent: Mutex::new(None),
        }
    }

    /// The most recent intent passed to `connect`
    pub fn last_intent(&self) -> Option<ConnectionIntent> {
        self.last_intent.lock().clone()
    }
}

impl CertificatePicker for HeadlessHandler {
    async fn pick_certificate(&self) -> anyhow::Result<Option<Certificate>> {
        let Some(path) = self.cert_path.as_ref() else {
            return Ok(None);
        };
        if !path.is_file() {
            anyhow::bail!("certificate {} does not exist", path.display());
        }
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Some(Certificate::from_picked_uri(
            &path.to_string_lossy(),
            display_name,
        )))
    }
}

impl BootstrapHandler for HeadlessHandler {
    fn connect(&self, intent: ConnectionIntent) {
        match serde_json::to_string_pretty(&intent) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize connect intent: {}", e),
        }
        *self.last_intent.lock() = Some(intent);
    }

    fn select_previous_server(&self, server: &str) {
        log::info!("Switching back to {}", server);
    }

    fn clear_pending_invite(&self) {
        log::debug!("No pending invite to clear");
    }

    async fn confirm(&self, message: &str) -> bool {
        let message = message.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            print!("{} [y/N] ", message);
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(e)) => {
                log::warn!("Failed to read confirmation: {}", e);
                false
            }
            Err(e) => {
                log::warn!("Confirmation prompt task failed: {}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
