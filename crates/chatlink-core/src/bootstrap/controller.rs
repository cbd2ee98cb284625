use super::handler::BootstrapHandler;
use super::types::{
    BootstrapEvent, BootstrapPhase, BootstrapState, ConnectionIntent, DeepLinkEvent, UsageEvent,
};
use crate::certificate::CertificateSelector;
use crate::config::BootstrapConfig;
use crate::credentials::{self, CredentialStore};
use crate::error::BootstrapError;
use crate::history::{HistoryRepository, HistoryStore, ServerHistoryEntry};
use crate::url::{normalize, CanonicalUrl};

use std::collections::HashSet;
use std::sync::Arc;

/// Prompt shown before dropping the selected certificate.
pub const REMOVE_CERTIFICATE_MESSAGE: &str = "You will unset a certificate for this server";

/// Storage backends used by one bootstrap flow.
#[derive(Clone)]
pub struct BootstrapStores {
    pub history: Arc<dyn HistoryStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// Drives one "connect to a server" flow, from typed or linked input to a
/// dispatched `ConnectionIntent`.
///
/// Owned by a single thread. Storage, picker and prompt calls run on the
/// runtime and report back through the event channel; the owner feeds those
/// events to `handle_event` (or calls `pump`). None of that background work
/// can hold up a connect.
pub struct BootstrapController<H: BootstrapHandler> {
    config: BootstrapConfig,
    runtime: Arc<tokio::runtime::Runtime>,
    handler: Arc<H>,
    history: HistoryRepository,
    credentials: Arc<dyn CredentialStore>,
    event_tx: async_channel::Sender<BootstrapEvent>,
    event_rx: async_channel::Receiver<BootstrapEvent>,
    deep_link_task: Option<tokio::task::AbortHandle>,
    state: BootstrapState,
    certificate: CertificateSelector,
    /// Generation of the most recently issued history query
    query_generation: u64,
    /// Ids deleted during this flow; late query results must not bring them back
    removed_ids: HashSet<String>,
}

impl<H: BootstrapHandler> BootstrapController<H> {
    /// Create the controller, subscribe to `deep_links` for its lifetime,
    /// submit the configured initial server and load suggestions.
    pub fn new(
        config: BootstrapConfig,
        runtime: Arc<tokio::runtime::Runtime>,
        handler: Arc<H>,
        stores: BootstrapStores,
        deep_links: async_channel::Receiver<DeepLinkEvent>,
        previous_server: Option<String>,
    ) -> Self {
        let (event_tx, event_rx) = async_channel::bounded::<BootstrapEvent>(256);

        let forward_tx = event_tx.clone();
        let deep_link_task = runtime.spawn(async move {
            while let Ok(link) = deep_links.recv().await {
                if forward_tx.send(BootstrapEvent::DeepLink(link)).await.is_err() {
                    break;
                }
            }
            log::debug!("Deep link subscription ended");
        });

        let history = HistoryRepository::new(stores.history, config.history_limit);
        let state = BootstrapState {
            text: config.initial_server.clone(),
            previous_server,
            ..Default::default()
        };

        let mut controller = Self {
            config,
            runtime,
            handler,
            history,
            credentials: stores.credentials,
            event_tx,
            event_rx,
            deep_link_task: Some(deep_link_task.abort_handle()),
            state,
            certificate: CertificateSelector::new(),
            query_generation: 0,
            removed_ids: HashSet::new(),
        };

        if controller.config.auto_connect && !controller.state.text.trim().is_empty() {
            if let Err(e) = controller.submit() {
                log::warn!("Initial connect skipped: {}", e);
            }
        }
        controller.query_history(None);

        controller
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.state.phase
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    pub fn history(&self) -> &[ServerHistoryEntry] {
        &self.state.history
    }

    /// Copy of the current state for rendering.
    pub fn snapshot(&self) -> BootstrapState {
        let mut state = self.state.clone();
        state.certificate = self.certificate.current().cloned();
        state
    }

    /// Receiver for background results, for owners running their own loop.
    pub fn events(&self) -> async_channel::Receiver<BootstrapEvent> {
        self.event_rx.clone()
    }

    /// Wait for the next background result.
    pub async fn next_event(&self) -> Option<BootstrapEvent> {
        self.event_rx.recv().await.ok()
    }

    /// Apply every result that is already waiting. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// The input text changed: remember it and refresh suggestions.
    pub fn on_text_changed(&mut self, text: impl Into<String>) {
        self.state.text = text.into();
        let filter = self.state.text.clone();
        self.query_history(Some(filter));
    }

    /// Connect to whatever is in the input.
    pub fn submit(&mut self) -> Result<ConnectionIntent, BootstrapError> {
        UsageEvent::ConnectToWorkspace.log();
        let input = self.state.text.clone();
        self.submit_input(&input, None)
    }

    /// Connect to a history suggestion, passing its username along.
    pub fn select_history(
        &mut self,
        entry: &ServerHistoryEntry,
    ) -> Result<ConnectionIntent, BootstrapError> {
        UsageEvent::ConnectToWorkspace.log();
        self.state.text = entry.url.clone();
        self.submit_input(&entry.url, entry.username.clone())
    }

    /// Connect to the public open workspace.
    pub fn connect_open_workspace(&mut self) -> Result<ConnectionIntent, BootstrapError> {
        UsageEvent::JoinOpenWorkspace.log();
        let url = self.config.open_workspace_url.clone();
        self.state.text = url.clone();
        self.submit_input(&url, None)
    }

    fn submit_input(
        &mut self,
        input: &str,
        username: Option<String>,
    ) -> Result<ConnectionIntent, BootstrapError> {
        if self.state.phase == BootstrapPhase::Closing {
            return Err(BootstrapError::Closed);
        }
        self.state.phase = BootstrapPhase::Resolving;

        let url = match normalize(input, &self.config.url_rules) {
            Ok(url) => url,
            Err(e) => {
                self.state.phase = BootstrapPhase::Idle;
                return Err(e);
            }
        };

        let credential = credentials::extract(input, &url);
        if let Some(credential) = credential.clone() {
            let store = self.credentials.clone();
            self.runtime.spawn_blocking(move || {
                credentials::save(store.as_ref(), &credential);
            });
        }

        let intent = ConnectionIntent {
            url,
            certificate: self.certificate.current().cloned(),
            username,
            basic_auth: credential.map(|c| c.encoded_auth),
        };

        log::info!("Connecting to {}", intent.url);
        self.handler.connect(intent.clone());
        self.state.phase = BootstrapPhase::Dispatched;
        Ok(intent)
    }

    /// Remember a server after the connection manager got through to it.
    ///
    /// The write runs in the background; await the handle to know it landed.
    pub fn record_connection(
        &self,
        url: &CanonicalUrl,
        username: Option<&str>,
    ) -> tokio::task::JoinHandle<bool> {
        let history = self.history.clone();
        let url = url.clone();
        let username = username.map(str::to_string);
        self.runtime.spawn_blocking(move || match history.record(&url, username.as_deref()) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to record {} in history: {:#}", url, e);
                false
            }
        })
    }

    fn query_history(&mut self, filter: Option<String>) -> u64 {
        self.query_generation += 1;
        let generation = self.query_generation;
        let history = self.history.clone();
        let tx = self.event_tx.clone();
        self.runtime.spawn_blocking(move || {
            let entries = history.query(filter.as_deref());
            let _ = tx.send_blocking(BootstrapEvent::HistoryLoaded {
                generation,
                entries,
            });
        });
        generation
    }

    /// Delete a history entry. The view drops it once storage confirms; on
    /// failure the entry stays.
    pub fn remove_history(&self, entry: &ServerHistoryEntry) -> tokio::task::JoinHandle<()> {
        let history = self.history.clone();
        let entry = entry.clone();
        let tx = self.event_tx.clone();
        self.runtime.spawn_blocking(move || match history.remove(&entry) {
            Ok(()) => {
                UsageEvent::HistoryEntryRemoved.log();
                let _ = tx.send_blocking(BootstrapEvent::HistoryRemoved { id: entry.id });
            }
            Err(e) => log::warn!("{:#}", e),
        })
    }

    /// Open the platform certificate chooser.
    pub fn choose_certificate(&self) {
        let handler = self.handler.clone();
        let tx = self.event_tx.clone();
        self.runtime.spawn(async move {
            let mut selector = CertificateSelector::new();
            if let Some(certificate) = selector.pick(handler.as_ref()).await {
                UsageEvent::CertificatePicked.log();
                let _ = tx
                    .send(BootstrapEvent::CertificatePicked(certificate.clone()))
                    .await;
            }
        });
    }

    /// Ask before unsetting the certificate; a declined prompt changes nothing.
    ///
    /// `None` when no certificate is selected.
    pub fn request_certificate_removal(&self) -> Option<tokio::task::JoinHandle<()>> {
        let path = self.certificate.current().map(|c| c.path.clone())?;
        let handler = self.handler.clone();
        let tx = self.event_tx.clone();
        Some(self.runtime.spawn(async move {
            if handler.confirm(REMOVE_CERTIFICATE_MESSAGE).await {
                let _ = tx
                    .send(BootstrapEvent::CertificateRemovalConfirmed { path })
                    .await;
            } else {
                log::debug!("Certificate removal declined");
            }
        }))
    }

    /// Back / close. Returns `true` if the flow handled it by returning to the
    /// previous server; `false` leaves it to outer navigation.
    pub fn handle_back(&mut self) -> bool {
        if !self.state.can_go_back() {
            return false;
        }
        let Some(previous) = self.state.previous_server.clone() else {
            return false;
        };

        log::info!("Returning to previous server {}", previous);
        self.handler.clear_pending_invite();
        self.handler.select_previous_server(&previous);
        self.state.phase = BootstrapPhase::Closing;
        true
    }

    pub fn handle_event(&mut self, event: BootstrapEvent) {
        match event {
            BootstrapEvent::HistoryLoaded {
                generation,
                mut entries,
            } => {
                if generation != self.query_generation {
                    log::trace!(
                        "Discarding history result {} (latest {})",
                        generation,
                        self.query_generation
                    );
                    return;
                }
                entries.retain(|e| !self.removed_ids.contains(&e.id));
                self.state.history = entries;
            }
            BootstrapEvent::HistoryRemoved { id } => {
                self.state.history.retain(|e| e.id != id);
                self.removed_ids.insert(id);
            }
            BootstrapEvent::CertificatePicked(certificate) => {
                self.certificate.apply_pick(Ok(Some(certificate)));
            }
            BootstrapEvent::CertificateRemovalConfirmed { path } => {
                if self.certificate.current().is_some_and(|c| c.path == path) {
                    UsageEvent::CertificateRemoved.log();
                    self.certificate.clear();
                }
            }
            BootstrapEvent::DeepLink(DeepLinkEvent { server }) => {
                if server.trim().is_empty() {
                    return;
                }
                UsageEvent::DeepLinkReceived.log();
                self.state.text = server.clone();
                if let Err(e) = self.submit_input(&server, None) {
                    log::warn!("Ignoring deep link {:?}: {}", server, e);
                }
            }
        }
    }
}

impl<H: BootstrapHandler> Drop for BootstrapController<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.deep_link_task.take() {
            handle.abort();
        }
    }
}
