//! Server address resolution and connection bootstrap for the chat client.
//!
//! Turns free-form server input into a canonical URL, keeps the recent
//! server list, carries an optional client certificate and embedded basic-auth
//! credentials, and hands a `ConnectionIntent` to the platform's connection
//! manager.

pub mod bootstrap;
pub mod certificate;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod url;

pub use bootstrap::{
    BootstrapController, BootstrapEvent, BootstrapHandler, BootstrapPhase, BootstrapState,
    BootstrapStores, ConnectionIntent, DeepLinkEvent,
};
pub use certificate::{Certificate, CertificatePicker, CertificateSelector};
pub use config::BootstrapConfig;
pub use credentials::{Credential, CredentialStore};
pub use error::BootstrapError;
pub use history::{HistoryRepository, HistoryStore, MemoryHistoryStore, ServerHistoryEntry};
pub use url::{normalize, CanonicalUrl, UrlRules};
