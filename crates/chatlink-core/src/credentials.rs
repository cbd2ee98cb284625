use crate::url::{split_userinfo, CanonicalUrl};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Storage key prefix for basic-auth credentials; the server URL follows a dash.
pub const BASIC_AUTH_KEY: &str = "basic_auth";

/// Basic-auth credential extracted from a URL, keyed by canonical server URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub server_key: String,
    /// Base64 of `user:pass`
    pub encoded_auth: String,
}

impl Credential {
    /// Key under which this credential is persisted.
    pub fn storage_key(&self) -> String {
        storage_key(&self.server_key)
    }

    /// Value for an `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Basic {}", self.encoded_auth)
    }
}

pub fn storage_key(server: &str) -> String {
    format!("{}-{}", BASIC_AUTH_KEY, server)
}

/// Secure key-value storage for extracted credentials.
pub trait CredentialStore: Send + Sync + 'static {
    fn set_credential(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn get_credential(&self, key: &str) -> anyhow::Result<Option<String>>;
}

/// Pull embedded `user:pass` out of the raw input and bind it to the
/// canonical URL the input normalized to.
///
/// Best-effort: input without credentials yields `None`.
pub fn extract(raw_input: &str, target: &CanonicalUrl) -> Option<Credential> {
    let (userinfo, _) = split_userinfo(raw_input)?;
    Some(Credential {
        server_key: target.as_str().to_string(),
        encoded_auth: STANDARD.encode(userinfo),
    })
}

/// Persist a credential, logging instead of failing.
pub fn save(store: &dyn CredentialStore, credential: &Credential) {
    match store.set_credential(&credential.storage_key(), &credential.encoded_auth) {
        Ok(()) => log::debug!("Saved basic auth for {}", credential.server_key),
        Err(e) => log::warn!(
            "Failed to save basic auth for {}: {:#}",
            credential.server_key,
            e
        ),
    }
}
