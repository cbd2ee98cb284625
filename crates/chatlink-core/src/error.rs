use thiserror::Error;

/// Failure kinds of the connection bootstrap flow.
///
/// Only `InvalidInput` and `Closed` are ever returned from a submit; the
/// other kinds are logged and swallowed where they occur.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Input normalized to nothing that could name a host.
    #[error("no server address in input {0:?}")]
    InvalidInput(String),
    /// History or credential storage could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] anyhow::Error),
    /// User dismissed the certificate picker.
    #[error("certificate selection cancelled")]
    PickerCancelled,
    /// A history entry could not be deleted.
    #[error("failed to delete history entry {id}: {source}")]
    DeleteFailed {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    /// The flow is already returning to the previous server.
    #[error("bootstrap is closing")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_failed_message_names_entry() {
        let err = BootstrapError::DeleteFailed {
            id: "abc".to_string(),
            source: anyhow::anyhow!("disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("disk full"));
    }
}
