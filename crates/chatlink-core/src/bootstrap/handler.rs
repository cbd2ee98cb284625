use super::types::ConnectionIntent;
use crate::certificate::CertificatePicker;

use std::future::Future;

/// Platform-specific operations the bootstrap controller delegates to.
///
/// The desktop or mobile shell implements this over its own navigation,
/// session store and dialogs. The dispatch methods are fire-and-forget and
/// are called on the controller's thread; the async ones run on the
/// controller's runtime.
pub trait BootstrapHandler: CertificatePicker {
    /// Start connecting. Retries, timeouts and auth challenges are the
    /// connection manager's business.
    fn connect(&self, intent: ConnectionIntent);
    /// Switch the active session back to `server`.
    fn select_previous_server(&self, server: &str);
    /// Drop any invite link waiting to be handled.
    fn clear_pending_invite(&self);
    /// Yes/no prompt.
    fn confirm(&self, message: &str) -> impl Future<Output = bool> + Send;
}
