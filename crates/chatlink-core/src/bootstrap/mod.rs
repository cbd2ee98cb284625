pub mod controller;
pub mod handler;
pub mod types;

pub use controller::{BootstrapController, BootstrapStores, REMOVE_CERTIFICATE_MESSAGE};
pub use handler::BootstrapHandler;
pub use types::{
    BootstrapEvent, BootstrapPhase, BootstrapState, ConnectionIntent, DeepLinkEvent, UsageEvent,
};
