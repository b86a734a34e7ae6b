//! Redfish request layer, resource discovery and per-host session.

pub mod cache;
pub mod client;
pub mod error;
pub mod locator;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use client::Fetch;
pub use error::{RedfishError, Result};
pub use session::{HostSession, RunContext};
pub use transport::{Credentials, HttpConnector};
pub use types::{BootDevice, BootSequence, PowerState, Reply};
