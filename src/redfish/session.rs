//! Run context and per-host session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

use super::client::RedfishClient;
use super::error::Result;
use super::locator;
use super::transport::Connector;
use super::types::{BootDevice, ResourcePaths};
use crate::config::types::RunConfig;

/// State shared by every session of one run: the config, the request
/// permit pool and the cancellation flag. Built once in `main` and passed
/// down explicitly.
pub struct RunContext {
    pub config: RunConfig,
    pub permits: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    connector: Arc<dyn Connector>,
}

impl RunContext {
    pub fn new(config: RunConfig, connector: Arc<dyn Connector>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Self {
            config,
            permits,
            cancelled: Arc::new(AtomicBool::new(false)),
            connector,
        }
    }

    /// Flag that stops every session of the run from sending anything new.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Connect to `host` and locate its resources.
    pub async fn open_session(&self, host: &str) -> Result<HostSession> {
        let transport = self.connector.connect(host)?;
        let client = RedfishClient::new(
            host,
            transport,
            self.permits.clone(),
            self.config.cache_capacity,
        )
        .with_cancellation(self.cancel_flag());
        HostSession::open(client, &self.config).await
    }
}

/// Everything one host's action needs. Owned by that action only.
pub struct HostSession {
    pub host: String,
    pub client: RedfishClient,
    pub paths: ResourcePaths,
    pub retries: u32,
    pub short_poll: Duration,
    pub long_poll: Duration,
    /// Draw the polling progress bar on stdout (single-host runs)
    pub progress_bar: bool,
    boot_devices: Mutex<Option<Vec<BootDevice>>>,
}

impl HostSession {
    pub async fn open(client: RedfishClient, config: &RunConfig) -> Result<Self> {
        let paths = locator::locate(&client).await?;
        let host = client.host().to_string();
        debug!(
            "Session ready for {}: system={} manager={}",
            host, paths.system, paths.manager
        );

        Ok(Self {
            host,
            client,
            paths,
            retries: config.retries,
            short_poll: config.short_poll(),
            long_poll: config.long_poll(),
            progress_bar: false,
            boot_devices: Mutex::new(None),
        })
    }

    pub fn system_path(&self, suffix: &str) -> String {
        format!("{}{}", self.paths.system, suffix)
    }

    pub fn manager_path(&self, suffix: &str) -> String {
        format!("{}{}", self.paths.manager, suffix)
    }

    pub(crate) async fn cached_boot_devices(&self) -> Option<Vec<BootDevice>> {
        self.boot_devices.lock().await.clone()
    }

    pub(crate) async fn store_boot_devices(&self, devices: Vec<BootDevice>) {
        *self.boot_devices.lock().await = Some(devices);
    }
}
