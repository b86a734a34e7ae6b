//! Request layer: permit-bounded, cached access to one controller.
//!
//! Every call waits for a permit from the run-wide pool before it touches the
//! network. GET replies are memoized per session; writes are never cached.
//! Tolerant calls report transient failures as [`Fetch::Absent`] instead of
//! failing, so poll loops can spend a retry and keep going. Once the run is
//! cancelled every new call fails with [`RedfishError::Interrupted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error};

use super::cache::ReplyCache;
use super::error::{RedfishError, Result};
use super::transport::{Method, Request, Transport};
use super::types::Reply;

/// Outcome of a tolerant call.
#[derive(Debug)]
pub enum Fetch {
    Success(Reply),
    /// Timeout or connection error; the caller decides what that means
    Absent,
    Fatal(RedfishError),
}

impl Fetch {
    /// Treat absence as a communication failure.
    pub fn required(self, host: &str) -> Result<Reply> {
        match self {
            Fetch::Success(reply) => Ok(reply),
            Fetch::Absent => {
                error!("Failed to communicate with server.");
                Err(RedfishError::CommunicationFailure(host.to_string()))
            }
            Fetch::Fatal(e) => Err(e),
        }
    }
}

pub struct RedfishClient {
    host: String,
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    cache: Mutex<ReplyCache>,
}

impl RedfishClient {
    pub fn new(
        host: impl Into<String>,
        transport: Arc<dyn Transport>,
        permits: Arc<Semaphore>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            host: host.into(),
            transport,
            permits,
            cancelled: Arc::new(AtomicBool::new(false)),
            cache: Mutex::new(ReplyCache::new(cache_capacity)),
        }
    }

    /// Share the run's cancellation flag.
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Strict, cached GET.
    pub async fn get(&self, path: &str) -> Result<Reply> {
        self.get_tolerant(path).await.required(&self.host)
    }

    /// Tolerant, cached GET. Absent replies are not cached.
    pub async fn get_tolerant(&self, path: &str) -> Fetch {
        if let Some(reply) = self.cache.lock().await.get(path) {
            debug!("cache hit: {}", path);
            return Fetch::Success(reply);
        }

        let fetch = self.dispatch(Request::get(path)).await;
        if let Fetch::Success(reply) = &fetch {
            self.cache.lock().await.insert(path, reply.clone());
        }
        fetch
    }

    /// Tolerant GET that bypasses the cache. Poll loops use this; a memoized
    /// reply would never show the state change they wait for.
    pub async fn refresh(&self, path: &str) -> Fetch {
        self.dispatch(Request::get(path)).await
    }

    pub async fn post(&self, path: &str, payload: &Value) -> Result<Reply> {
        self.dispatch(Request::with_body(Method::Post, path, payload.clone()))
            .await
            .required(&self.host)
    }

    pub async fn patch(&self, path: &str, payload: &Value) -> Result<Reply> {
        self.patch_tolerant(path, payload)
            .await
            .required(&self.host)
    }

    pub async fn patch_tolerant(&self, path: &str, payload: &Value) -> Fetch {
        self.dispatch(Request::with_body(Method::Patch, path, payload.clone()))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Reply> {
        self.dispatch(Request::delete(path))
            .await
            .required(&self.host)
    }

    fn interrupted(&self) -> Option<Fetch> {
        if self.cancelled.load(Ordering::SeqCst) {
            Some(Fetch::Fatal(RedfishError::Interrupted(self.host.clone())))
        } else {
            None
        }
    }

    async fn dispatch(&self, request: Request) -> Fetch {
        if let Some(fetch) = self.interrupted() {
            return fetch;
        }

        // Held until the reply (or error) is back
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Fetch::Fatal(RedfishError::CommunicationFailure(format!(
                    "{} (request pool closed)",
                    self.host
                )))
            }
        };

        // The flag may have been raised while this call queued for a permit
        if let Some(fetch) = self.interrupted() {
            return fetch;
        }

        match self.transport.send(&request).await {
            Ok(reply) => Fetch::Success(reply),
            Err(e) if e.is_transient() => {
                debug!("{} {} failed: {}", request.method, request.path, e);
                Fetch::Absent
            }
            Err(e) => Fetch::Fatal(RedfishError::CommunicationFailure(format!(
                "{}: {}",
                self.host, e
            ))),
        }
    }
}
