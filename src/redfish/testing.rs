//! Scripted in-memory controller used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use super::client::RedfishClient;
use super::session::{HostSession, RunContext};
use super::transport::{Connector, Method, Request, Transport, TransportError};
use super::types::Reply;
use super::error::Result;
use crate::config::types::RunConfig;

pub const SYSTEM: &str = "/redfish/v1/Systems/System.Embedded.1";
pub const MANAGER: &str = "/redfish/v1/Managers/iDRAC.Embedded.1";

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Reply),
    Transient,
}

/// Each route answers from a queue; the last entry repeats forever.
#[derive(Default)]
pub struct MockController {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    log: Mutex<Vec<Request>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller with a service root, one system and one manager.
    pub fn dell() -> Self {
        let mock = Self::new();
        mock.on_get(
            "/redfish/v1",
            200,
            json!({
                "Systems": {"@odata.id": "/redfish/v1/Systems"},
                "Managers": {"@odata.id": "/redfish/v1/Managers"}
            }),
        );
        mock.on_get(
            "/redfish/v1/Systems",
            200,
            json!({"Members": [{"@odata.id": SYSTEM}]}),
        );
        mock.on_get(
            "/redfish/v1/Managers",
            200,
            json!({"Members": [{"@odata.id": MANAGER}]}),
        );
        mock
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) {
        self.on_reply(method, path, Reply::new(status, body.to_string()));
    }

    pub fn on_get(&self, path: &str, status: u16, body: Value) {
        self.on(Method::Get, path, status, body);
    }

    pub fn on_reply(&self, method: Method, path: &str, reply: Reply) {
        self.push(method, path, Scripted::Reply(reply));
    }

    pub fn on_transient(&self, method: Method, path: &str) {
        self.push(method, path, Scripted::Transient);
    }

    /// Drop whatever was scripted for a route.
    pub fn clear(&self, method: Method, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .remove(&(method, path.to_string()));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Bodies of every request sent with `method` to `path`, in order.
    pub fn bodies(&self, method: Method, path: &str) -> Vec<Value> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .filter_map(|r| r.body.clone())
            .collect()
    }

    /// `ResetType` values posted to the system reset action, in order.
    pub fn resets(&self) -> Vec<String> {
        self.bodies(
            Method::Post,
            &format!("{}/Actions/ComputerSystem.Reset", SYSTEM),
        )
        .iter()
        .filter_map(|b| b.get("ResetType").and_then(|v| v.as_str()).map(str::to_string))
        .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
    }

    fn next(&self, method: Method, path: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(method, path.to_string()))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockController {
    async fn send(&self, request: &Request) -> std::result::Result<Reply, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.log.lock().unwrap().push(request.clone());

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = match self.next(request.method, &request.path) {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Transient) => Err(TransportError::Timeout),
            None => Ok(Reply::new(404, "{}")),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Hands out the same controller for every host, or per-host controllers
/// when registered.
#[derive(Default)]
pub struct MockConnector {
    shared: Option<Arc<MockController>>,
    hosts: HashMap<String, Arc<MockController>>,
}

impl MockConnector {
    pub fn shared(mock: Arc<MockController>) -> Self {
        Self {
            shared: Some(mock),
            hosts: HashMap::new(),
        }
    }

    pub fn per_host(hosts: Vec<(&str, Arc<MockController>)>) -> Self {
        Self {
            shared: None,
            hosts: hosts
                .into_iter()
                .map(|(h, m)| (h.to_string(), m))
                .collect(),
        }
    }
}

impl Connector for MockConnector {
    fn connect(&self, host: &str) -> Result<Arc<dyn Transport>> {
        let mock: Arc<dyn Transport> = self
            .hosts
            .get(host)
            .or(self.shared.as_ref())
            .cloned()
            .unwrap_or_default();
        Ok(mock)
    }
}

/// System resource body with a power state and the usual reset types.
pub fn system_state(state: &str) -> Value {
    json!({
        "PowerState": state,
        "Actions": {
            "#ComputerSystem.Reset": {
                "ResetType@Redfish.AllowableValues": ["On", "ForceOff", "GracefulRestart", "ForceRestart"]
            }
        }
    })
}

/// Script successive system reads; the last state repeats.
pub fn script_power(mock: &MockController, states: &[&str]) {
    for state in states {
        mock.on_get(SYSTEM, 200, system_state(state));
    }
}

/// Config with no waits between polls.
pub fn test_config() -> RunConfig {
    RunConfig {
        short_poll_secs: 0,
        long_poll_secs: 0,
        ..RunConfig::default()
    }
}

pub fn test_context(connector: MockConnector) -> RunContext {
    RunContext::new(test_config(), Arc::new(connector))
}

/// Session against `mock` with resources already located.
pub async fn session(mock: &Arc<MockController>) -> HostSession {
    let config = test_config();
    let permits = Arc::new(Semaphore::new(config.max_concurrent_requests));
    let client = RedfishClient::new(
        "r1-u2-b03-640.example.com",
        mock.clone(),
        permits,
        config.cache_capacity,
    );
    HostSession::open(client, &config).await.unwrap()
}
