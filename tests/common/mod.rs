//! Shared test fixtures: an in-memory gateway with scripted responses and
//! recorded calls.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use quay::directory::{Category, Service, ServiceStatus};
use quay::error::GatewayError;
use quay::gateway::{CreateService, Gateway};
use quay::layout::LayoutSnapshot;
use quay::types::ContainerStats;

pub fn svc(id: &str, enabled: bool, status: ServiceStatus) -> Service {
    Service {
        id: id.to_string(),
        name: id.to_uppercase(),
        category: Category::Tool,
        image: format!("library/{id}"),
        tag: "latest".to_string(),
        description: None,
        ports: vec![],
        env_vars: BTreeMap::new(),
        volumes: vec![],
        health_check: None,
        icon: "Box".to_string(),
        enabled,
        status,
        container_id: None,
    }
}

/// Gateway stub. `list_services` walks through the scripted payloads and
/// repeats the last one; every call is recorded by name.
#[allow(dead_code)]
pub struct StubGateway {
    payloads: Mutex<Vec<Vec<Service>>>,
    list_calls: AtomicUsize,
    /// Delay applied to the very first list call (stale-fetch scenarios).
    pub first_list_delay: Mutex<Option<Duration>>,
    pub fail_list: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    calls: Mutex<Vec<String>>,
    saved_layouts: Mutex<Vec<LayoutSnapshot>>,
}

#[allow(dead_code)]
impl StubGateway {
    pub fn with_payload(services: Vec<Service>) -> Self {
        Self::with_payloads(vec![services])
    }

    pub fn with_payloads(payloads: Vec<Vec<Service>>) -> Self {
        Self {
            payloads: Mutex::new(payloads),
            list_calls: AtomicUsize::new(0),
            first_list_delay: Mutex::new(None),
            fail_list: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            saved_layouts: Mutex::new(Vec::new()),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(name))
            .count()
    }

    pub fn saved_layouts(&self) -> Vec<LayoutSnapshot> {
        self.saved_layouts.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn stub_failure(&self, what: &str) -> GatewayError {
        GatewayError::Api {
            status: 503,
            reason: format!("stub {what} failure"),
        }
    }
}

#[async_trait]
impl Gateway for StubGateway {
    async fn list_services(&self) -> Result<Vec<Service>, GatewayError> {
        self.record("list".to_string());
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(self.stub_failure("list"));
        }
        let index = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if index == 0 {
            let delay = *self.first_list_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
        let payloads = self.payloads.lock().unwrap();
        let payload = payloads
            .get(index.min(payloads.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default();
        Ok(payload)
    }

    async fn create_service(&self, spec: &CreateService) -> Result<Service, GatewayError> {
        self.record(format!("create {}", spec.name));
        let id = spec.name.to_lowercase().replace(' ', "-");
        Ok(svc(&id, false, ServiceStatus::Stopped))
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), GatewayError> {
        self.record(format!("enable {id}={enabled}"));
        Ok(())
    }

    async fn start_container(&self, id: &str) -> Result<(), GatewayError> {
        self.record(format!("start {id}"));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(self.stub_failure("start"));
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<(), GatewayError> {
        self.record(format!("stop {id}"));
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(self.stub_failure("stop"));
        }
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> Result<(), GatewayError> {
        self.record(format!("restart {id}"));
        Ok(())
    }

    async fn container_stats(&self, id: &str) -> Result<ContainerStats, GatewayError> {
        self.record(format!("stats {id}"));
        Ok(ContainerStats::default())
    }

    async fn container_logs(&self, id: &str, tail: u32) -> Result<String, GatewayError> {
        self.record(format!("logs {id} tail={tail}"));
        Ok(String::new())
    }

    async fn save_layout(&self, snapshot: &LayoutSnapshot) -> Result<(), GatewayError> {
        self.record(format!("save_layout {}", snapshot.name));
        self.saved_layouts.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// Poll `condition` until it holds or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
