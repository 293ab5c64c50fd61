//! Service model and the in-memory service directory.
//!
//! The directory is the authoritative local snapshot of every known service
//! (enabled or not) and its last-known runtime status. It is replaced
//! wholesale on each successful sync and never merged field by field, so a
//! reader always observes the fields of one consistent remote snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Last-known runtime state of a service's container, authoritative only as
/// of the last successful sync. Anything the remote reports outside the
/// enumeration decodes as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Exited,
    #[default]
    Unknown,
}

impl ServiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Exited => "exited",
            ServiceStatus::Unknown => "unknown",
        }
    }
}

impl From<String> for ServiceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "running" => ServiceStatus::Running,
            "stopped" => ServiceStatus::Stopped,
            "exited" => ServiceStatus::Exited,
            _ => ServiceStatus::Unknown,
        }
    }
}

impl From<ServiceStatus> for String {
    fn from(value: ServiceStatus) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Service category. Remote payloads can carry categories outside the
/// well-known set; those round-trip through `Other` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Database,
    Storage,
    Automation,
    Orchestration,
    Tool,
    Etl,
    Monitoring,
    Cache,
    Messaging,
    Other(String),
}

impl Category {
    pub fn label(&self) -> &str {
        match self {
            Category::Database => "database",
            Category::Storage => "storage",
            Category::Automation => "automation",
            Category::Orchestration => "orchestration",
            Category::Tool => "tool",
            Category::Etl => "etl",
            Category::Monitoring => "monitoring",
            Category::Cache => "cache",
            Category::Messaging => "messaging",
            Category::Other(name) => name,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "database" => Category::Database,
            "storage" => Category::Storage,
            "automation" => Category::Automation,
            "orchestration" => Category::Orchestration,
            "tool" => Category::Tool,
            "etl" => Category::Etl,
            "monitoring" => Category::Monitoring,
            "cache" => Category::Cache,
            "messaging" => Category::Messaging,
            _ => Category::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One managed containerized service as reported by the orchestration API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub image: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub health_check: Option<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub container_id: Option<String>,
}

fn default_tag() -> String {
    "latest".to_string()
}

fn default_icon() -> String {
    "Box".to_string()
}

impl Service {
    /// Local URL of the service's web surface, derived from the first
    /// `"host:container"` port mapping.
    pub fn primary_url(&self) -> Option<String> {
        let mapping = self.ports.first()?;
        let host_port = mapping.split(':').next()?;
        if host_port.is_empty() {
            return None;
        }
        Some(format!("http://localhost:{host_port}"))
    }
}

/// Ordered, id-indexed collection of services.
///
/// Iteration order is the order of the fetch payload that produced the
/// directory; that order flows through the view filter into tiling.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    services: Vec<Service>,
    index: HashMap<String, usize>,
}

impl Directory {
    /// Build a directory from a fetched service list. Duplicate ids keep the
    /// first occurrence.
    pub fn from_services(services: Vec<Service>) -> Self {
        let mut out = Self {
            services: Vec::with_capacity(services.len()),
            index: HashMap::with_capacity(services.len()),
        };
        for service in services {
            if out.index.contains_key(&service.id) {
                warn!("duplicate service id {} in directory payload, keeping first", service.id);
                continue;
            }
            out.index.insert(service.id.clone(), out.services.len());
            out.services.push(service);
        }
        out
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.index.get(id).map(|&i| &self.services[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Count of services participating in the active workspace.
    pub fn enabled_count(&self) -> usize {
        self.services.iter().filter(|s| s.enabled).count()
    }

    /// Services grouped by category, categories in first-seen order. Used by
    /// side listings; the tiled view goes through the view filter instead.
    pub fn by_category(&self) -> Vec<(Category, Vec<&Service>)> {
        let mut groups: Vec<(Category, Vec<&Service>)> = Vec::new();
        for service in &self.services {
            match groups.iter_mut().find(|(c, _)| *c == service.category) {
                Some((_, members)) => members.push(service),
                None => groups.push((service.category.clone(), vec![service])),
            }
        }
        groups
    }
}
