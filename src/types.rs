use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User-visible notification emitted by the synchronization engine.
///
/// Mutations produce a pending/success/failure sequence; fetch failures and
/// push channel events produce one-off notices. Presentation subscribes and
/// renders these however it likes (the CLI prints them).
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub service: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Pending,
    Success,
    Failure,
}

impl Notice {
    fn new(level: NoticeLevel, service: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level,
            service: service.map(str::to_string),
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, None, message)
    }

    pub fn pending(service: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Pending, service, message)
    }

    pub fn success(service: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, service, message)
    }

    pub fn failure(service: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Failure, service, message)
    }
}

/// Live resource usage for one container, as reported by the remote API.
/// Consumed by presentation only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage_mb: f64,
    pub memory_percent: f64,
}
