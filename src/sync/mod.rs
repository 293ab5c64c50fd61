//! Synchronization engine.
//!
//! Owns the service directory and keeps it eventually consistent with the
//! remote orchestration API. Three independent triggers feed one serialized
//! event queue: the poll interval, push channel invalidations, and locally
//! issued mutations. Every trigger resolves to the same operation, a full
//! refetch that replaces the directory wholesale, so readers always observe
//! exactly one complete remote snapshot and never a field-level merge.
//!
//! Refetches in flight may overlap; completion goes through a
//! sequence-guarded applier so a slow fetch launched earlier can never
//! overwrite the snapshot of a fetch launched after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::directory::Directory;
use crate::error::{GatewayError, QuayError};
use crate::gateway::{CreateService, Gateway, push};
use crate::types::Notice;
use crate::Result;

pub mod reconcile;

const EVENT_QUEUE_CAPACITY: usize = 64;
const NOTICE_CAPACITY: usize = 256;

/// What prompted a refetch. Observability only; every reason resolves to
/// the same wholesale replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshReason {
    Poll,
    Push,
    Settle,
    Manual,
}

/// A user-initiated change routed through the engine.
#[derive(Debug, Clone)]
pub enum Mutation {
    SetEnabled { id: String, enabled: bool },
    Start { id: String },
    Stop { id: String },
    Restart { id: String },
    Create(Box<CreateService>),
}

impl Mutation {
    fn target(&self) -> Option<&str> {
        match self {
            Mutation::SetEnabled { id, .. }
            | Mutation::Start { id }
            | Mutation::Stop { id }
            | Mutation::Restart { id } => Some(id),
            Mutation::Create(_) => None,
        }
    }

    fn pending_message(&self) -> String {
        match self {
            Mutation::SetEnabled { enabled: true, .. } => "Enabling service...".to_string(),
            Mutation::SetEnabled { enabled: false, .. } => "Disabling service...".to_string(),
            Mutation::Start { .. } => "Starting container...".to_string(),
            Mutation::Stop { .. } => "Stopping container...".to_string(),
            Mutation::Restart { .. } => "Restarting container...".to_string(),
            Mutation::Create(spec) => format!("Creating service {}...", spec.name),
        }
    }

    fn success_message(&self) -> String {
        match self {
            Mutation::SetEnabled { enabled: true, .. } => "Service enabled".to_string(),
            Mutation::SetEnabled { enabled: false, .. } => "Service disabled".to_string(),
            Mutation::Start { .. } => "Container started successfully".to_string(),
            Mutation::Stop { .. } => "Container stopped successfully".to_string(),
            Mutation::Restart { .. } => "Container restarted successfully".to_string(),
            Mutation::Create(spec) => format!("Service {} created", spec.name),
        }
    }

    fn failure_message(&self, err: &GatewayError) -> String {
        let action = match self {
            Mutation::SetEnabled { .. } => "toggle service",
            Mutation::Start { .. } => "start container",
            Mutation::Stop { .. } => "stop container",
            Mutation::Restart { .. } => "restart container",
            Mutation::Create(_) => "create service",
        };
        format!("Failed to {action}: {err}")
    }
}

pub(crate) enum SyncEvent {
    Refresh(RefreshReason),
    Mutate(Mutation),
    Shutdown,
}

/// Engine tuning knobs, decoupled from the config file so library callers
/// and tests can wire the engine directly.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub auto_start: bool,
    /// Push channel endpoint; `None` runs poll-only.
    pub push_url: Option<Url>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            auto_start: true,
            push_url: None,
        }
    }
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            settle_delay: config.settle_delay(),
            auto_start: config.auto_start,
            push_url: Url::parse(&config.push_url()).ok(),
        }
    }
}

/// The single writer of the directory watch channel. Fetches apply in
/// launch order: a completion whose launch sequence is not newer than the
/// last applied one is discarded as stale.
struct Applier {
    directory: watch::Sender<Arc<Directory>>,
    applied_seq: Mutex<u64>,
}

impl Applier {
    async fn apply(&self, seq: u64, snapshot: Directory) -> Option<Arc<Directory>> {
        let mut applied = self.applied_seq.lock().await;
        if seq <= *applied {
            return None;
        }
        *applied = seq;
        let snapshot = Arc::new(snapshot);
        let _ = self.directory.send_replace(snapshot.clone());
        Some(snapshot)
    }
}

struct EngineWorker {
    gateway: Arc<dyn Gateway>,
    events_tx: mpsc::Sender<SyncEvent>,
    applier: Arc<Applier>,
    notices: broadcast::Sender<Notice>,
    launch_seq: Arc<AtomicU64>,
    options: SyncOptions,
    shutdown: watch::Receiver<bool>,
}

impl EngineWorker {
    async fn run(mut self, mut events: mpsc::Receiver<SyncEvent>) {
        let mut poll = tokio::time::interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "sync engine started (poll every {:?})",
            self.options.poll_interval
        );

        loop {
            tokio::select! {
                // First tick fires immediately: the startup fetch.
                _ = poll.tick() => self.spawn_refetch(RefreshReason::Poll),
                event = events.recv() => match event {
                    Some(SyncEvent::Refresh(reason)) => self.spawn_refetch(reason),
                    Some(SyncEvent::Mutate(mutation)) => self.spawn_mutation(mutation),
                    Some(SyncEvent::Shutdown) | None => break,
                },
                _ = self.shutdown.changed() => break,
            }
        }
        debug!("sync engine stopped");
    }

    /// Launch an independent full refetch. Failure leaves the directory
    /// untouched, surfaces a notice, and never interrupts the poll cadence.
    fn spawn_refetch(&self, reason: RefreshReason) {
        let seq = self.launch_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let gateway = self.gateway.clone();
        let applier = self.applier.clone();
        let notices = self.notices.clone();
        let auto_start = self.options.auto_start;

        tokio::spawn(async move {
            match gateway.list_services().await {
                Ok(services) => {
                    let fetched = Directory::from_services(services);
                    match applier.apply(seq, fetched).await {
                        Some(snapshot) => {
                            debug!(seq, ?reason, services = snapshot.len(), "directory replaced");
                            if auto_start {
                                reconcile::auto_start(gateway.as_ref(), &snapshot).await;
                            }
                        }
                        None => debug!(seq, ?reason, "stale fetch discarded"),
                    }
                }
                Err(err) => {
                    warn!(?reason, "directory fetch failed: {err}");
                    let _ = notices
                        .send(Notice::failure(None, format!("Failed to fetch services: {err}")));
                }
            }
        });
    }

    /// Run one mutation: optimistic pending notice, the gateway call, then
    /// a success/failure notice. A successful call schedules a refetch
    /// after the settle delay since the container transition is
    /// asynchronous relative to the acknowledgement. The settle task is
    /// fire-and-forget; after engine teardown its enqueue fails silently.
    fn spawn_mutation(&self, mutation: Mutation) {
        let gateway = self.gateway.clone();
        let notices = self.notices.clone();
        let events = self.events_tx.clone();
        let settle = self.options.settle_delay;

        tokio::spawn(async move {
            let target = mutation.target().map(str::to_string);
            let _ = notices.send(Notice::pending(target.as_deref(), mutation.pending_message()));

            let result = match &mutation {
                Mutation::SetEnabled { id, enabled } => gateway.set_enabled(id, *enabled).await,
                Mutation::Start { id } => gateway.start_container(id).await,
                Mutation::Stop { id } => gateway.stop_container(id).await,
                Mutation::Restart { id } => gateway.restart_container(id).await,
                Mutation::Create(spec) => match gateway.create_service(spec).await {
                    Ok(created) => {
                        debug!("service {} created", created.id);
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
            };

            match result {
                Ok(()) => {
                    let _ = notices
                        .send(Notice::success(target.as_deref(), mutation.success_message()));
                    tokio::time::sleep(settle).await;
                    let _ = events.send(SyncEvent::Refresh(RefreshReason::Settle)).await;
                }
                Err(err) => {
                    let _ = notices
                        .send(Notice::failure(target.as_deref(), mutation.failure_message(&err)));
                }
            }
        });
    }
}

/// Spawns and owns the engine task plus the optional push channel task.
pub struct SyncEngine;

impl SyncEngine {
    pub fn spawn(gateway: Arc<dyn Gateway>, options: SyncOptions) -> SyncHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (directory_tx, directory_rx) = watch::channel(Arc::new(Directory::default()));
        let (notices_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let push_task = options.push_url.clone().map(|url| {
            tokio::spawn(push::run(
                url,
                events_tx.clone(),
                notices_tx.clone(),
                shutdown_rx.clone(),
            ))
        });

        let worker = EngineWorker {
            gateway,
            events_tx: events_tx.clone(),
            applier: Arc::new(Applier {
                directory: directory_tx,
                applied_seq: Mutex::new(0),
            }),
            notices: notices_tx.clone(),
            launch_seq: Arc::new(AtomicU64::new(0)),
            options,
            shutdown: shutdown_rx,
        };
        let engine_task = tokio::spawn(worker.run(events_rx));

        SyncHandle {
            events: events_tx,
            directory: directory_rx,
            notices: notices_tx,
            shutdown: shutdown_tx,
            engine_task,
            push_task,
        }
    }
}

/// Handle to a running engine: read side of the directory, the notice
/// stream, and the mutation/refresh entry points.
pub struct SyncHandle {
    events: mpsc::Sender<SyncEvent>,
    directory: watch::Receiver<Arc<Directory>>,
    notices: broadcast::Sender<Notice>,
    shutdown: watch::Sender<bool>,
    engine_task: JoinHandle<()>,
    push_task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Latest applied directory snapshot.
    pub fn snapshot(&self) -> Arc<Directory> {
        self.directory.borrow().clone()
    }

    /// A receiver that resolves whenever the directory is replaced.
    pub fn directory(&self) -> watch::Receiver<Arc<Directory>> {
        self.directory.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Enqueue an immediate refetch (the refresh button).
    pub async fn refresh(&self) -> Result<()> {
        self.send(SyncEvent::Refresh(RefreshReason::Manual)).await
    }

    pub async fn mutate(&self, mutation: Mutation) -> Result<()> {
        self.send(SyncEvent::Mutate(mutation)).await
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.mutate(Mutation::SetEnabled {
            id: id.to_string(),
            enabled,
        })
        .await
    }

    pub async fn start(&self, id: &str) -> Result<()> {
        self.mutate(Mutation::Start { id: id.to_string() }).await
    }

    pub async fn stop(&self, id: &str) -> Result<()> {
        self.mutate(Mutation::Stop { id: id.to_string() }).await
    }

    pub async fn restart(&self, id: &str) -> Result<()> {
        self.mutate(Mutation::Restart { id: id.to_string() }).await
    }

    pub async fn create(&self, spec: CreateService) -> Result<()> {
        self.mutate(Mutation::Create(Box::new(spec))).await
    }

    async fn send(&self, event: SyncEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| QuayError::EngineGone {
                reason: "event queue closed".to_string(),
            })
    }

    /// Tear down the poll loop and push channel. In-flight mutation settle
    /// timers are not cancelled; their enqueue after teardown is swallowed.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.events.send(SyncEvent::Shutdown).await;
        let _ = self.engine_task.await;
        if let Some(push) = self.push_task {
            let _ = push.await;
        }
    }
}
