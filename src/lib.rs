//! Quay - live tiling control surface for containerized services
//!
//! This crate keeps a local directory of managed services synchronized
//! against a remote orchestration API (poll + push + optimistic mutations)
//! and derives an arrangeable panel grid from it: filter, flow placement,
//! single-panel maximize.

pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod layout;
pub mod sync;
pub mod types;
pub mod view;

pub use config::Config;
pub use error::{QuayError, Result};

// Export main types at root level
pub use directory::{Category, Directory, Service, ServiceStatus};
pub use layout::{Board, GridRect, LayoutEntry, LayoutSnapshot, TilingProfile};
pub use types::{ContainerStats, Notice, NoticeLevel};
pub use view::{CategoryFilter, ViewQuery};

// Re-export anyhow for compatibility
pub use anyhow;

/// Re-exports for easier API usage
pub mod api {
    pub use crate::config::Config;
    pub use crate::directory::{Category, Directory, Service, ServiceStatus};
    pub use crate::gateway::{CreateService, Gateway, HttpGateway};
    pub use crate::layout::{Board, LayoutEntry, LayoutSnapshot, TilingProfile};
    pub use crate::sync::{Mutation, SyncEngine, SyncHandle, SyncOptions};
    pub use crate::view::{CategoryFilter, ViewQuery};
    pub use crate::{Notice, NoticeLevel, Workspace};
}

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};

use gateway::{CreateService, Gateway, HttpGateway};
use sync::{SyncEngine, SyncHandle, SyncOptions};

/// One user-facing view of the workspace: the synchronization engine plus
/// the filter, maximize, and override state that turns a directory snapshot
/// into a panel layout.
///
/// The facade is the single place that enforces the override lifecycle:
/// any change to the visible set or the maximize selection recomputes the
/// layout from scratch.
pub struct Workspace {
    handle: SyncHandle,
    gateway: Arc<dyn Gateway>,
    query: ViewQuery,
    board: Board,
}

impl Workspace {
    /// Connect to the orchestration API described by `config` and start
    /// syncing: startup fetch, poll loop, push channel.
    pub fn connect(config: &Config) -> Result<Self> {
        let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(config.api_url.clone()));
        Ok(Self::with_gateway(gateway, SyncOptions::from(config)))
    }

    /// Wire the workspace to an arbitrary gateway implementation. Used by
    /// library callers and tests.
    pub fn with_gateway(gateway: Arc<dyn Gateway>, options: SyncOptions) -> Self {
        let handle = SyncEngine::spawn(gateway.clone(), options);
        Self {
            handle,
            gateway,
            query: ViewQuery::default(),
            board: Board::default(),
        }
    }

    /// Latest directory snapshot.
    pub fn snapshot(&self) -> Arc<Directory> {
        self.handle.snapshot()
    }

    /// Resolves whenever the directory is replaced.
    pub fn directory_changes(&self) -> watch::Receiver<Arc<Directory>> {
        self.handle.directory()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.handle.notices()
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn set_query(&mut self, text: impl Into<String>) {
        self.query.text = text.into();
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.query.category = category;
    }

    /// Toggle single-panel focus for `id`; toggling the maximized id again
    /// reverts to flow placement.
    pub fn toggle_maximize(&mut self, id: &str) {
        self.board.toggle_maximize(id);
    }

    pub fn maximized(&self) -> Option<String> {
        self.board.maximized().map(str::to_string)
    }

    /// Record a manual drag/resize for the current session.
    pub fn override_panel(&mut self, id: &str, rect: GridRect) {
        self.board.override_entry(id, rect);
    }

    pub fn set_profile(&mut self, profile: TilingProfile) {
        self.board.set_profile(profile);
    }

    /// Visible services under the current filter, in directory order.
    pub fn visible(&self) -> Vec<Service> {
        let snapshot = self.handle.snapshot();
        view::visible(&snapshot, &self.query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Panel geometry for the current visible set and maximize selection.
    pub fn layout(&mut self) -> Vec<LayoutEntry> {
        let snapshot = self.handle.snapshot();
        let ids = view::visible_ids(&snapshot, &self.query);
        self.board.layout(&ids)
    }

    /// Enqueue an immediate refetch.
    pub async fn refresh(&self) -> Result<()> {
        self.handle.refresh().await
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.handle.set_enabled(id, enabled).await
    }

    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.handle.start(id).await
    }

    pub async fn stop_container(&self, id: &str) -> Result<()> {
        self.handle.stop(id).await
    }

    pub async fn restart_container(&self, id: &str) -> Result<()> {
        self.handle.restart(id).await
    }

    pub async fn create_service(&self, spec: CreateService) -> Result<()> {
        self.handle.create(spec).await
    }

    /// Persist the current layout under `name` (default: a timestamped
    /// name). This is the only path that writes layout state anywhere.
    pub async fn save_layout(&mut self, name: Option<String>) -> Result<()> {
        let name = name.unwrap_or_else(|| format!("Layout {}", Utc::now().timestamp_millis()));
        let snapshot = LayoutSnapshot {
            name,
            layout_data: self.layout(),
            is_default: false,
        };
        self.gateway.save_layout(&snapshot).await?;
        Ok(())
    }

    pub async fn container_stats(&self, id: &str) -> Result<ContainerStats> {
        Ok(self.gateway.container_stats(id).await?)
    }

    pub async fn container_logs(&self, id: &str, tail: u32) -> Result<String> {
        Ok(self.gateway.container_logs(id, tail).await?)
    }

    /// Tear down the poll loop and push channel.
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}
