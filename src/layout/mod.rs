//! Tiling layout engine.
//!
//! Panel geometry is recomputed, never persisted: flow placement is a pure
//! function of the visible-service list, a maximize selection overrides it
//! with one full-size panel, and manual drag/resize lives in an ephemeral
//! override layer that dies on the next change to the visible set or the
//! maximize selection. Only the explicit save-layout action writes anything
//! through the gateway.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One panel's grid cell. Field names on the wire match the layout
/// persistence endpoint (`i`/`minW`/`minH`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    #[serde(rename = "i")]
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(rename = "minW")]
    pub min_w: u32,
    #[serde(rename = "minH")]
    pub min_h: u32,
}

/// Position and size of a manually dragged/resized panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Grid geometry for one viewport breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingProfile {
    /// Total grid width, and the width of a maximized panel.
    pub grid_w: u32,
    /// Panels per row in flow placement.
    pub columns: u32,
    pub cell_w: u32,
    pub cell_h: u32,
    pub min_w: u32,
    pub min_h: u32,
    /// Height of a maximized panel.
    pub full_h: u32,
}

impl Default for TilingProfile {
    fn default() -> Self {
        Self {
            grid_w: 12,
            columns: 2,
            cell_w: 6,
            cell_h: 4,
            min_w: 3,
            min_h: 3,
            full_h: 8,
        }
    }
}

impl TilingProfile {
    /// Profile for a viewport width in pixels.
    pub fn for_width(px: u32) -> Self {
        if px >= 1200 {
            Self::default()
        } else if px >= 768 {
            Self {
                grid_w: 6,
                columns: 2,
                cell_w: 3,
                cell_h: 4,
                min_w: 2,
                min_h: 3,
                full_h: 8,
            }
        } else {
            Self {
                grid_w: 4,
                columns: 1,
                cell_w: 4,
                cell_h: 4,
                min_w: 2,
                min_h: 3,
                full_h: 8,
            }
        }
    }

    /// Deterministic placement for the visible list.
    ///
    /// With a maximize selection that is itself visible, the result is that
    /// single panel at full size (minimums pinned to full size, so it cannot
    /// shrink). Otherwise entries flow row by row in list order; compaction
    /// is inherent, removing an entry and recomputing can never leave an
    /// empty row above an occupied one.
    pub fn compute(&self, visible: &[String], maximized: Option<&str>) -> Vec<LayoutEntry> {
        if let Some(target) = maximized {
            if visible.iter().any(|id| id == target) {
                return vec![LayoutEntry {
                    id: target.to_string(),
                    x: 0,
                    y: 0,
                    w: self.grid_w,
                    h: self.full_h,
                    min_w: self.grid_w,
                    min_h: self.full_h,
                }];
            }
        }

        visible
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let i = i as u32;
                LayoutEntry {
                    id: id.clone(),
                    x: (i % self.columns) * self.cell_w,
                    y: (i / self.columns) * self.cell_h,
                    w: self.cell_w,
                    h: self.cell_h,
                    min_w: self.min_w,
                    min_h: self.min_h,
                }
            })
            .collect()
    }
}

/// Layout state for one view: the computed base plus the maximize selection
/// and the ephemeral manual overrides layered on top.
#[derive(Debug, Clone, Default)]
pub struct Board {
    profile: TilingProfile,
    maximized: Option<String>,
    overrides: HashMap<String, GridRect>,
    last_visible: Vec<String>,
}

impl Board {
    pub fn new(profile: TilingProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn profile(&self) -> TilingProfile {
        self.profile
    }

    /// Switch breakpoint profile. A changed profile is a full recompute
    /// trigger, so overrides are dropped.
    pub fn set_profile(&mut self, profile: TilingProfile) {
        if profile != self.profile {
            self.profile = profile;
            self.overrides.clear();
        }
    }

    pub fn maximized(&self) -> Option<&str> {
        self.maximized.as_deref()
    }

    /// Toggle the single-panel focus mode. Toggling the currently maximized
    /// id clears the selection and reverts to flow placement.
    pub fn toggle_maximize(&mut self, id: &str) {
        self.maximized = match self.maximized.as_deref() {
            Some(current) if current == id => None,
            _ => Some(id.to_string()),
        };
        self.overrides.clear();
    }

    /// Record a manual drag/resize for this session. Ignored while a panel
    /// is maximized. Lost on the next recompute triggered by a change to
    /// the visible set, the maximize selection, or the profile.
    pub fn override_entry(&mut self, id: &str, rect: GridRect) {
        if self.maximized.is_none() {
            self.overrides.insert(id.to_string(), rect);
        }
    }

    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// Effective layout for the given visible ids.
    pub fn layout(&mut self, visible: &[String]) -> Vec<LayoutEntry> {
        if self.last_visible != visible {
            self.overrides.clear();
            self.last_visible = visible.to_vec();
        }

        let mut entries = self.profile.compute(visible, self.maximized.as_deref());
        if self.maximized.is_none() {
            for entry in &mut entries {
                if let Some(rect) = self.overrides.get(&entry.id) {
                    entry.x = rect.x;
                    entry.y = rect.y;
                    entry.w = rect.w.max(entry.min_w);
                    entry.h = rect.h.max(entry.min_h);
                }
            }
        }
        entries
    }
}

/// Named layout snapshot payload for the persistence endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub name: String,
    pub layout_data: Vec<LayoutEntry>,
    #[serde(default)]
    pub is_default: bool,
}
