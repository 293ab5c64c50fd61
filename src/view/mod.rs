//! Filter-driven view derivation.
//!
//! The visible subset of the directory is a pure function of the directory,
//! a free-text query, and a category selector. No caching: the caller
//! re-derives whenever any input changes.

use crate::directory::{Category, Directory, Service};

/// Category selector state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

/// Free-text query plus category selector.
#[derive(Debug, Clone, Default)]
pub struct ViewQuery {
    pub text: String,
    pub category: CategoryFilter,
}

impl ViewQuery {
    pub fn matches(&self, service: &Service) -> bool {
        if !service.enabled {
            return false;
        }
        if !self.text.is_empty() {
            let needle = self.text.to_lowercase();
            let description = service.description.as_deref().unwrap_or("");
            let hit = service.name.to_lowercase().contains(&needle)
                || description.to_lowercase().contains(&needle)
                || service.category.label().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let CategoryFilter::Only(category) = &self.category {
            if service.category != *category {
                return false;
            }
        }
        true
    }
}

/// Visible subset of the directory, in directory iteration order.
pub fn visible<'a>(directory: &'a Directory, query: &ViewQuery) -> Vec<&'a Service> {
    directory.iter().filter(|s| query.matches(s)).collect()
}

/// Ids of the visible subset, the shape the layout engine consumes.
pub fn visible_ids(directory: &Directory, query: &ViewQuery) -> Vec<String> {
    directory
        .iter()
        .filter(|s| query.matches(s))
        .map(|s| s.id.clone())
        .collect()
}
