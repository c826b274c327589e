//! Read-only handler catalog.
//!
//! A [`Catalog`] is handed out by the router builder before the router
//! exists and is filled exactly once by `build()`. Handlers that need to
//! list their peers, such as `/help`, hold the catalog instead of the
//! router, so there is no reference cycle.

use courier_core::HandlerView;
use courier_middleware::stages::CommandSet;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
struct Entries {
    views: Vec<HandlerView>,
    prefixes: HashSet<String>,
}

/// Handler descriptors, available once the router is built.
///
/// The catalog is also the router's [`CommandSet`]: metrics give a token its
/// own bucket only if a registered handler lists it as a prefix.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Arc<OnceLock<Entries>>,
}

impl Catalog {
    /// Creates an empty, unfilled catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered handlers in registration order.
    ///
    /// Empty until the router is built.
    pub fn handlers(&self) -> &[HandlerView] {
        self.entries.get().map_or(&[], |entries| entries.views.as_slice())
    }

    /// Returns true if a registered handler lists `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.entries
            .get()
            .is_some_and(|entries| entries.prefixes.contains(prefix))
    }

    /// Returns true once the router has been built.
    pub fn is_ready(&self) -> bool {
        self.entries.get().is_some()
    }

    /// Fills the catalog. Later calls are ignored.
    pub(crate) fn fill(&self, views: Vec<HandlerView>) {
        let prefixes = views
            .iter()
            .flat_map(|view| view.prefixes.iter().cloned())
            .collect();
        if self.entries.set(Entries { views, prefixes }).is_err() {
            tracing::debug!("catalog already filled");
        }
    }
}

impl CommandSet for Catalog {
    fn contains(&self, token: &str) -> bool {
        self.has_prefix(token)
    }
}
