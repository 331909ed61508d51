use std::collections::{BTreeSet, HashSet};

use crate::{
    models::{RouteLocation, Tab},
    route_table::RouteTableState,
    storage::TabCache,
};

/// TabSessionManager
///
/// Tracks the open view tabs in open order. Tabs are unique by path and
/// pinned (`affix`) tabs survive every close operation. When caching is on,
/// each mutation that changes the sequence overwrites the persisted copy.
pub struct TabSessionManager {
    tabs: Vec<Tab>,
    // `None` when tab caching is disabled.
    cache: Option<TabCache>,
    routes: RouteTableState,
    login_path: String,
}

impl TabSessionManager {
    pub fn new(routes: RouteTableState, cache: Option<TabCache>, login_path: impl Into<String>) -> Self {
        Self {
            tabs: Vec::new(),
            cache,
            routes,
            login_path: login_path.into(),
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// create_tabs
    ///
    /// Seeds the sequence from the persisted cache when caching is on and a
    /// user identity exists; otherwise from the registered routes marked
    /// `affix`; otherwise empty.
    pub fn create_tabs(&mut self) -> Vec<Tab> {
        if let Some(cached) = self.cache.as_ref().and_then(TabCache::load) {
            tracing::debug!(count = cached.len(), "tabs restored from cache");
            self.tabs = dedup_by_path(cached);
            return self.tabs.clone();
        }

        self.tabs = self.pinned_tabs();
        tracing::debug!(count = self.tabs.len(), "tabs seeded from pinned routes");
        self.tabs.clone()
    }

    /// add_tab
    ///
    /// Appends a tab with a new path. For a known path, only promotes the
    /// stored tab's `keep_alive` flag in place when the incoming tab asks for it.
    pub fn add_tab(&mut self, tab: Tab) -> Vec<Tab> {
        if tab.path.is_empty() {
            return self.tabs.clone();
        }

        match self.tabs.iter_mut().find(|t| t.path == tab.path) {
            None => {
                tracing::debug!(path = %tab.path, "tab opened");
                self.tabs.push(tab);
                self.persist();
            }
            Some(existing) if tab.keep_alive && !existing.keep_alive => {
                tracing::debug!(path = %tab.path, "tab promoted to keep-alive");
                existing.keep_alive = true;
                self.persist();
            }
            Some(_) => {}
        }
        self.tabs.clone()
    }

    /// remove_one_tab
    ///
    /// Closes the tab at `tab.path` unless it is pinned.
    pub fn remove_one_tab(&mut self, tab: &Tab) -> Vec<Tab> {
        if tab.affix {
            return self.tabs.clone();
        }

        if let Some(index) = self.tabs.iter().position(|t| t.path == tab.path && !t.affix) {
            self.tabs.remove(index);
            tracing::debug!(path = %tab.path, "tab closed");
            self.persist();
        }
        self.tabs.clone()
    }

    /// remove_other_tabs
    ///
    /// Keeps the pinned tabs in their order followed by `tab`, deduplicated by
    /// path so a pinned `tab` is not listed twice. A `tab` without a path is
    /// not kept.
    pub fn remove_other_tabs(&mut self, tab: Tab) -> Vec<Tab> {
        let mut kept: Vec<Tab> = self.tabs.iter().filter(|t| t.affix).cloned().collect();
        if !tab.path.is_empty() {
            kept.push(tab);
        }
        self.tabs = dedup_by_path(kept);
        self.persist();
        self.tabs.clone()
    }

    /// remove_list_tabs
    ///
    /// Closes every unpinned tab whose path appears in `list`. Persists only
    /// when something was closed.
    pub fn remove_list_tabs(&mut self, list: &[Tab]) -> Vec<Tab> {
        let paths: HashSet<&str> = list
            .iter()
            .filter(|t| !t.affix)
            .map(|t| t.path.as_str())
            .collect();

        let before = self.tabs.len();
        self.tabs.retain(|t| t.affix || !paths.contains(t.path.as_str()));
        if self.tabs.len() != before {
            tracing::debug!(closed = before - self.tabs.len(), "tabs closed");
            self.persist();
        }
        self.tabs.clone()
    }

    /// remove_all_tabs
    ///
    /// Keeps only the pinned tabs, in order.
    pub fn remove_all_tabs(&mut self) -> Vec<Tab> {
        self.tabs.retain(|t| t.affix);
        self.persist();
        self.tabs.clone()
    }

    /// cached_tab_names
    ///
    /// Names of the views that stay mounted across navigation: distinct names
    /// of tabs with `keep_alive` set and a non-empty name.
    pub fn cached_tab_names(&self) -> BTreeSet<String> {
        self.tabs
            .iter()
            .filter(|t| t.keep_alive && !t.name.is_empty())
            .map(|t| t.name.clone())
            .collect()
    }

    /// Opens (or promotes) the tab for a completed navigation. The login page
    /// and locations that did not resolve to a registered route get no tab.
    pub fn open_location(&mut self, location: &RouteLocation) -> Vec<Tab> {
        if location.path == self.login_path || location.name.is_none() {
            return self.tabs.clone();
        }
        self.add_tab(Tab::from_location(location))
    }

    fn pinned_tabs(&self) -> Vec<Tab> {
        let tabs = self
            .routes
            .get_routes()
            .iter()
            .flat_map(|route| {
                route
                    .flatten()
                    .into_iter()
                    .filter(|(_, r)| r.meta.affix)
                    .map(|(full, r)| Tab::from_route(&full, r))
                    .collect::<Vec<_>>()
            })
            .collect();
        dedup_by_path(tabs)
    }

    fn persist(&self) {
        if let Some(cache) = &self.cache {
            cache.save(&self.tabs);
        }
    }
}

/// Keeps the first tab for each path, preserving order.
fn dedup_by_path(tabs: Vec<Tab>) -> Vec<Tab> {
    let mut seen = HashSet::new();
    tabs.into_iter()
        .filter(|t| seen.insert(t.path.clone()))
        .collect()
}
