use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// --- Server Schemas (delivered with the user session) ---

/// RouteMeta
///
/// Display and retention flags attached to a menu entry. The same shape is
/// copied verbatim onto the derived route definition, so it doubles as the
/// route metadata read by the tab manager and the page title hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RouteMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub icon: Option<String>,
    // Pinned tab: immune to every close operation.
    #[serde(default)]
    pub affix: bool,
    // Keep the view mounted across tab switches.
    #[serde(default)]
    pub keep_alive: bool,
}

/// Menu metadata is route metadata; the server and the router share one shape.
pub type MenuMeta = RouteMeta;

/// MenuNode
///
/// One entry of the server-delivered menu tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MenuNode {
    #[serde(default)]
    pub name: String,
    pub path: String,
    // Server-declared view path, e.g. "system/menu/index". Absent on container nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub component: Option<String>,
    #[serde(default)]
    pub meta: MenuMeta,
    #[serde(default)]
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_meta(mut self, meta: MenuMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_children(mut self, children: Vec<MenuNode>) -> Self {
        self.children = children;
        self
    }
}

/// FlatMenuEntry
///
/// A menu row as stored server-side: linked to its parent by id instead of
/// nesting. Assembled into `MenuNode` trees by `registry::assemble_menu_tree`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FlatMenuEntry {
    pub id: i64,
    // `None` or `0` marks a root entry.
    #[serde(default)]
    #[ts(optional)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(default)]
    #[ts(optional)]
    pub component: Option<String>,
    #[serde(default)]
    pub meta: MenuMeta,
}

/// UserSession
///
/// The authenticated user's identity and menu tree, fetched once per login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSession {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub menus: Vec<MenuNode>,
}

// --- Router Schemas ---

/// Resolved view reference for a route, looked up from the component registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef(pub String);

impl ComponentRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// RouteDefinition
///
/// A route derived 1:1 from a `MenuNode`. `name` is unique across the live
/// route table. Child paths not starting with `/` are relative to the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub name: String,
    pub path: String,
    pub component: Option<ComponentRef>,
    pub meta: RouteMeta,
    pub children: Vec<RouteDefinition>,
}

impl RouteDefinition {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Names of this route and all of its descendants, depth first.
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for child in &self.children {
            names.extend(child.names());
        }
        names
    }

    /// Every route in this subtree paired with its absolute path, parents first.
    pub fn flatten(&self) -> Vec<(String, &RouteDefinition)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, parent: &str, out: &mut Vec<(String, &'a RouteDefinition)>) {
        let full = join_path(parent, &self.path);
        out.push((full.clone(), self));
        for child in &self.children {
            child.flatten_into(&full, out);
        }
    }
}

/// Joins a child route path onto its parent's full path.
pub fn join_path(parent: &str, path: &str) -> String {
    if path.starts_with('/') || parent.is_empty() {
        return normalize_path(path);
    }
    if path.is_empty() {
        return normalize_path(parent);
    }
    normalize_path(&format!("{}/{}", parent.trim_end_matches('/'), path))
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// RouteLocation
///
/// A navigation target. `full_path` is the path plus its query string and is
/// what gets re-dispatched or carried as the login `from` reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLocation {
    pub path: String,
    pub full_path: String,
    pub query: BTreeMap<String, String>,
    // Filled in once the location is resolved against the route table.
    pub name: Option<String>,
    pub meta: Option<RouteMeta>,
}

impl RouteLocation {
    /// Parses `/path?key=value&...`. Query values are percent-decoded.
    pub fn parse(full_path: &str) -> Self {
        let without_hash = full_path.split('#').next().unwrap_or_default();
        let (path, raw_query) = match without_hash.split_once('?') {
            Some((path, query)) => (path, query),
            None => (without_hash, ""),
        };

        let query = raw_query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();

        Self {
            path: path.to_string(),
            full_path: without_hash.to_string(),
            query,
            name: None,
            meta: None,
        }
    }

    /// Builds a location for `path` carrying `query`, encoding the values.
    pub fn with_query(path: &str, query: BTreeMap<String, String>) -> Self {
        let full_path = if query.is_empty() {
            path.to_string()
        } else {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                })
                .collect();
            format!("{}?{}", path, encoded.join("&"))
        };

        Self {
            path: path.to_string(),
            full_path,
            query,
            name: None,
            meta: None,
        }
    }

    /// Attaches the name and metadata of the route this location matched.
    pub fn resolved(mut self, route: &RouteDefinition) -> Self {
        self.name = Some(route.name.clone());
        self.meta = Some(route.meta.clone());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .map(|m| m.title.as_str())
            .filter(|t| !t.is_empty())
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// --- Tab Schemas ---

/// Tab
///
/// One open view in the tab bar. Unique by `path`; order is open order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Tab {
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub icon: Option<String>,
    #[serde(default)]
    pub keep_alive: bool,
    #[serde(default)]
    pub affix: bool,
}

impl Tab {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn affixed(mut self) -> Self {
        self.affix = true;
        self
    }

    pub fn kept_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }

    /// Tab for a registered route mounted at `full_path`.
    pub fn from_route(full_path: &str, route: &RouteDefinition) -> Self {
        Self {
            name: route.name.clone(),
            path: full_path.to_string(),
            title: route.meta.title.clone(),
            icon: route.meta.icon.clone(),
            keep_alive: route.meta.keep_alive,
            affix: route.meta.affix,
        }
    }

    /// Tab for a resolved navigation target.
    pub fn from_location(location: &RouteLocation) -> Self {
        let meta = location.meta.clone().unwrap_or_default();
        Self {
            name: location.name.clone().unwrap_or_default(),
            path: location.path.clone(),
            title: meta.title,
            icon: meta.icon,
            keep_alive: meta.keep_alive,
            affix: meta.affix,
        }
    }
}
