use std::collections::{HashMap, HashSet};

use crate::{
    error::{ConsoleError, ConsoleResult},
    models::{ComponentRef, FlatMenuEntry, MenuNode, RouteDefinition},
    route_table::RouteTableState,
};

/// Maximum menu nesting accepted before the data is treated as cyclic.
pub const MAX_MENU_DEPTH: usize = 32;

/// ComponentRegistry
///
/// Lookup table from server-declared component paths to view references.
/// Keys are normalised (surrounding `/` and a trailing `.vue` removed) on both
/// insert and lookup; an unmapped path is never defaulted.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    views: HashMap<String, ComponentRef>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `view` under `path`. Replaces any previous mapping.
    pub fn insert(&mut self, path: &str, view: impl Into<String>) {
        self.views
            .insert(normalize_component(path), ComponentRef(view.into()));
    }

    pub fn with(mut self, path: &str, view: impl Into<String>) -> Self {
        self.insert(path, view);
        self
    }

    pub fn lookup(&self, path: &str) -> Option<&ComponentRef> {
        self.views.get(&normalize_component(path))
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ComponentRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (path, view) in iter {
            registry.insert(path.as_ref(), view);
        }
        registry
    }
}

fn normalize_component(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    trimmed.strip_suffix(".vue").unwrap_or(trimmed).to_string()
}

// --- Menu -> Route conversion ---

/// convert_menus_to_routes
///
/// Converts a whole menu forest, failing on the first structural error.
/// The guard converts branch by branch with `convert_menu` instead so that a
/// broken branch does not take its siblings down.
pub fn convert_menus_to_routes(
    menus: &[MenuNode],
    components: &ComponentRegistry,
) -> ConsoleResult<Vec<RouteDefinition>> {
    menus
        .iter()
        .map(|menu| convert_menu(menu, components))
        .collect()
}

/// convert_menu
///
/// Converts one top-level menu branch. Hierarchy is preserved and `meta` is
/// copied verbatim. A node without a component becomes a view-less route;
/// a declared component that is not mapped is an error, as are missing
/// names, names repeated inside the branch and cyclic or runaway nesting.
pub fn convert_menu(
    menu: &MenuNode,
    components: &ComponentRegistry,
) -> ConsoleResult<RouteDefinition> {
    let mut ancestors = Vec::new();
    let mut seen = HashSet::new();
    convert_node(menu, components, &mut ancestors, &mut seen)
}

fn convert_node<'a>(
    node: &'a MenuNode,
    components: &ComponentRegistry,
    ancestors: &mut Vec<&'a str>,
    seen: &mut HashSet<&'a str>,
) -> ConsoleResult<RouteDefinition> {
    let name = node.name.trim();
    if name.is_empty() {
        return Err(ConsoleError::registration(
            node.path.as_str(),
            "menu node has no name",
        ));
    }
    if ancestors.contains(&name) || ancestors.len() >= MAX_MENU_DEPTH {
        return Err(ConsoleError::MenuCycle(name.to_string()));
    }
    if !seen.insert(name) {
        return Err(ConsoleError::registration(name, "name used twice in one menu branch"));
    }

    let component = match node.component.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(path) => Some(components.lookup(path).cloned().ok_or_else(|| {
            ConsoleError::registration(name, format!("no view mapped for component `{path}`"))
        })?),
        None => None,
    };

    ancestors.push(name);
    let children = node
        .children
        .iter()
        .map(|child| convert_node(child, components, ancestors, seen))
        .collect::<ConsoleResult<Vec<_>>>();
    ancestors.pop();

    Ok(RouteDefinition {
        name: name.to_string(),
        path: node.path.clone(),
        component,
        meta: node.meta.clone(),
        children: children?,
    })
}

/// assemble_menu_tree
///
/// Builds a menu forest from flat rows linked by `parent_id`. Siblings are
/// ordered by `sort`, ties keep input order. Rows whose parent id is unknown
/// become roots; a parent chain that loops back on itself is rejected.
pub fn assemble_menu_tree(entries: Vec<FlatMenuEntry>) -> ConsoleResult<Vec<MenuNode>> {
    let parent_of: HashMap<i64, Option<i64>> = entries
        .iter()
        .map(|e| (e.id, e.parent_id.filter(|p| *p != 0)))
        .collect();

    for entry in &entries {
        let mut visited = HashSet::from([entry.id]);
        let mut cursor = parent_of.get(&entry.id).copied().flatten();
        while let Some(parent) = cursor {
            if !visited.insert(parent) {
                return Err(ConsoleError::MenuCycle(entry.name.clone()));
            }
            cursor = parent_of.get(&parent).copied().flatten();
        }
    }

    let mut ordered: Vec<(usize, FlatMenuEntry)> = entries.into_iter().enumerate().collect();
    ordered.sort_by_key(|(index, e)| (e.sort, *index));

    let mut children_of: HashMap<Option<i64>, Vec<FlatMenuEntry>> = HashMap::new();
    for (_, entry) in ordered {
        let parent = match entry.parent_id.filter(|p| *p != 0) {
            Some(p) if parent_of.contains_key(&p) => Some(p),
            Some(p) => {
                tracing::warn!(menu = %entry.name, parent = p, "menu parent not found, promoting to root");
                None
            }
            None => None,
        };
        children_of.entry(parent).or_default().push(entry);
    }

    Ok(build_level(None, &mut children_of))
}

fn build_level(
    parent: Option<i64>,
    children_of: &mut HashMap<Option<i64>, Vec<FlatMenuEntry>>,
) -> Vec<MenuNode> {
    let entries = children_of.remove(&parent).unwrap_or_default();
    entries
        .into_iter()
        .map(|entry| {
            let children = build_level(Some(entry.id), children_of);
            MenuNode {
                name: entry.name,
                path: entry.path,
                component: entry.component,
                meta: entry.meta,
                children,
            }
        })
        .collect()
}

// --- Registration ---

/// Result of a single `register` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    /// Skipped without touching the table; carries the reason.
    Skipped(ConsoleError),
}

/// RouteRegistry
///
/// Idempotent front of the route table: a name is added at most once no
/// matter how many guard passes try to register it.
#[derive(Clone)]
pub struct RouteRegistry {
    table: RouteTableState,
    components: ComponentRegistry,
}

impl RouteRegistry {
    pub fn new(table: RouteTableState, components: ComponentRegistry) -> Self {
        Self { table, components }
    }

    pub fn table(&self) -> &RouteTableState {
        &self.table
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// register
    ///
    /// Adds `route` unless it has no usable name or any name in its subtree is
    /// already live. Skips are logged as warnings, never returned as errors.
    pub fn register(&self, route: RouteDefinition) -> RegisterOutcome {
        if route.name.trim().is_empty() {
            tracing::warn!(path = %route.path, "route has no name, not registering");
            return RegisterOutcome::Skipped(ConsoleError::registration(
                route.path.as_str(),
                "route has no name",
            ));
        }
        if self.table.has_route(&route.name) {
            tracing::warn!(route = %route.name, "route already registered, skipping");
            return RegisterOutcome::Skipped(ConsoleError::DuplicateRoute(route.name));
        }
        if let Some(clash) = route.names().into_iter().find(|n| self.table.has_route(n)) {
            tracing::warn!(route = %route.name, child = %clash, "child route name already registered, skipping");
            return RegisterOutcome::Skipped(ConsoleError::DuplicateRoute(clash.to_string()));
        }

        tracing::info!(route = %route.name, path = %route.path, "registered dynamic route");
        self.table.add_route(route);
        RegisterOutcome::Added
    }

    /// register_menus
    ///
    /// Converts and registers every top-level branch of `menus`. A branch that
    /// fails to convert is logged and skipped; its siblings still register.
    /// Returns the number of routes added.
    pub fn register_menus(&self, menus: &[MenuNode]) -> usize {
        let mut added = 0;
        for menu in menus {
            match convert_menu(menu, &self.components) {
                Ok(route) => {
                    if self.register(route) == RegisterOutcome::Added {
                        added += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(menu = %menu.name, error = %e, "failed to convert menu branch");
                }
            }
        }
        added
    }
}
