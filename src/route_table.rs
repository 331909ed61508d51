use std::{
    collections::HashSet,
    sync::{Arc, RwLock},
};

use crate::models::{RouteDefinition, RouteLocation};

/// RouteTable
///
/// The live route table the guard registers into and the tab manager seeds
/// pinned tabs from. Independent of any concrete routing library: it only
/// owns the route definitions and the set of registered names.
pub trait RouteTable: Send + Sync {
    /// Top-level routes in registration order.
    fn get_routes(&self) -> Vec<RouteDefinition>;

    /// True when `name` is registered anywhere in the table, children included.
    fn has_route(&self, name: &str) -> bool;

    /// Adds a top-level route. Callers check `has_route` first.
    fn add_route(&self, route: RouteDefinition);

    /// Finds the route mounted at `path`, returning the location with its
    /// name and metadata filled in.
    fn resolve(&self, location: &RouteLocation) -> Option<RouteLocation> {
        self.get_routes().iter().find_map(|route| {
            route
                .flatten()
                .into_iter()
                .find(|(full, _)| *full == location.path)
                .map(|(_, matched)| location.clone().resolved(matched))
        })
    }
}

/// RouteTableState
///
/// Shared handle used by the guard, the registry and the tab manager.
pub type RouteTableState = Arc<dyn RouteTable>;

#[derive(Default)]
struct TableInner {
    routes: Vec<RouteDefinition>,
    names: HashSet<String>,
}

/// MemoryRouteTable
///
/// In-process route table. Seeded with the static routes (login, home, ...)
/// and extended at runtime with the routes derived from the user's menus.
#[derive(Default)]
pub struct MemoryRouteTable {
    inner: RwLock<TableInner>,
}

impl MemoryRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with `routes`. Later duplicates are dropped.
    pub fn with_routes(routes: Vec<RouteDefinition>) -> Self {
        let table = Self::new();
        for route in routes {
            if !table.has_route(&route.name) {
                table.add_route(route);
            }
        }
        table
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|t| t.routes.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteTable for MemoryRouteTable {
    fn get_routes(&self) -> Vec<RouteDefinition> {
        match self.inner.read() {
            Ok(table) => table.routes.clone(),
            Err(poisoned) => poisoned.into_inner().routes.clone(),
        }
    }

    fn has_route(&self, name: &str) -> bool {
        match self.inner.read() {
            Ok(table) => table.names.contains(name),
            Err(poisoned) => poisoned.into_inner().names.contains(name),
        }
    }

    fn add_route(&self, route: RouteDefinition) {
        let mut table = match self.inner.write() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        for name in route.names() {
            table.names.insert(name.to_string());
        }
        table.routes.push(route);
    }
}
