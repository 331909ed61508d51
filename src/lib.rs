use std::sync::Arc;

// --- Module Structure ---

pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod registry;
pub mod route_table;
pub mod session;
pub mod storage;
pub mod tabs;
pub mod telemetry;
pub mod ui;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ConsoleError, ConsoleResult};
pub use guard::{NavigationDecision, NavigationGuard, Redirect, RedirectReason};
pub use models::{MenuNode, RouteDefinition, RouteLocation, Tab, UserSession};
pub use registry::{ComponentRegistry, RouteRegistry};
pub use route_table::{MemoryRouteTable, RouteTable, RouteTableState};
pub use tabs::TabSessionManager;

use session::{SessionSlot, TokenState, UserSessionState};
use storage::{KeyValueState, TabCache};
use ui::UiState;

/// Redirects followed by `ConsoleContext::navigate` before giving up.
pub const MAX_REDIRECT_DEPTH: usize = 5;

/// ConsoleServices
///
/// The external collaborators a console context is built on. Cloned into
/// every fresh context, so a logout keeps the same stores and UI.
#[derive(Clone)]
pub struct ConsoleServices {
    pub tokens: TokenState,
    pub sessions: UserSessionState,
    pub storage: KeyValueState,
    pub ui: UiState,
    /// View lookup for server-declared component paths.
    pub components: ComponentRegistry,
    /// Routes present before any session is loaded (login, home, 404, ...).
    pub static_routes: Vec<RouteDefinition>,
}

/// Result of a full navigation through `ConsoleContext::navigate`.
#[derive(Debug, Clone)]
pub struct NavigationOutcome {
    /// Where the navigation ended up, resolved against the route table.
    pub location: RouteLocation,
    /// Every redirect followed on the way, in order.
    pub redirects: Vec<Redirect>,
    /// Page title applied, `None` when the navigation was superseded.
    pub title: Option<String>,
    pub superseded: bool,
}

/// ConsoleContext
///
/// Session-scoped state of the console: the route table, the user session
/// slot, the guard and the open tabs. Built at start-up and replaced wholesale
/// on logout instead of being reset piecemeal.
pub struct ConsoleContext {
    config: AppConfig,
    services: ConsoleServices,
    guard: NavigationGuard,
    tabs: TabSessionManager,
    current: RouteLocation,
    tabs_created: bool,
}

impl ConsoleContext {
    pub fn new(config: AppConfig, services: ConsoleServices) -> Self {
        let table: RouteTableState =
            Arc::new(MemoryRouteTable::with_routes(services.static_routes.clone()));
        let session = Arc::new(SessionSlot::new());

        let registry = RouteRegistry::new(Arc::clone(&table), services.components.clone());
        let guard = NavigationGuard::new(
            config.clone(),
            Arc::clone(&services.tokens),
            Arc::clone(&services.sessions),
            Arc::clone(&session),
            registry,
            Arc::clone(&services.ui),
        );

        let cache = config.cache_tabs.then(|| {
            TabCache::new(
                Arc::clone(&services.storage),
                Arc::clone(&services.tokens),
                Arc::clone(&session),
                config.tab_cache_key.clone(),
            )
        });
        let tabs = TabSessionManager::new(table, cache, config.login_path.clone());

        Self {
            config,
            services,
            guard,
            tabs,
            current: RouteLocation::default(),
            tabs_created: false,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn routes(&self) -> &RouteTableState {
        self.guard.registry().table()
    }

    pub fn session(&self) -> Option<Arc<UserSession>> {
        self.guard.session().get()
    }

    pub fn current(&self) -> &RouteLocation {
        &self.current
    }

    pub fn tabs(&self) -> &TabSessionManager {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabSessionManager {
        &mut self.tabs
    }

    /// Stores `token`; the next protected navigation loads the session.
    pub fn login(&self, token: impl Into<String>) {
        self.services.tokens.set_token(token.into());
    }

    /// navigate
    ///
    /// Runs one navigation end to end: the guard, every redirect it asks for,
    /// route resolution, the title hook and tab bookkeeping. Tabs are seeded
    /// on the first allowed navigation after the session is loaded.
    pub async fn navigate(&mut self, full_path: &str) -> ConsoleResult<NavigationOutcome> {
        let token = self.services.tokens.get_token();
        if self.guard.session().is_stale(token.as_deref()) {
            tracing::info!("token changed since the session was loaded, rebuilding context");
            self.rebuild();
        }

        let mut target = RouteLocation::parse(full_path);
        let mut redirects = Vec::new();

        for _ in 0..=MAX_REDIRECT_DEPTH {
            let from = self.current.clone();
            match self.guard.before_each(&target, &from).await {
                NavigationDecision::Allow => {
                    let location = self.routes().resolve(&target).unwrap_or(target);
                    let title = self.guard.after_each(&location, &from);

                    if !self.tabs_created && self.guard.session().is_loaded() {
                        self.tabs.create_tabs();
                        self.tabs_created = true;
                    }
                    self.tabs.open_location(&location);
                    self.current = location.clone();

                    return Ok(NavigationOutcome {
                        location,
                        redirects,
                        title: Some(title),
                        superseded: false,
                    });
                }
                NavigationDecision::Redirect(redirect) => {
                    target = redirect.target.clone();
                    redirects.push(redirect);
                }
                NavigationDecision::Superseded => {
                    return Ok(NavigationOutcome {
                        location: self.current.clone(),
                        redirects,
                        title: None,
                        superseded: true,
                    });
                }
            }
        }

        tracing::error!(path = %full_path, "redirect chain did not settle");
        Err(ConsoleError::TooManyRedirects(full_path.to_string()))
    }

    /// Drops every user's persisted tabs.
    pub fn clear_tab_cache(&self) {
        if let Err(e) = self.services.storage.remove_item(&self.config.tab_cache_key) {
            tracing::warn!(error = %e, "failed to clear tab cache");
        }
    }

    /// logout
    ///
    /// Clears the token and returns a fresh context: empty session slot, a
    /// route table holding only the static routes, and no open tabs. The
    /// per-user tab cache is kept for the next login.
    pub fn logout(self) -> ConsoleContext {
        self.services.tokens.clear_token();
        tracing::info!("logged out, console context replaced");
        ConsoleContext::new(self.config, self.services)
    }

    // Same reset as `logout`, for a token that was cleared or swapped
    // underneath the context. The current location is kept.
    fn rebuild(&mut self) {
        let current = self.current.clone();
        *self = ConsoleContext::new(self.config.clone(), self.services.clone());
        self.current = current;
    }
}
