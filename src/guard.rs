use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ConsoleError,
    models::RouteLocation,
    registry::RouteRegistry,
    session::{SessionSlot, TokenState, UserSessionState},
    ui::UiState,
};

/// Query key carrying the originally requested path on the login redirect.
pub const REDIRECT_QUERY_KEY: &str = "from";

pub const SESSION_EXPIRED_NOTICE: &str = "Login session expired, please sign in again";

/// Why the guard redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectReason {
    /// Protected route without a token.
    AuthExpired,
    /// Login page requested while holding a token.
    AlreadyAuthenticated,
    /// The session was just loaded and routes registered; the same full path
    /// is dispatched again against the updated route table.
    RoutesRegistered,
    /// The session fetch failed; the token has been cleared.
    SessionFetchFailed(ConsoleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: RouteLocation,
    pub reason: RedirectReason,
}

/// Outcome of `NavigationGuard::before_each`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Redirect(Redirect),
    /// A newer navigation started while this one was suspended; its decision
    /// is discarded. Route registrations it committed stay in place.
    Superseded,
}

impl NavigationDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, NavigationDecision::Allow)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            NavigationDecision::Redirect(r) => Some(r),
            _ => None,
        }
    }
}

/// NavigationGuard
///
/// Gates every route transition. Logical states follow the token and the
/// session slot: no token (unauthenticated), token with the session loading,
/// token with the session ready. A session loaded under a token that has
/// since been cleared or replaced is dropped before anything else is decided.
pub struct NavigationGuard {
    config: AppConfig,
    tokens: TokenState,
    sessions: UserSessionState,
    session: Arc<SessionSlot>,
    registry: RouteRegistry,
    ui: UiState,
    // Sequence number of the most recent navigation.
    latest: AtomicU64,
    // Set once the expiry notice was shown; re-armed when a token is seen.
    expiry_notified: AtomicBool,
}

impl NavigationGuard {
    pub fn new(
        config: AppConfig,
        tokens: TokenState,
        sessions: UserSessionState,
        session: Arc<SessionSlot>,
        registry: RouteRegistry,
        ui: UiState,
    ) -> Self {
        Self {
            config,
            tokens,
            sessions,
            session,
            registry,
            ui,
            latest: AtomicU64::new(0),
            expiry_notified: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Arc<SessionSlot> {
        &self.session
    }

    /// before_each
    ///
    /// Decides whether the navigation to `to` may proceed. The progress bar
    /// starts here and is completed on every way out, including when the
    /// returned future is dropped mid-flight.
    pub async fn before_each(&self, to: &RouteLocation, from: &RouteLocation) -> NavigationDecision {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let span = tracing::info_span!(
            "navigation",
            nav_id = %Uuid::new_v4(),
            to = %to.full_path,
            from = %from.full_path,
        );
        let _progress = ProgressTicket::start(Arc::clone(&self.ui), self.config.progress_min_visible);

        let decision = self.decide(seq, to).instrument(span.clone()).await;
        span.in_scope(|| tracing::debug!(?decision, "navigation decided"));
        decision
    }

    async fn decide(&self, seq: u64, to: &RouteLocation) -> NavigationDecision {
        let token = self.tokens.get_token();
        if self.session.is_stale(token.as_deref()) {
            tracing::info!("token cleared or replaced since the session was loaded");
            self.session.reset();
        }

        if token.is_none() {
            if self.is_public(&to.path) {
                return NavigationDecision::Allow;
            }
            self.notify_expired(to);
            return self.redirect_to_login(to, RedirectReason::AuthExpired);
        }
        self.expiry_notified.store(false, Ordering::SeqCst);

        if to.path == self.config.login_path {
            return NavigationDecision::Redirect(Redirect {
                target: RouteLocation::parse(&self.config.home_path),
                reason: RedirectReason::AlreadyAuthenticated,
            });
        }

        if self.session.is_loaded() {
            return NavigationDecision::Allow;
        }

        let registry = &self.registry;
        let loaded = self
            .session
            .get_or_load(&*self.sessions, &*self.tokens, |session| {
                let added = registry.register_menus(&session.menus);
                tracing::info!(user = %session.id, added, "user session loaded");
            })
            .await;

        let decision = match loaded {
            Ok(_) => NavigationDecision::Redirect(Redirect {
                target: RouteLocation::parse(&to.full_path),
                reason: RedirectReason::RoutesRegistered,
            }),
            Err(ConsoleError::AuthExpired) => {
                self.notify_expired(to);
                self.redirect_to_login(to, RedirectReason::AuthExpired)
            }
            Err(e) => {
                tracing::error!(error = %e, "session fetch failed, signing out");
                self.tokens.clear_token();
                self.ui.notify_error(&e.to_string());
                self.redirect_to_login(to, RedirectReason::SessionFetchFailed(e))
            }
        };

        if self.latest.load(Ordering::SeqCst) != seq {
            tracing::debug!("navigation superseded while loading the session");
            return NavigationDecision::Superseded;
        }
        decision
    }

    /// after_each
    ///
    /// Sets the page title from the destination's route metadata, falling
    /// back to the product name. Returns the title applied.
    pub fn after_each(&self, to: &RouteLocation, _from: &RouteLocation) -> String {
        let resolved;
        let to = if to.meta.is_none() {
            resolved = self.registry.table().resolve(to);
            resolved.as_ref().unwrap_or(to)
        } else {
            to
        };

        let title = to
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| self.config.project_name.clone());
        self.ui.set_title(&title);
        title
    }

    fn is_public(&self, path: &str) -> bool {
        path == self.config.login_path || self.config.is_public(path)
    }

    fn notify_expired(&self, to: &RouteLocation) {
        if to.path == self.config.login_path {
            return;
        }
        if !self.expiry_notified.swap(true, Ordering::SeqCst) {
            self.ui.notify_error(SESSION_EXPIRED_NOTICE);
        }
    }

    fn redirect_to_login(&self, to: &RouteLocation, reason: RedirectReason) -> NavigationDecision {
        let mut query = BTreeMap::new();
        if to.path != self.config.home_path {
            query.insert(REDIRECT_QUERY_KEY.to_string(), to.full_path.clone());
        }
        NavigationDecision::Redirect(Redirect {
            target: RouteLocation::with_query(&self.config.login_path, query),
            reason,
        })
    }
}

/// Progress bar handle for one guard pass. Completes the bar on drop, after
/// the minimum-visible time when a runtime is available to wait on.
struct ProgressTicket {
    ui: UiState,
    started: Instant,
    min_visible: Duration,
}

impl ProgressTicket {
    fn start(ui: UiState, min_visible: Duration) -> Self {
        ui.progress_start();
        Self {
            ui,
            started: Instant::now(),
            min_visible,
        }
    }
}

impl Drop for ProgressTicket {
    fn drop(&mut self) {
        let remaining = self.min_visible.saturating_sub(self.started.elapsed());
        if remaining.is_zero() {
            self.ui.progress_done();
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ui = Arc::clone(&self.ui);
                handle.spawn(async move {
                    tokio::time::sleep(remaining).await;
                    ui.progress_done();
                });
            }
            Err(_) => self.ui.progress_done(),
        }
    }
}
