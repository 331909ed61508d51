use async_trait::async_trait;
use serde::Deserialize;
use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::OnceCell;

use crate::{
    error::{ConsoleError, ConsoleResult},
    models::UserSession,
};

// 1. Token Store Contract
/// TokenStore
///
/// Holds the current auth credential. Presence of a token means the user is
/// authenticated; the guard never inspects its contents.
pub trait TokenStore: Send + Sync {
    fn get_token(&self) -> Option<String>;
    fn set_token(&self, token: String);
    fn clear_token(&self);
}

/// MemoryTokenStore
///
/// Process-local token holder.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> Option<String> {
        let token = match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        token.filter(|t| !t.is_empty())
    }

    fn set_token(&self, token: String) {
        match self.token.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    fn clear_token(&self) {
        match self.token.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

pub type TokenState = Arc<dyn TokenStore>;

// 2. User Session Store Contract
/// UserSessionStore
///
/// Fetches the authenticated user's identity and menu tree.
#[async_trait]
pub trait UserSessionStore: Send + Sync {
    /// Fails with `ConsoleError::SessionFetch` on any transport, status or
    /// decode problem.
    async fn fetch_user_info(&self, token: &str) -> ConsoleResult<UserSession>;
}

pub type UserSessionState = Arc<dyn UserSessionStore>;

/// HttpUserSessionStore
///
/// Fetches `GET {base_url}/user/info` with the token as bearer credential.
/// Accepts either the bare session object or one wrapped in a `data` envelope.
#[derive(Clone)]
pub struct HttpUserSessionStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserInfoResponse {
    Wrapped { data: UserSession },
    Bare(UserSession),
}

impl HttpUserSessionStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn user_info_url(&self) -> String {
        format!("{}/user/info", self.base_url)
    }
}

#[async_trait]
impl UserSessionStore for HttpUserSessionStore {
    async fn fetch_user_info(&self, token: &str) -> ConsoleResult<UserSession> {
        let response = self
            .client
            .get(self.user_info_url())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConsoleError::SessionFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| ConsoleError::SessionFetch(e.to_string()))?;

        let body = response
            .json::<UserInfoResponse>()
            .await
            .map_err(|e| ConsoleError::SessionFetch(e.to_string()))?;

        Ok(match body {
            UserInfoResponse::Wrapped { data } => data,
            UserInfoResponse::Bare(session) => session,
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockUserSessionStore
///
/// Returns a canned session (or a failure) after an optional delay and
/// counts how many fetches were made.
pub struct MockUserSessionStore {
    session: Option<UserSession>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockUserSessionStore {
    pub fn new(session: UserSession) -> Self {
        Self {
            session: Some(session),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn new_failing() -> Self {
        Self {
            session: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserSessionStore for MockUserSessionStore {
    async fn fetch_user_info(&self, _token: &str) -> ConsoleResult<UserSession> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.session
            .clone()
            .ok_or_else(|| ConsoleError::SessionFetch("Mock session error: simulation requested".into()))
    }
}

// 4. Single-flight session slot
/// Outcome of `SessionSlot::get_or_load`.
#[derive(Debug, Clone)]
pub struct SessionLoad {
    pub session: Arc<UserSession>,
    // True only for the caller whose fetch populated the slot.
    pub fetched: bool,
}

// A fetched session together with the token it was fetched with.
struct LoadedSession {
    token: String,
    session: Arc<UserSession>,
}

type SessionCell = Arc<OnceCell<LoadedSession>>;

/// SessionSlot
///
/// Holds the user session for as long as the token it was fetched with stays
/// current. Loading is single-flight: concurrent callers wait on the one
/// fetch in progress. A failed fetch leaves the slot empty so a later
/// navigation can retry, and `reset` drops a loaded session so the next load
/// fetches again.
#[derive(Default)]
pub struct SessionSlot {
    cell: RwLock<SessionCell>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> SessionCell {
        match self.cell.read() {
            Ok(cell) => Arc::clone(&*cell),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    pub fn get(&self) -> Option<Arc<UserSession>> {
        self.current().get().map(|loaded| Arc::clone(&loaded.session))
    }

    pub fn is_loaded(&self) -> bool {
        self.current().initialized()
    }

    /// Identity used to key the tab cache.
    pub fn user_id(&self) -> Option<String> {
        self.current()
            .get()
            .map(|loaded| loaded.session.id.clone())
            .filter(|id| !id.is_empty())
    }

    /// True when a session is loaded but `token` is not the one it was
    /// fetched with, including when there is no token at all.
    pub fn is_stale(&self, token: Option<&str>) -> bool {
        match self.current().get() {
            Some(loaded) => token != Some(loaded.token.as_str()),
            None => false,
        }
    }

    /// Drops the loaded session. A fetch already in flight completes into the
    /// detached cell and is not seen by later callers.
    pub fn reset(&self) {
        let fresh = SessionCell::default();
        match self.cell.write() {
            Ok(mut cell) => *cell = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        tracing::info!("user session dropped");
    }

    /// get_or_load
    ///
    /// Returns the loaded session, fetching it first if needed. `on_fetched`
    /// runs inside the single flight, before the slot is marked loaded, so no
    /// caller ever observes a loaded session with its routes missing.
    ///
    /// The token is read when the fetch actually starts: a waiter that takes
    /// over after a failed fetch sees the cleared token as `AuthExpired`.
    pub async fn get_or_load<F>(
        &self,
        store: &dyn UserSessionStore,
        tokens: &dyn TokenStore,
        on_fetched: F,
    ) -> ConsoleResult<SessionLoad>
    where
        F: FnOnce(&UserSession) + Send,
    {
        let cell = self.current();
        let fetched = AtomicBool::new(false);
        let fetched_flag = &fetched;
        let loaded = cell
            .get_or_try_init(move || async move {
                fetched_flag.store(true, Ordering::SeqCst);
                let token = tokens.get_token().ok_or(ConsoleError::AuthExpired)?;
                tracing::info!("fetching user session");
                let session = store.fetch_user_info(&token).await?;
                on_fetched(&session);
                Ok::<_, ConsoleError>(LoadedSession {
                    token,
                    session: Arc::new(session),
                })
            })
            .await?;

        Ok(SessionLoad {
            session: Arc::clone(&loaded.session),
            fetched: fetched.load(Ordering::SeqCst),
        })
    }
}
