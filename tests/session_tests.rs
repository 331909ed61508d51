use admin_console::{
    ConsoleError,
    models::UserSession,
    session::{
        HttpUserSessionStore, MemoryTokenStore, MockUserSessionStore, SessionSlot, TokenStore,
        UserSessionStore,
    },
};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

fn session(id: &str) -> UserSession {
    UserSession {
        id: id.to_string(),
        username: "admin".into(),
        menus: Vec::new(),
    }
}

// --- Token store ---

#[test]
fn test_token_store_set_and_clear() {
    let tokens = MemoryTokenStore::new();
    assert!(tokens.get_token().is_none());

    tokens.set_token("abc".into());
    assert_eq!(tokens.get_token().as_deref(), Some("abc"));

    tokens.clear_token();
    assert!(tokens.get_token().is_none());
}

#[test]
fn test_empty_token_counts_as_missing() {
    assert!(MemoryTokenStore::with_token("").get_token().is_none());
}

// --- Session stores ---

#[tokio::test]
async fn test_mock_store_counts_and_fails() {
    let ok = MockUserSessionStore::new(session("1"));
    assert_eq!(ok.fetch_user_info("t").await.unwrap().id, "1");
    assert_eq!(ok.call_count(), 1);

    let failing = MockUserSessionStore::new_failing();
    let err = failing.fetch_user_info("t").await.unwrap_err();
    assert!(matches!(err, ConsoleError::SessionFetch(_)));
}

#[test]
fn test_http_store_url_trims_trailing_slash() {
    let store = HttpUserSessionStore::new("http://localhost:8080/api/");
    assert_eq!(store.user_info_url(), "http://localhost:8080/api/user/info");
}

#[tokio::test]
async fn test_http_store_unreachable_is_session_fetch_error() {
    // Nothing listens on port 1.
    let store = HttpUserSessionStore::new("http://127.0.0.1:1");
    let err = store.fetch_user_info("token").await.unwrap_err();
    assert!(matches!(err, ConsoleError::SessionFetch(_)));
}

// --- Session slot ---

#[tokio::test]
async fn test_slot_loads_once_and_runs_callback_once() {
    let slot = SessionSlot::new();
    let store = MockUserSessionStore::new(session("9"));
    let tokens = MemoryTokenStore::with_token("t");
    let callbacks = AtomicUsize::new(0);

    let first = slot
        .get_or_load(&store, &tokens, |_| {
            callbacks.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    let second = slot
        .get_or_load(&store, &tokens, |_| {
            callbacks.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert!(first.fetched);
    assert!(!second.fetched);
    assert_eq!(second.session.id, "9");
    assert_eq!(store.call_count(), 1);
    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(slot.user_id().as_deref(), Some("9"));
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    let slot = SessionSlot::new();
    let store = MockUserSessionStore::new(session("9")).with_delay(Duration::from_millis(30));
    let tokens = MemoryTokenStore::with_token("t");

    let (a, b) = tokio::join!(
        slot.get_or_load(&store, &tokens, |_| {}),
        slot.get_or_load(&store, &tokens, |_| {}),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(store.call_count(), 1);
    assert!(a.fetched ^ b.fetched);
}

#[tokio::test]
async fn test_missing_token_is_auth_expired() {
    let slot = SessionSlot::new();
    let store = MockUserSessionStore::new(session("9"));

    let err = slot
        .get_or_load(&store, &MemoryTokenStore::new(), |_| {})
        .await
        .unwrap_err();

    assert_eq!(err, ConsoleError::AuthExpired);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_failed_load_leaves_slot_empty_for_retry() {
    let slot = SessionSlot::new();
    let tokens = MemoryTokenStore::with_token("t");

    let failing = MockUserSessionStore::new_failing();
    assert!(slot.get_or_load(&failing, &tokens, |_| {}).await.is_err());
    assert!(!slot.is_loaded());
    assert!(slot.user_id().is_none());

    let working = MockUserSessionStore::new(session("3"));
    let load = slot.get_or_load(&working, &tokens, |_| {}).await.unwrap();
    assert!(load.fetched);
    assert!(slot.is_loaded());
}

#[tokio::test]
async fn test_slot_is_stale_once_its_token_is_gone_or_replaced() {
    let slot = SessionSlot::new();
    assert!(!slot.is_stale(None));

    let store = MockUserSessionStore::new(session("9"));
    slot.get_or_load(&store, &MemoryTokenStore::with_token("t1"), |_| {})
        .await
        .unwrap();

    assert!(!slot.is_stale(Some("t1")));
    assert!(slot.is_stale(Some("t2")));
    assert!(slot.is_stale(None));
}

#[tokio::test]
async fn test_reset_drops_the_session_and_next_load_fetches_again() {
    let slot = SessionSlot::new();
    let store = MockUserSessionStore::new(session("9"));
    let tokens = MemoryTokenStore::with_token("t");
    slot.get_or_load(&store, &tokens, |_| {}).await.unwrap();

    slot.reset();
    assert!(!slot.is_loaded());
    assert!(slot.get().is_none());
    assert!(slot.user_id().is_none());

    let load = slot.get_or_load(&store, &tokens, |_| {}).await.unwrap();
    assert!(load.fetched);
    assert_eq!(store.call_count(), 2);
}
