use admin_console::{
    models::{RouteDefinition, RouteLocation, RouteMeta, Tab, UserSession},
    route_table::{MemoryRouteTable, RouteTableState},
    session::{MemoryTokenStore, MockUserSessionStore, SessionSlot, TokenState, TokenStore},
    storage::{KeyValueStore, MemoryKeyValueStore, TabCache},
    tabs::TabSessionManager,
};
use std::sync::Arc;

const CACHE_KEY: &str = "TAB_SETTING_CACHE_KEY";

// --- Helpers ---

fn pinned(name: &str, path: &str) -> RouteDefinition {
    RouteDefinition::new(name, path).with_meta(RouteMeta {
        title: name.to_string(),
        affix: true,
        ..RouteMeta::default()
    })
}

fn table_with_pinned_a() -> RouteTableState {
    Arc::new(MemoryRouteTable::with_routes(vec![
        pinned("A", "/a"),
        RouteDefinition::new("B", "/b"),
    ]))
}

fn uncached() -> TabSessionManager {
    TabSessionManager::new(Arc::new(MemoryRouteTable::new()), None, "/login")
}

async fn loaded_slot(user_id: &str) -> Arc<SessionSlot> {
    let slot = Arc::new(SessionSlot::new());
    let store = MockUserSessionStore::new(UserSession {
        id: user_id.to_string(),
        ..UserSession::default()
    });
    let tokens = MemoryTokenStore::with_token("t");
    slot.get_or_load(&store, &tokens, |_| {}).await.unwrap();
    slot
}

struct Cached {
    manager: TabSessionManager,
    store: Arc<MemoryKeyValueStore>,
    tokens: Arc<MemoryTokenStore>,
}

async fn cached(routes: RouteTableState, user_id: &str) -> Cached {
    let store = Arc::new(MemoryKeyValueStore::new());
    let tokens = Arc::new(MemoryTokenStore::with_token("t"));
    let token_state: TokenState = tokens.clone();
    let cache = TabCache::new(store.clone(), token_state, loaded_slot(user_id).await, CACHE_KEY);
    Cached {
        manager: TabSessionManager::new(routes, Some(cache), "/login"),
        store,
        tokens,
    }
}

fn paths(tabs: &[Tab]) -> Vec<&str> {
    tabs.iter().map(|t| t.path.as_str()).collect()
}

// --- add_tab ---

#[test]
fn test_distinct_adds_preserve_order_and_count() {
    let mut manager = uncached();
    let inputs = ["/x", "/b", "/a", "/z", "/c"];
    for path in inputs {
        manager.add_tab(Tab::new(path));
    }

    assert_eq!(manager.tabs().len(), inputs.len());
    assert_eq!(paths(manager.tabs()), inputs.to_vec());
}

#[test]
fn test_add_is_idempotent_per_path() {
    let mut manager = uncached();
    manager.add_tab(Tab::new("/a").named("First"));
    let tabs = manager.add_tab(Tab::new("/a").named("Second"));

    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs[0].name, "First");
}

#[test]
fn test_add_promotes_keep_alive_in_place() {
    let mut manager = uncached();
    manager.add_tab(Tab::new("/a").named("A"));
    manager.add_tab(Tab::new("/b").named("B"));

    let tabs = manager.add_tab(Tab::new("/a").named("A").kept_alive());
    assert_eq!(paths(&tabs), vec!["/a", "/b"]);
    assert!(tabs[0].keep_alive);

    // Never demoted.
    let tabs = manager.add_tab(Tab::new("/a").named("A"));
    assert!(tabs[0].keep_alive);
}

#[test]
fn test_add_ignores_empty_path() {
    let mut manager = uncached();
    assert!(manager.add_tab(Tab::new("")).is_empty());
}

// --- close operations ---

#[test]
fn test_remove_one_never_closes_pinned_tabs() {
    let mut manager = uncached();
    manager.add_tab(Tab::new("/a").affixed());
    manager.add_tab(Tab::new("/b"));

    // The incoming copy claims not to be pinned; the stored entry still wins.
    let tabs = manager.remove_one_tab(&Tab::new("/a"));
    assert_eq!(paths(&tabs), vec!["/a", "/b"]);

    let tabs = manager.remove_one_tab(&Tab::new("/a").affixed());
    assert_eq!(paths(&tabs), vec!["/a", "/b"]);

    let tabs = manager.remove_one_tab(&Tab::new("/b"));
    assert_eq!(paths(&tabs), vec!["/a"]);
}

#[test]
fn test_remove_all_keeps_the_pinned_subset() {
    let mut manager = uncached();
    manager.add_tab(Tab::new("/a").affixed());
    manager.add_tab(Tab::new("/b"));

    let tabs = manager.remove_all_tabs();
    assert_eq!(tabs, vec![Tab::new("/a").affixed()]);
}

#[test]
fn test_remove_all_keeps_pinned_order_for_mixed_sequences() {
    let mut manager = uncached();
    for (path, affix) in [("/p1", true), ("/x", false), ("/p2", true), ("/y", false), ("/p3", true)] {
        let tab = Tab::new(path);
        manager.add_tab(if affix { tab.affixed() } else { tab });
    }

    assert_eq!(paths(&manager.remove_all_tabs()), vec!["/p1", "/p2", "/p3"]);
}

#[test]
fn test_remove_other_from_fresh_state() {
    let mut manager = TabSessionManager::new(table_with_pinned_a(), None, "/login");
    manager.create_tabs();

    let tabs = manager.remove_other_tabs(Tab::new("/c"));
    assert_eq!(paths(&tabs), vec!["/a", "/c"]);
    assert!(tabs[0].affix);
    assert!(!tabs[1].affix);
}

#[test]
fn test_remove_other_with_pinned_tab_does_not_duplicate() {
    let mut manager = TabSessionManager::new(table_with_pinned_a(), None, "/login");
    manager.create_tabs();
    manager.add_tab(Tab::new("/b"));

    let tabs = manager.remove_other_tabs(Tab::new("/a").named("A").affixed());
    assert_eq!(paths(&tabs), vec!["/a"]);
}

#[test]
fn test_remove_other_with_empty_path_keeps_only_pinned() {
    let mut manager = TabSessionManager::new(table_with_pinned_a(), None, "/login");
    manager.create_tabs();
    manager.add_tab(Tab::new("/b"));

    let tabs = manager.remove_other_tabs(Tab::new(""));
    assert_eq!(paths(&tabs), vec!["/a"]);
}

#[test]
fn test_remove_list_skips_pinned_entries() {
    let mut manager = uncached();
    manager.add_tab(Tab::new("/a").affixed());
    manager.add_tab(Tab::new("/b"));
    manager.add_tab(Tab::new("/c"));

    let tabs = manager.remove_list_tabs(&[Tab::new("/a"), Tab::new("/c"), Tab::new("/zzz")]);
    assert_eq!(paths(&tabs), vec!["/a", "/b"]);
}

// --- cached_tab_names ---

#[test]
fn test_cached_names_are_distinct_and_filtered() {
    let mut manager = uncached();
    manager.add_tab(Tab::new("/users/1").named("UserDetail").kept_alive());
    manager.add_tab(Tab::new("/users/2").named("UserDetail").kept_alive());
    manager.add_tab(Tab::new("/menus").named("Menus"));
    manager.add_tab(Tab::new("/anon").kept_alive());
    manager.add_tab(Tab::new("/dash").named("Dash").kept_alive());

    let names: Vec<String> = manager.cached_tab_names().into_iter().collect();
    assert_eq!(names, vec!["Dash".to_string(), "UserDetail".to_string()]);
}

// --- create_tabs / open_location ---

#[test]
fn test_create_tabs_seeds_pinned_routes_including_children() {
    let parent = RouteDefinition {
        children: vec![pinned("Overview", "overview")],
        ..RouteDefinition::new("Reports", "/reports")
    };
    let routes: RouteTableState =
        Arc::new(MemoryRouteTable::with_routes(vec![pinned("Home", "/"), parent]));
    let mut manager = TabSessionManager::new(routes, None, "/login");

    let tabs = manager.create_tabs();
    assert_eq!(paths(&tabs), vec!["/", "/reports/overview"]);
    assert_eq!(tabs[1].name, "Overview");
}

#[test]
fn test_create_tabs_without_pinned_routes_is_empty() {
    let mut manager = uncached();
    assert!(manager.create_tabs().is_empty());
}

#[test]
fn test_open_location_skips_login_and_unresolved_pages() {
    let mut manager = uncached();
    manager.open_location(&RouteLocation::parse("/login"));
    manager.open_location(&RouteLocation::parse("/missing"));
    assert!(manager.tabs().is_empty());

    let route = RouteDefinition::new("Dash", "/dash").with_meta(RouteMeta {
        title: "Dashboard".into(),
        keep_alive: true,
        ..RouteMeta::default()
    });
    let tabs = manager.open_location(&RouteLocation::parse("/dash?x=1").resolved(&route));
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs[0].path, "/dash");
    assert_eq!(tabs[0].title, "Dashboard");
    assert!(tabs[0].keep_alive);
}

// --- persistence ---

#[tokio::test]
async fn test_mutations_persist_for_the_user() {
    let mut c = cached(table_with_pinned_a(), "7").await;
    c.manager.create_tabs();
    c.manager.add_tab(Tab::new("/b"));

    let raw = c.store.get_item(CACHE_KEY).unwrap().expect("cache written");
    let data: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let cached_paths: Vec<&str> = data["7"]["tabs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["path"].as_str().unwrap())
        .collect();
    assert_eq!(cached_paths, vec!["/a", "/b"]);
}

#[tokio::test]
async fn test_create_tabs_restores_from_cache() {
    let mut first = cached(table_with_pinned_a(), "7").await;
    first.manager.create_tabs();
    first.manager.add_tab(Tab::new("/b").named("B").kept_alive());
    first.manager.add_tab(Tab::new("/c"));

    let token_state: TokenState = first.tokens.clone();
    let cache = TabCache::new(first.store.clone(), token_state, loaded_slot("7").await, CACHE_KEY);
    let mut second = TabSessionManager::new(table_with_pinned_a(), Some(cache), "/login");

    let tabs = second.create_tabs();
    assert_eq!(paths(&tabs), vec!["/a", "/b", "/c"]);
    assert!(second.cached_tab_names().contains("B"));
}

#[tokio::test]
async fn test_other_users_cache_is_not_restored() {
    let mut first = cached(table_with_pinned_a(), "7").await;
    first.manager.add_tab(Tab::new("/secret"));

    let token_state: TokenState = first.tokens.clone();
    let cache = TabCache::new(first.store.clone(), token_state, loaded_slot("8").await, CACHE_KEY);
    let mut other = TabSessionManager::new(table_with_pinned_a(), Some(cache), "/login");

    assert_eq!(paths(&other.create_tabs()), vec!["/a"]);
}

#[tokio::test]
async fn test_no_token_means_no_write() {
    let mut c = cached(table_with_pinned_a(), "7").await;
    c.tokens.clear_token();

    c.manager.add_tab(Tab::new("/b"));
    c.manager.remove_all_tabs();

    assert_eq!(c.store.write_count(), 0);
    assert!(c.store.get_item(CACHE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_remove_list_persists_only_on_change() {
    let mut c = cached(table_with_pinned_a(), "7").await;
    c.manager.add_tab(Tab::new("/b"));
    let writes = c.store.write_count();

    c.manager.remove_list_tabs(&[Tab::new("/nothing")]);
    assert_eq!(c.store.write_count(), writes);

    c.manager.remove_list_tabs(&[Tab::new("/b")]);
    assert_eq!(c.store.write_count(), writes + 1);
}

#[tokio::test]
async fn test_failing_storage_does_not_break_tab_operations() {
    let store = Arc::new(MemoryKeyValueStore::new_failing());
    let tokens: TokenState = Arc::new(MemoryTokenStore::with_token("t"));
    let cache = TabCache::new(store, tokens, loaded_slot("7").await, CACHE_KEY);
    let mut manager = TabSessionManager::new(table_with_pinned_a(), Some(cache), "/login");

    manager.create_tabs();
    let tabs = manager.add_tab(Tab::new("/b"));
    assert_eq!(paths(&tabs), vec!["/a", "/b"]);
}
