use std::{env, path::PathBuf, time::Duration};

use crate::error::{ConsoleError, ConsoleResult};

/// AppConfig
///
/// Holds the console's configuration inputs. Nothing in here is computed at
/// navigation time: the allow-list, the login/home paths and the tab caching
/// switch are fixed when the context is built, and a fresh context (e.g. after
/// logout) reuses the same value.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects the log format and required settings.
    pub env: Env,
    // Base URL of the admin API that serves the user session.
    pub api_base_url: String,
    // Route the guard sends anonymous users to.
    pub login_path: String,
    // Route authenticated users land on when they hit the login page.
    pub home_path: String,
    // Paths reachable without a token. Always contains `login_path`.
    pub public_paths: Vec<String>,
    // Fallback page title when the route carries none.
    pub project_name: String,
    // Persist open tabs per user.
    pub cache_tabs: bool,
    // Minimum time the progress indicator stays visible.
    pub progress_min_visible: Duration,
    // File backing the persistent key-value store.
    pub storage_path: PathBuf,
    // Key under which the tab cache is stored.
    pub tab_cache_key: String,
}

/// Env
///
/// Runtime context. `Production` switches logging to JSON and makes the API
/// base URL mandatory.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/";
pub const DEFAULT_PROJECT_NAME: &str = "Admin Console";
pub const DEFAULT_TAB_CACHE_KEY: &str = "TAB_SETTING_CACHE_KEY";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_PROGRESS_MIN_MS: u64 = 200;

impl Default for AppConfig {
    /// Local settings with no environment lookups, used by tests and as the
    /// base for `load`.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            home_path: DEFAULT_HOME_PATH.to_string(),
            public_paths: vec![DEFAULT_LOGIN_PATH.to_string()],
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            cache_tabs: true,
            progress_min_visible: Duration::from_millis(DEFAULT_PROGRESS_MIN_MS),
            storage_path: PathBuf::from(".console/storage.json"),
            tab_cache_key: DEFAULT_TAB_CACHE_KEY.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the process environment. Production
    /// requires `CONSOLE_API_BASE_URL`; malformed boolean or numeric values are
    /// rejected instead of silently falling back.
    pub fn load() -> ConsoleResult<Self> {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match env {
            Env::Production => env::var("CONSOLE_API_BASE_URL").map_err(|_| {
                ConsoleError::Config("CONSOLE_API_BASE_URL must be set in production".into())
            })?,
            Env::Local => env::var("CONSOLE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
        };

        let login_path = env::var("CONSOLE_LOGIN_PATH")
            .unwrap_or_else(|_| DEFAULT_LOGIN_PATH.to_string());
        let home_path =
            env::var("CONSOLE_HOME_PATH").unwrap_or_else(|_| DEFAULT_HOME_PATH.to_string());

        let mut public_paths: Vec<String> = env::var("CONSOLE_PUBLIC_PATHS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !public_paths.contains(&login_path) {
            public_paths.insert(0, login_path.clone());
        }

        let cache_tabs = match env::var("CONSOLE_CACHE_TABS") {
            Ok(raw) => parse_bool("CONSOLE_CACHE_TABS", &raw)?,
            Err(_) => true,
        };

        let progress_ms = match env::var("CONSOLE_PROGRESS_MIN_MS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ConsoleError::Config(format!("CONSOLE_PROGRESS_MIN_MS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_PROGRESS_MIN_MS,
        };

        let defaults = Self::default();
        Ok(Self {
            env,
            api_base_url,
            login_path,
            home_path,
            public_paths,
            project_name: env::var("CONSOLE_PROJECT_NAME").unwrap_or(defaults.project_name),
            cache_tabs,
            progress_min_visible: Duration::from_millis(progress_ms),
            storage_path: env::var("CONSOLE_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            tab_cache_key: env::var("CONSOLE_TAB_CACHE_KEY").unwrap_or(defaults.tab_cache_key),
        })
    }

    /// True when `path` can be visited without a token.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }
}

fn parse_bool(key: &str, raw: &str) -> ConsoleResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConsoleError::Config(format!("{key} is not a boolean: {raw}"))),
    }
}
