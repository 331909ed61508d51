use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use admin_console::{
    AppConfig, ComponentRegistry, ConsoleContext, ConsoleError, ConsoleResult, RouteDefinition,
    models::RouteMeta,
    session::{HttpUserSessionStore, MemoryTokenStore, TokenState, UserSessionState},
    storage::{FileKeyValueStore, KeyValueState},
    telemetry,
    ui::{TracingUi, UiState},
};
use clap::Parser;
use serde::Serialize;

/// Drives the console's navigation pipeline from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "console-shell",
    version,
    about = "Replays navigations through the admin console guard and prints the resulting tabs"
)]
struct Cli {
    /// Access token; navigations run anonymously without one
    #[arg(short, long, env = "CONSOLE_TOKEN")]
    token: Option<String>,

    /// JSON object mapping server component paths to view names
    #[arg(short, long, value_name = "FILE")]
    components: Option<PathBuf>,

    /// Paths to navigate to, in order
    #[arg(value_name = "PATH", default_value = "/")]
    paths: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    path: String,
    landed_on: String,
    redirects: Vec<String>,
    title: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    telemetry::init_tracing(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!(error = %e, "console-shell failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: AppConfig) -> ConsoleResult<()> {
    let components = match &cli.components {
        Some(path) => load_components(path)?,
        None => ComponentRegistry::new(),
    };

    let tokens: TokenState = Arc::new(MemoryTokenStore::new());
    let sessions: UserSessionState = Arc::new(HttpUserSessionStore::new(&config.api_base_url));
    let storage: KeyValueState = Arc::new(FileKeyValueStore::new(config.storage_path.clone()));
    let ui: UiState = Arc::new(TracingUi);

    let services = admin_console::ConsoleServices {
        tokens,
        sessions,
        storage,
        ui,
        components,
        static_routes: static_routes(&config),
    };

    let mut console = ConsoleContext::new(config, services);
    if let Some(token) = cli.token {
        console.login(token);
    }

    let mut reports = Vec::new();
    for path in &cli.paths {
        let outcome = console.navigate(path).await?;
        reports.push(Report {
            path: path.clone(),
            landed_on: outcome.location.full_path,
            redirects: outcome
                .redirects
                .iter()
                .map(|r| format!("{:?} -> {}", r.reason, r.target.full_path))
                .collect(),
            title: outcome.title,
        });
    }

    let output = serde_json::json!({
        "navigations": reports,
        "tabs": console.tabs().tabs(),
        "cachedTabNames": console.tabs().cached_tab_names(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    tracing::debug!(routes = console.routes().get_routes().len(), "route table size");
    Ok(())
}

fn load_components(path: &Path) -> ConsoleResult<ComponentRegistry> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ConsoleError::Config(format!("cannot read {}: {e}", path.display())))?;
    let views: HashMap<String, String> = serde_json::from_str(&raw)
        .map_err(|e| ConsoleError::Config(format!("invalid component map: {e}")))?;
    Ok(views.into_iter().collect())
}

fn static_routes(config: &AppConfig) -> Vec<RouteDefinition> {
    vec![
        RouteDefinition::new("Login", &config.login_path).with_meta(RouteMeta {
            title: "Sign in".to_string(),
            ..RouteMeta::default()
        }),
        RouteDefinition::new("Home", &config.home_path).with_meta(RouteMeta {
            title: "Home".to_string(),
            affix: true,
            ..RouteMeta::default()
        }),
    ]
}
