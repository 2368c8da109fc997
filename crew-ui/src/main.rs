//! Crew UI server - web interface for editing, running and reviewing a crew project.

mod routes;
mod run;
mod sse;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use axum::response::Html;
use axum::routing::get;
use clap::Parser;
use crew::io::config::load_config;
use crew::io::paths::{CONFIG_FILE, ProjectPaths, detect_root};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Parser)]
#[command(name = "crew-ui")]
#[command(about = "Web UI for running a crew and editing its configuration")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "8501")]
    port: u16,

    /// Project directory (searched upward for pyproject.toml or crew.toml)
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Serve UI static files from this directory instead of the built-in page
    #[arg(long)]
    ui_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crew_ui=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let start = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    let root = detect_root(&start);
    let config = load_config(&root.join(CONFIG_FILE)).context("load crew.toml")?;
    let paths = ProjectPaths::with_config(root, &config);
    info!(project_dir = %paths.root.display(), "starting crew-ui");

    let state = AppState::new(paths, config);
    match state.credential_file().resolve() {
        Ok(key) => state.set_credential(key),
        Err(e) => warn!(error = %format!("{e:#}"), "could not read saved credential"),
    }

    sse::start_file_watcher(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .nest("/api", routes::api_router())
        .route("/events", get(sse::events_handler))
        .layer(cors)
        .with_state(state);

    match args.ui_dir {
        Some(ui_dir) if ui_dir.exists() => {
            info!(ui_dir = %ui_dir.display(), "serving static UI files");
            app = app.fallback_service(ServeDir::new(ui_dir).append_index_html_on_directories(true));
        }
        Some(ui_dir) => {
            warn!(ui_dir = %ui_dir.display(), "UI directory not found, using built-in page");
            app = app.route("/", get(index));
        }
        None => {
            app = app.route("/", get(index));
        }
    }

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
