//! trivia-rush-back binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clock;
mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use services::storage_supervisor;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let mongo_uri = env::var("MONGO_URI").ok().filter(|uri| !uri.is_empty());
    match mongo_uri {
        Some(uri) => spawn_mongo_supervisor(app_state.clone(), uri)?,
        None => storage_supervisor::install_memory_store(&app_state).await,
    }
    tokio::spawn(storage_supervisor::run_session_sweeper(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Hand the MongoDB connection to the supervisor task, which installs the
/// store once it is reachable and keeps it healthy afterwards.
#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState, uri: String) -> anyhow::Result<()> {
    let db_name = env::var("MONGO_DB").ok();
    tokio::spawn(storage_supervisor::run_mongo_supervisor(state, uri, db_name));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: SharedState, _uri: String) -> anyhow::Result<()> {
    anyhow::bail!("MONGO_URI is set but the binary was built without the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    let mut app = routes::router(state.clone());

    // Stored question images are served statically when media is configured.
    if let Some(root) = state.config().media_root() {
        app = app.nest_service(state.config().media_public_base(), ServeDir::new(root));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
