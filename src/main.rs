//! Trash Tracker Backend
//!
//! A production-grade REST backend hosting the trash-drop composition workflow
//! with SQLite persistence.

mod api;
mod auth;
mod catalog;
mod composer;
mod config;
mod db;
mod draft;
mod eligibility;
mod errors;
mod geo;
mod models;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use catalog::SiteCatalog;
use composer::ComposerSession;
use config::Config;
use db::Repository;
use eligibility::EligibilityGate;

/// Live composition sessions, one lock per session.
pub type SessionStore = Arc<RwLock<HashMap<Uuid, Arc<Mutex<ComposerSession>>>>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub catalog: Arc<RwLock<Arc<SiteCatalog>>>,
    pub sessions: SessionStore,
    pub gate: Arc<EligibilityGate>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Cheap snapshot of the current reference catalog.
    pub async fn catalog_snapshot(&self) -> Arc<SiteCatalog> {
        self.catalog.read().await.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Trash Tracker Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Environment: {}", config.environment.as_str());

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (TRASHDROP_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Load reference data into the catalog
    let towns = repo.list_towns().await?;
    let sites = repo.list_sites().await?;
    tracing::info!(
        "Loaded {} towns and {} collection sites",
        towns.len(),
        sites.len()
    );
    let catalog = Arc::new(RwLock::new(Arc::new(SiteCatalog::new(towns, sites))));

    // The gate is the only consumer of the deployment environment
    let gate = Arc::new(EligibilityGate::new(config.environment));

    // Create application state
    let state = AppState {
        repo,
        catalog,
        sessions: Arc::new(RwLock::new(HashMap::new())),
        gate,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Reference data
        .route("/reference", get(api::get_reference))
        .route("/reference", put(api::replace_reference))
        .route("/reference/revision", get(api::get_revision))
        .route("/towns", get(api::list_towns))
        .route("/towns/{id}/sites", get(api::list_town_sites))
        .route("/sites", get(api::list_sites))
        // Composition sessions
        .route("/sessions", post(api::create_session))
        .route("/sessions/{id}", get(api::get_session))
        .route("/sessions/{id}", delete(api::close_session))
        .route("/sessions/{id}/events", post(api::post_event))
        .route("/sessions/{id}/submit", post(api::submit_session))
        // Drops
        .route("/drops", get(api::list_drops))
        .route("/drops/{id}", get(api::get_drop))
        .route("/drops/{id}", put(api::update_drop))
        .route("/drops/{id}", delete(api::delete_drop))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
