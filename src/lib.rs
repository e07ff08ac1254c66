//! Flavour Fusion backend.
//!
//! A small HTTP API around three concerns: a storage interface over the
//! flavor/ingredient data model (in-memory or sqlite, see [`storage`]), a
//! client for the external vision/chat AI collaborator (see [`ai`]), and
//! the route layer tying the two together. Every endpoint is a stateless
//! request/response transaction; the only cross-call state lives in
//! storage (ingredients discovered during identification become visible to
//! later queries).
//!
//! # Setup
//!
//! Runs against the seeded in-memory store by default:
//! ```sh
//! cargo run
//! ```
//!
//! Point `DATABASE_URL` at a sqlite database for persistence, and set
//! `OPENAI_API_KEY` to enable the two AI-backed endpoints:
//! ```sh
//! DATABASE_URL="sqlite://flavour.db?mode=rwc" OPENAI_API_KEY=sk-... cargo run
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{delete, get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod ai;
pub mod config;
pub mod error;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;

use routes::{
    add_cuisine_preference_handler, add_dietary_preference_handler, add_flavor_preference_handler,
    add_user_ingredient_handler, create_ingredient_handler, create_user_handler,
    get_ingredient_handler, identify_ingredients_handler, ingredient_pairings_handler,
    list_cuisine_preferences_handler, list_dietary_preferences_handler,
    list_flavor_preferences_handler, list_ingredients_handler, list_pairings_handler,
    list_user_ingredients_handler, login_handler,
    pairing_recommendations_handler, remove_cuisine_preference_handler,
    remove_dietary_preference_handler, remove_user_ingredient_handler,
    update_flavor_preference_handler, update_user_ingredient_handler,
};
use state::AppState;

/// Uploads larger than this are rejected before the handler runs.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/users", post(create_user_handler))
        .route("/api/login", post(login_handler))
        .route(
            "/api/users/:user_id/dietary-preferences",
            get(list_dietary_preferences_handler),
        )
        .route("/api/dietary-preferences", post(add_dietary_preference_handler))
        .route(
            "/api/dietary-preferences/:id",
            delete(remove_dietary_preference_handler),
        )
        .route(
            "/api/users/:user_id/flavor-preferences",
            get(list_flavor_preferences_handler),
        )
        .route("/api/flavor-preferences", post(add_flavor_preference_handler))
        .route(
            "/api/flavor-preferences/:id",
            patch(update_flavor_preference_handler),
        )
        .route(
            "/api/users/:user_id/cuisine-preferences",
            get(list_cuisine_preferences_handler),
        )
        .route("/api/cuisine-preferences", post(add_cuisine_preference_handler))
        .route(
            "/api/cuisine-preferences/:id",
            delete(remove_cuisine_preference_handler),
        )
        .route(
            "/api/ingredients",
            get(list_ingredients_handler).post(create_ingredient_handler),
        )
        .route("/api/ingredients/:id", get(get_ingredient_handler))
        .route("/api/ingredients/:id/pairings", get(ingredient_pairings_handler))
        .route("/api/pairings", get(list_pairings_handler))
        .route(
            "/api/users/:user_id/ingredients",
            get(list_user_ingredients_handler),
        )
        .route("/api/user-ingredients", post(add_user_ingredient_handler))
        .route(
            "/api/user-ingredients/:id",
            patch(update_user_ingredient_handler).delete(remove_user_ingredient_handler),
        )
        .route(
            "/api/identify-ingredients",
            post(identify_ingredients_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/pairing-recommendations",
            post(pairing_recommendations_handler),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");
    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
