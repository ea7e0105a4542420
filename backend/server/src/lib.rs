//! Backend of a food purity checker.
//!
//! Users photograph a food sample, the photo is stored in the collaborator's bucket, a verdict is
//! produced for it and saved to the user's test history. A static catalogue lists the foods that
//! can be tested along with home testing guides.
//!
//!
//!
//! # General Infrastructure
//! - Accounts, sessions, tables and the image bucket live in a hosted collaborator (Supabase compatible)
//! - This service validates input, authenticates the bearer token and forwards the call
//! - Collaborator failures are classified into a fixed error taxonomy before reaching the client
//! - The verdict comes from a deterministic placeholder selector until a real model is wired in
//!
//!
//!
//! # Request Pipeline
//!
//! Every operation runs `validate -> authenticate -> call -> map`, see [`guard`].
//!
//! - Malformed input is rejected before any round trip
//! - Missing or unknown bearer tokens are `401` everywhere
//! - Errors are always `{ "error": "<message>" }`
//! - `analyze` is the one operation that can succeed after a failed write, returning `testId: null`
//!
//!
//!
//! # Setup
//!
//! Run against a hosted collaborator.
//! ```sh
//! SUPABASE_URL=https://<project>.supabase.co SUPABASE_ANON_KEY=<key> cargo run --bin purity
//! ```
//!
//! Run with in-memory tables, nothing persisted.
//! ```sh
//! PROVIDER=memory RUST_LOG=server=debug cargo run --bin purity
//! ```
//!
//! Walk through the whole flow against a running server.
//! ```sh
//! cargo run --bin tester -- --image sample.jpg
//! ```
//!
//!
//!
//! # Environment
//!
//! | Key | Default |
//! |---|---|
//! | `RUST_PORT` | `1111` |
//! | `PROVIDER` | `rest` |
//! | `SUPABASE_URL` | none |
//! | `SUPABASE_ANON_KEY` | none, read from `/run/secrets` first |
//! | `STORAGE_BUCKET` | `food-images` |
//! | `ANALYSIS_DELAY_MS` | `2000` |
//! | `CORS_MAX_AGE_SECS` | `3600` |
//! | `PUBLIC_BASE_URL` | `http://localhost:<port>` |
use std::sync::Arc;

use anyhow::Error;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod analysis;
pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod profile;
pub mod provider;
pub mod records;
pub mod routes;
pub mod selector;
pub mod state;
pub mod upload;
pub mod utils;

use routes::{
    analyze_handler, categories_handler, category_handler, create_test_handler,
    get_profile_handler, guide_handler, health_handler, list_tests_handler, sign_in_handler,
    sign_up_handler, stats_handler, update_profile_handler, upload_handler,
};
use state::AppState;
use upload::MAX_FILE_SIZE;

/// Room for the multipart framing around a file of the maximum size.
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE + 1024 * 1024;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(state.config.cors_max_age);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/signup", post(sign_up_handler))
        .route("/api/auth/signin", post(sign_in_handler))
        .route(
            "/api/profile",
            get(get_profile_handler).put(update_profile_handler),
        )
        .route("/api/tests", get(list_tests_handler).post(create_test_handler))
        .route("/api/tests/stats", get(stats_handler))
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/analyze", post(analyze_handler))
        .route("/api/categories", get(categories_handler))
        .route("/api/categories/{id}", get(category_handler))
        .route(
            "/api/categories/{id}/items/{item}/guide",
            get(guide_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> Result<(), Error> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::load()?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
