//! Campus Dining ordering backend.
//!
//! REST API behind the campus food-ordering frontend: public menu browsing
//! and order placement/tracking, an admin surface for menu and order
//! management, and a thin JWT auth layer.
//!
//!
//!
//! # General Infrastructure
//! - axum server fronted by the host reverse proxy, CORS open to the SPA
//! - Redis as the document store, one hash per collection (see [`database`])
//! - Uploaded menu images live on local disk and are served from `/uploads`
//! - No background jobs, everything is request/response
//!
//!
//!
//! # Surface
//!
//! | Route | Auth | Purpose |
//! |---|---|---|
//! | `GET /menu`, `GET /menu/{id}` | public | browse the catalog |
//! | `POST /menu`, `PUT /menu/{id}`, `DELETE /menu/{id}` | admin | manage the catalog (multipart, optional image) |
//! | `POST /order` | public | place an order from the client cart snapshot |
//! | `GET /order/track/{id}` | public | track by human-readable order id |
//! | `GET /order/admin`, `PUT /order/admin/{id}/status` | admin | dashboard list + status moves |
//! | `POST /auth/register`, `POST /auth/login` | public | credentials and session tokens |
//!
//!
//!
//! # Notes
//!
//! ## Consistency
//! Each record is one JSON document written atomically; there are no
//! multi-document transactions. Image files are written outside the store,
//! with compensating deletes on failed record writes. Order ids are made
//! unique by insert-if-absent plus retry, not by a global lock.
//!
//! ## Setup
//!
//! ```sh
//! REDIS_URL=redis://127.0.0.1:6379 JWT_SECRET=dev-secret cargo run
//! ```

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod assets;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod menu;
pub mod orders;
pub mod routes;
pub mod state;
pub mod utils;

use routes::{
    login_handler, menu_create_handler, menu_delete_handler, menu_get_handler, menu_list_handler,
    menu_update_handler, order_admin_list_handler, order_create_handler, order_status_handler,
    order_track_handler, register_handler, root_handler,
};
use state::State;

/// Builds the full application router over the given state. Tests drive this
/// directly, `start_server` wraps it in a listener.
pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let uploads_root = state.assets.root().to_path_buf();

    Router::new()
        .route("/", get(root_handler))
        .route("/menu", get(menu_list_handler).post(menu_create_handler))
        .route(
            "/menu/{id}",
            get(menu_get_handler)
                .put(menu_update_handler)
                .delete(menu_delete_handler),
        )
        .route("/order", post(order_create_handler))
        .route("/order/track/{id}", get(order_track_handler))
        .route("/order/admin", get(order_admin_list_handler))
        .route("/order/admin/{id}/status", put(order_status_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .nest_service("/uploads", ServeDir::new(uploads_root))
        // Image uploads need more room than the stock body limit.
        .layer(DefaultBodyLimit::max(5 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");
    let router = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, router)
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
