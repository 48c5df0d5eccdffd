//! Router construction for the personnel control server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{get, post, put},
    Extension, Router,
};
use minectl_core::ControlService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Build the full axum router with all routes and middleware.
///
/// With `reset_on_request` every medical request first runs the best-effort
/// shift reset, in addition to the background scheduler.
pub fn build_router(service: Arc<ControlService>, reset_on_request: bool) -> Router {
    let mut medical = Router::new()
        .route("/shift", get(handlers::medical::current_shift))
        .route(
            "/schedule",
            get(handlers::medical::get_schedule).post(handlers::medical::save_schedule),
        )
        .route(
            "/checks",
            get(handlers::medical::list_checks).post(handlers::medical::record_check),
        )
        .route("/stats", get(handlers::medical::stats))
        .route("/export", get(handlers::medical::export))
        .route("/scan", post(handlers::medical::scan))
        .route("/deny", post(handlers::medical::deny))
        .route("/reset", post(handlers::medical::reset))
        .route("/resets", get(handlers::medical::list_resets));
    if reset_on_request {
        medical = medical.layer(axum_mw::from_fn(handlers::medical::reset_on_request));
    }

    let personnel = Router::new()
        .route(
            "/",
            get(handlers::personnel::list).post(handlers::personnel::create),
        )
        .route("/stats", get(handlers::personnel::stats))
        .route("/search", get(handlers::personnel::search))
        .route("/:id/status", put(handlers::personnel::update_status))
        .route("/:id", put(handlers::personnel::edit))
        .route("/:id/history", get(handlers::personnel::history));

    let events = Router::new()
        .route("/", get(handlers::events::list_events))
        .route(
            "/notifications",
            get(handlers::events::list_notifications),
        )
        .route(
            "/notifications/read-all",
            put(handlers::events::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            put(handlers::events::mark_read),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/medical", medical)
        .nest("/api/personnel", personnel)
        .nest("/api/events", events)
        .layer(Extension(service))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
