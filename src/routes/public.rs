use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Public Router Module
///
/// Endpoints reachable without logging in: browsing, reviews, and the
/// registration/login flow.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api-docs/openapi.json
        .route("/api-docs/openapi.json", get(handlers::openapi_document))
        // GET /restaurants
        .route("/restaurants", get(handlers::list_restaurants))
        // GET /restaurants/{id}
        // Unknown ids redirect back to the listing with a flash message.
        .route("/restaurants/{id}", get(handlers::show_restaurant))
        // POST /restaurants/{id}/reviews
        .route("/restaurants/{id}/reviews", post(handlers::create_review))
        // DELETE /restaurants/{id}/reviews/{review_id}
        .route(
            "/restaurants/{id}/reviews/{review_id}",
            delete(handlers::delete_review),
        )
        // GET/POST /register
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        // GET/POST /login
        .route("/login", get(handlers::login_form).post(handlers::login))
        // GET /logout
        .route("/logout", get(handlers::logout))
}
