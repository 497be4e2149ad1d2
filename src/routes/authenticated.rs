use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes that require a logged-in user. The `require_login` layer is applied
/// to this router as a whole; the edit/update/delete handlers additionally run
/// the ownership check through the `OwnedRestaurant` extractor.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /restaurants/new
        // Static segment; takes precedence over /restaurants/{id}.
        .route("/restaurants/new", get(handlers::new_restaurant_form))
        // POST /restaurants
        // The author is always the logged-in user.
        .route("/restaurants", post(handlers::create_restaurant))
        // GET /restaurants/{id}/edit
        .route("/restaurants/{id}/edit", get(handlers::edit_restaurant_form))
        // PUT/PATCH/DELETE /restaurants/{id}
        // Owner only. PATCH is accepted as a full-field update too.
        .route(
            "/restaurants/{id}",
            put(handlers::update_restaurant)
                .patch(handlers::update_restaurant)
                .delete(handlers::delete_restaurant),
        )
}
