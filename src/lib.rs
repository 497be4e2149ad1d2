use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, Method},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;

use tower::{Layer, ServiceBuilder, util::MapRequest, util::MapRequestLayer};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presenter;
pub mod repository;
pub mod session;
pub mod validation;

// Routing split by access level (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use presenter::{JsonPresenter, PresenterState};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// The OpenAPI description of every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_restaurants, handlers::new_restaurant_form, handlers::create_restaurant,
        handlers::show_restaurant, handlers::edit_restaurant_form, handlers::update_restaurant,
        handlers::delete_restaurant, handlers::create_review, handlers::delete_review,
        handlers::register_form, handlers::register, handlers::login_form, handlers::login,
        handlers::logout
    ),
    components(
        schemas(
            models::Restaurant, models::Review, models::UserProfile, models::RestaurantDetails,
            models::RestaurantInput, models::ReviewInput, models::RegisterForm, models::LoginForm,
        )
    ),
    tags(
        (name = "resto-find", description = "Restaurant listings and reviews")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The shared application state: persistence, presentation and configuration.
/// Cloned per request; every member is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres in production, in-memory in tests.
    pub repo: RepositoryState,
    /// Presentation Layer: turns a template name and data bag into a body.
    pub presenter: PresenterState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PresenterState {
    fn from_ref(app_state: &AppState) -> PresenterState {
        app_state.presenter.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_login
///
/// Route layer for the authenticated routes. Extracting `AuthUser` performs the
/// authentication check; a failed check short-circuits with the login redirect.
/// The resolved user is kept in the request extensions for the handler.
async fn require_login(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// method_override
///
/// HTML forms can only send GET and POST. A POST carrying `_method=PUT`,
/// `_method=PATCH` or `_method=DELETE` in its query string is rewritten to that
/// method before routing.
pub fn method_override(mut request: Request) -> Request {
    if request.method() != Method::POST {
        return request;
    }

    let overridden = request
        .uri()
        .query()
        .and_then(|query| query.split('&').find_map(|pair| pair.strip_prefix("_method=")))
        .and_then(|value| match value.to_ascii_uppercase().as_str() {
            "PUT" => Some(Method::PUT),
            "PATCH" => Some(Method::PATCH),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        });

    if let Some(method) = overridden {
        *request.method_mut() = method;
    }
    request
}

/// App
///
/// The complete service: the router wrapped by the method override, which must
/// run before routing.
pub type App = MapRequest<Router, fn(Request) -> Request>;

/// create_app
///
/// Builds the router and wraps it in the method override.
pub fn create_app(state: AppState) -> App {
    MapRequestLayer::new(method_override as fn(Request) -> Request).layer(create_router(state))
}

/// create_router
///
/// Assembles the routing structure, the error stage and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        // Public Routes: No authentication required.
        .merge(public::public_routes())
        // Authenticated Routes: Protected by `require_login`.
        .merge(authenticated::authenticated_routes().route_layer(
            middleware::from_fn_with_state(state.clone(), require_login),
        ))
        // Catch-all: unmatched paths, and known paths hit with a method they
        // do not serve, become a 404 failure.
        .method_not_allowed_fallback(error::not_found)
        .fallback(error::not_found)
        // Terminal error stage: renders every failure through the presenter.
        .layer(middleware::from_fn_with_state(
            state.presenter.clone(),
            error::render_errors,
        ))
        .with_state(state);

    // Observability and Correlation Layers (outermost).
    base_router.layer(
        ServiceBuilder::new()
            // Generates a unique UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // Wraps the request/response lifecycle in a span carrying the request ID.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // Returns the x-request-id header to the client.
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the per-request tracing span from the method, URI and the
/// `x-request-id` header, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
