//! The authorization pipeline.
//!
//! Each stage is an extractor. Axum runs a handler's extractors in argument
//! order, so listing `AuthUser`, `FoundRestaurant` or `OwnedRestaurant` in a
//! handler's signature builds the pipeline for that route. A stage either
//! yields its value (continue, with the loaded data available to the handler)
//! or rejects with a finished response (halt). It never does both.

use std::collections::HashMap;

use axum::{
    extract::{FromRef, FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::Restaurant,
    repository::RepositoryState,
    session::Session,
};

pub const LOGIN_REQUIRED: &str = "You must be logged in!";
pub const RESTAURANT_NOT_FOUND: &str = "Couldn't find that restaurant!";
pub const PERMISSION_DENIED: &str = "You do not have permission to do that!";

/// AuthUser
///
/// The resolved identity of a logged-in request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Parses an identifier from a path segment. A malformed identifier is a hard
/// failure, unlike a well-formed one that matches nothing.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::MalformedId(raw.to_string()))
}

/// AuthUser Extractor Implementation (authentication check)
///
/// Succeeds when the session names a user that still exists. Otherwise the
/// requested path is remembered as `return_to`, an error flash is queued and
/// the request is redirected to `/login`.
///
/// A `require_login` route layer may already have resolved the user; it is
/// then taken from the request extensions without a second lookup.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let Ok(mut session) = Session::from_request_parts(parts, state).await;

        if let Some(user_id) = session.user_id() {
            match repo.get_user(user_id).await {
                Ok(Some(user)) => {
                    let auth_user = AuthUser {
                        id: user.id,
                        username: user.username,
                    };
                    parts.extensions.insert(auth_user.clone());
                    return Ok(auth_user);
                }
                // The account is gone; fall through to the login redirect.
                Ok(None) => session.log_out(),
                Err(e) => return Err(AppError::from(e).into_response()),
            }
        }

        let requested = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        tracing::debug!(path = %requested, "login required");

        session.set_return_to(requested);
        session.flash_error(LOGIN_REQUIRED);
        Err((session, Redirect::to("/login")).into_response())
    }
}

/// FoundRestaurant (existence check)
///
/// Loads the restaurant named by the `id` path parameter. A malformed id fails
/// through the error stage; an unknown id queues an error flash and redirects
/// to the listing.
#[derive(Debug, Clone)]
pub struct FoundRestaurant(pub Restaurant);

impl<S> FromRequestParts<S> for FoundRestaurant
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let raw = params.get("id").map(String::as_str).unwrap_or_default();
        let id = parse_id(raw).map_err(IntoResponse::into_response)?;

        let repo = RepositoryState::from_ref(state);
        match repo.get_restaurant(id).await {
            Ok(Some(restaurant)) => Ok(FoundRestaurant(restaurant)),
            Ok(None) => {
                let Ok(mut session) = Session::from_request_parts(parts, state).await;
                session.flash_error(RESTAURANT_NOT_FOUND);
                Err((session, Redirect::to("/restaurants")).into_response())
            }
            Err(e) => Err(AppError::from(e).into_response()),
        }
    }
}

/// OwnedRestaurant (ownership check)
///
/// Runs the authentication and existence checks, then requires the logged-in
/// user to be the restaurant's author. A foreign user is sent back to the
/// detail page with an error flash.
#[derive(Debug, Clone)]
pub struct OwnedRestaurant {
    pub user: AuthUser,
    pub restaurant: Restaurant,
}

impl<S> FromRequestParts<S> for OwnedRestaurant
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let FoundRestaurant(restaurant) = FoundRestaurant::from_request_parts(parts, state).await?;

        if restaurant.author != user.id {
            tracing::debug!(user = %user.id, restaurant = %restaurant.id, "ownership check failed");
            let Ok(mut session) = Session::from_request_parts(parts, state).await;
            session.flash_error(PERMISSION_DENIED);
            return Err((session, Redirect::to(&format!("/restaurants/{}", restaurant.id))).into_response());
        }

        Ok(OwnedRestaurant { user, restaurant })
    }
}
