use crate::{
    AppState,
    auth::{AuthUser, FoundRestaurant, OwnedRestaurant, RESTAURANT_NOT_FOUND, parse_id},
    credentials,
    error::AppError,
    models::{LoginForm, RegisterForm, RestaurantDetails, RestaurantInput, ReviewInput, UserProfile},
    presenter::{self, PresenterError},
    session::Session,
    validation::{validate_restaurant, validate_review},
};
use axum::{
    Form, Json,
    extract::{FromRequest, Path, Request, State},
    response::{Redirect, Response},
};
use serde_json::{Value, json};
use utoipa::OpenApi;
use uuid::Uuid;

/// SubmittedForm
///
/// A urlencoded body. Unlike a bare `Form`, a body that cannot be read (wrong
/// content type, undecodable payload) fails as an `AppError`, so it is rendered
/// by the error stage like any other failure.
pub struct SubmittedForm<T>(pub T);

impl<S, T> FromRequest<S> for SubmittedForm<T>
where
    S: Send + Sync,
    Form<T>: FromRequest<S, Rejection = axum::extract::rejection::FormRejection>,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(request, state).await?;
        Ok(SubmittedForm(value))
    }
}

/// Raw urlencoded fields, validated by the handler before anything is stored.
type RawForm = SubmittedForm<Vec<(String, String)>>;

type PageResult = Result<(Session, Response), AppError>;
type RedirectResult = Result<(Session, Redirect), AppError>;

/// Renders `template` with `bag`, draining the session's flash queues into it.
fn page(state: &AppState, mut session: Session, template: &str, bag: Value) -> PageResult {
    let response = presenter::render(state.presenter.as_ref(), &mut session, template, bag)?;
    Ok((session, response))
}

fn restaurant_path(id: impl std::fmt::Display) -> String {
    format!("/restaurants/{id}")
}

// --- Restaurants ---

/// list_restaurants
///
/// [Public Route] Renders every restaurant.
#[utoipa::path(
    get,
    path = "/restaurants",
    responses((status = 200, description = "Listing view `restaurants/index`"))
)]
pub async fn list_restaurants(State(state): State<AppState>, session: Session) -> PageResult {
    let restaurants = state.repo.list_restaurants().await?;
    page(&state, session, "restaurants/index", json!({ "restaurants": restaurants }))
}

/// new_restaurant_form
///
/// [Authenticated Route] Renders the creation form.
#[utoipa::path(
    get,
    path = "/restaurants/new",
    responses(
        (status = 200, description = "Form view `restaurants/new`"),
        (status = 303, description = "Not logged in; redirect to /login")
    )
)]
pub async fn new_restaurant_form(
    _user: AuthUser,
    State(state): State<AppState>,
    session: Session,
) -> PageResult {
    page(&state, session, "restaurants/new", Value::Null)
}

/// create_restaurant
///
/// [Authenticated Route] Validates the submission and stores it with the
/// current user as author.
#[utoipa::path(
    post,
    path = "/restaurants",
    request_body(content = RestaurantInput, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created; redirect to the detail page"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_restaurant(
    user: AuthUser,
    State(state): State<AppState>,
    mut session: Session,
    SubmittedForm(form): RawForm,
) -> RedirectResult {
    let input = validate_restaurant(&form)?;
    let restaurant = state.repo.create_restaurant(input, user.id).await?;
    tracing::info!(restaurant = %restaurant.id, author = %user.id, "created restaurant");

    session.flash_success("Successfully created a new restaurant!");
    Ok((session, Redirect::to(&restaurant_path(restaurant.id))))
}

/// show_restaurant
///
/// [Public Route] Renders one restaurant with its reviews (in list order) and
/// its author populated.
#[utoipa::path(
    get,
    path = "/restaurants/{id}",
    params(("id" = Uuid, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "Detail view `restaurants/show`", body = RestaurantDetails),
        (status = 303, description = "Unknown restaurant; redirect to /restaurants"),
        (status = 500, description = "Malformed identifier")
    )
)]
pub async fn show_restaurant(
    State(state): State<AppState>,
    FoundRestaurant(restaurant): FoundRestaurant,
    session: Session,
) -> PageResult {
    let reviews = state.repo.get_reviews(&restaurant.reviews).await?;
    let author = state
        .repo
        .get_user(restaurant.author)
        .await?
        .map(UserProfile::from);

    let details = RestaurantDetails {
        restaurant,
        reviews,
        author,
    };
    let bag = serde_json::to_value(details).map_err(PresenterError::from)?;
    page(&state, session, "restaurants/show", bag)
}

/// edit_restaurant_form
///
/// [Owner Route] Renders the edit form.
#[utoipa::path(
    get,
    path = "/restaurants/{id}/edit",
    params(("id" = Uuid, Path, description = "Restaurant ID")),
    responses(
        (status = 200, description = "Form view `restaurants/edit`"),
        (status = 303, description = "Not logged in, unknown restaurant, or not the author")
    )
)]
pub async fn edit_restaurant_form(
    State(state): State<AppState>,
    OwnedRestaurant { restaurant, .. }: OwnedRestaurant,
    session: Session,
) -> PageResult {
    page(&state, session, "restaurants/edit", json!({ "restaurant": restaurant }))
}

/// update_restaurant
///
/// [Owner Route] Replaces every editable field. Author and reviews are kept.
#[utoipa::path(
    put,
    path = "/restaurants/{id}",
    params(("id" = Uuid, Path, description = "Restaurant ID")),
    request_body(content = RestaurantInput, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Updated; redirect to the detail page"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_restaurant(
    State(state): State<AppState>,
    OwnedRestaurant { restaurant, .. }: OwnedRestaurant,
    mut session: Session,
    SubmittedForm(form): RawForm,
) -> RedirectResult {
    let input = validate_restaurant(&form)?;

    match state.repo.update_restaurant(restaurant.id, input).await? {
        Some(updated) => {
            session.flash_success("Successfully updated the restaurant!");
            Ok((session, Redirect::to(&restaurant_path(updated.id))))
        }
        // Deleted between the ownership check and the update.
        None => {
            session.flash_error(RESTAURANT_NOT_FOUND);
            Ok((session, Redirect::to("/restaurants")))
        }
    }
}

/// delete_restaurant
///
/// [Owner Route] Deletes the restaurant together with all of its reviews.
#[utoipa::path(
    delete,
    path = "/restaurants/{id}",
    params(("id" = Uuid, Path, description = "Restaurant ID")),
    responses((status = 303, description = "Deleted; redirect to /restaurants"))
)]
pub async fn delete_restaurant(
    State(state): State<AppState>,
    OwnedRestaurant { restaurant, user }: OwnedRestaurant,
    mut session: Session,
) -> RedirectResult {
    if let Some(deleted) = state.repo.delete_restaurant(restaurant.id).await? {
        tracing::info!(
            restaurant = %deleted.id,
            user = %user.id,
            reviews = deleted.reviews.len(),
            "deleted restaurant"
        );
    }

    session.flash_success("Successfully deleted the restaurant!");
    Ok((session, Redirect::to("/restaurants")))
}

// --- Reviews ---

/// create_review
///
/// [Public Route] Validates the review, stores it and appends it to the
/// restaurant's review list. The submission is checked before the restaurant
/// is looked up, so an invalid review is a 400 whatever the target.
#[utoipa::path(
    post,
    path = "/restaurants/{id}/reviews",
    params(("id" = Uuid, Path, description = "Restaurant ID")),
    request_body(content = ReviewInput, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created; redirect to the restaurant"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut session: Session,
    SubmittedForm(form): RawForm,
) -> RedirectResult {
    let input = validate_review(&form)?;
    let restaurant_id = parse_id(&id)?;

    match state.repo.add_review(restaurant_id, input).await? {
        Some(review) => {
            tracing::info!(restaurant = %restaurant_id, review = %review.id, "created review");
            session.flash_success("Successfully created a new review!");
            Ok((session, Redirect::to(&restaurant_path(restaurant_id))))
        }
        None => {
            session.flash_error(RESTAURANT_NOT_FOUND);
            Ok((session, Redirect::to("/restaurants")))
        }
    }
}

/// delete_review
///
/// [Public Route] Pulls the review out of the restaurant's list and deletes
/// it. A review that the restaurant does not list is left alone. Reviews carry
/// no author, so there is no ownership check.
#[utoipa::path(
    delete,
    path = "/restaurants/{id}/reviews/{review_id}",
    params(
        ("id" = Uuid, Path, description = "Restaurant ID"),
        ("review_id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 303, description = "Redirect to the restaurant, or to /restaurants if it is unknown")
    )
)]
pub async fn delete_review(
    State(state): State<AppState>,
    Path((id, review_id)): Path<(String, String)>,
    mut session: Session,
) -> RedirectResult {
    let restaurant_id = parse_id(&id)?;
    let review_id = parse_id(&review_id)?;

    if state.repo.get_restaurant(restaurant_id).await?.is_none() {
        session.flash_error(RESTAURANT_NOT_FOUND);
        return Ok((session, Redirect::to("/restaurants")));
    }

    if state.repo.delete_review(restaurant_id, review_id).await? {
        session.flash_success("Successfully deleted the review!");
    } else {
        session.flash_error("Couldn't find that review!");
    }
    Ok((session, Redirect::to(&restaurant_path(restaurant_id))))
}

// --- Users ---

/// register_form
///
/// [Public Route] Renders the registration form.
#[utoipa::path(get, path = "/register", responses((status = 200, description = "Form view `users/register`")))]
pub async fn register_form(State(state): State<AppState>, session: Session) -> PageResult {
    page(&state, session, "users/register", Value::Null)
}

/// register
///
/// [Public Route] Creates a user with a hashed password and logs them in.
/// Blank fields and duplicate usernames/emails are flashed back to the form.
#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to /restaurants, or back to /register on failure"))
)]
pub async fn register(
    State(state): State<AppState>,
    mut session: Session,
    SubmittedForm(form): SubmittedForm<RegisterForm>,
) -> RedirectResult {
    match credentials::register(state.repo.as_ref(), &form.username, &form.email, &form.password).await {
        Ok(user) => {
            session.log_in(user.id);
            session.flash_success("Successfully created a new user! Welcome to RestoFind!");
            Ok((session, Redirect::to("/restaurants")))
        }
        Err(e) if e.is_user_facing() => {
            session.flash_error(e.to_string());
            Ok((session, Redirect::to("/register")))
        }
        Err(e) => Err(e.into()),
    }
}

/// login_form
///
/// [Public Route] Renders the login form.
#[utoipa::path(get, path = "/login", responses((status = 200, description = "Form view `users/login`")))]
pub async fn login_form(State(state): State<AppState>, session: Session) -> PageResult {
    page(&state, session, "users/login", Value::Null)
}

/// login
///
/// [Public Route] Establishes the session and returns the user to the page
/// that required the login, if any.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses((status = 303, description = "Redirect to the stored return path or /restaurants; /login on failure"))
)]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    SubmittedForm(form): SubmittedForm<LoginForm>,
) -> RedirectResult {
    match credentials::authenticate(state.repo.as_ref(), &form.username, &form.password).await? {
        Some(user) => {
            tracing::info!(user = %user.id, "logged in");
            session.log_in(user.id);
            session.flash_success("Successfully logged you in! Welcome back to RestoFind!");
            let destination = session
                .take_return_to()
                .unwrap_or_else(|| "/restaurants".to_string());
            Ok((session, Redirect::to(&destination)))
        }
        None => {
            session.flash_error("Password or username is incorrect");
            Ok((session, Redirect::to("/login")))
        }
    }
}

/// logout
///
/// [Public Route] Ends the session's login.
#[utoipa::path(get, path = "/logout", responses((status = 303, description = "Redirect to /restaurants")))]
pub async fn logout(mut session: Session) -> (Session, Redirect) {
    session.log_out();
    session.flash_success("Goodbye!");
    (session, Redirect::to("/restaurants"))
}

// --- Service ---

/// openapi_document
///
/// [Public Route] The generated OpenAPI description of the routes above.
pub async fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::ApiDoc::openapi())
}
