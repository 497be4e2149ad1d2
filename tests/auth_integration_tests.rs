use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode, header, request::Parts},
    response::Response,
};
use resto_find::{
    AppConfig, AppState, InMemoryRepository, JsonPresenter,
    auth::{AuthUser, LOGIN_REQUIRED},
    credentials::{self, CredentialError},
    error::ErrorReport,
    models::{NewUser, Restaurant, RestaurantInput, Review, ReviewInput, User},
    presenter::PresenterState,
    repository::{RepoError, RepoResult, Repository, RepositoryState},
    session::{SESSION_COOKIE, Session},
};
use std::sync::Arc;
use uuid::Uuid;

// --- Mock Repository for Infrastructure Failures ---

// Every call fails as if the database were unreachable.
struct UnreachableRepo;

fn unreachable<T>() -> RepoResult<T> {
    Err(RepoError::Database(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl Repository for UnreachableRepo {
    async fn list_restaurants(&self) -> RepoResult<Vec<Restaurant>> {
        unreachable()
    }
    async fn get_restaurant(&self, _id: Uuid) -> RepoResult<Option<Restaurant>> {
        unreachable()
    }
    async fn create_restaurant(&self, _input: RestaurantInput, _author: Uuid) -> RepoResult<Restaurant> {
        unreachable()
    }
    async fn update_restaurant(&self, _id: Uuid, _input: RestaurantInput) -> RepoResult<Option<Restaurant>> {
        unreachable()
    }
    async fn delete_restaurant(&self, _id: Uuid) -> RepoResult<Option<Restaurant>> {
        unreachable()
    }
    async fn clear_restaurants(&self) -> RepoResult<u64> {
        unreachable()
    }
    async fn get_reviews(&self, _ids: &[Uuid]) -> RepoResult<Vec<Review>> {
        unreachable()
    }
    async fn add_review(&self, _restaurant_id: Uuid, _input: ReviewInput) -> RepoResult<Option<Review>> {
        unreachable()
    }
    async fn delete_review(&self, _restaurant_id: Uuid, _review_id: Uuid) -> RepoResult<bool> {
        unreachable()
    }
    async fn get_user(&self, _id: Uuid) -> RepoResult<Option<User>> {
        unreachable()
    }
    async fn find_user_by_username(&self, _username: &str) -> RepoResult<Option<User>> {
        unreachable()
    }
    async fn create_user(&self, _user: NewUser) -> RepoResult<User> {
        unreachable()
    }
}

// --- Helpers ---

fn state_with(repo: RepositoryState) -> AppState {
    AppState {
        repo,
        presenter: Arc::new(JsonPresenter) as PresenterState,
        config: AppConfig::default(),
    }
}

fn secret() -> String {
    AppConfig::default().session_secret
}

fn parts_for(uri: &str, session: Option<&Session>) -> Parts {
    let mut builder = Request::builder().uri(uri);
    if let Some(session) = session {
        let cookie = format!("{}={}", SESSION_COOKIE, session.to_token().unwrap());
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(()).unwrap().into_parts().0
}

/// Reads the session a response hands back to the client.
fn session_from(response: &Response) -> Session {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set the session cookie")
        .to_str()
        .unwrap();
    let token = set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix(&format!("{SESSION_COOKIE}=")))
        .unwrap();
    Session::from_token(token, &secret())
}

async fn registered_user(repo: &InMemoryRepository) -> User {
    repo.create_user(NewUser {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password_hash: credentials::hash_password("hunter22").unwrap(),
    })
    .await
    .unwrap()
}

// --- Session ---

#[test]
fn test_session_survives_the_cookie_round_trip() {
    let user_id = Uuid::new_v4();
    let mut session = Session::new(&secret());
    session.log_in(user_id);
    session.flash_success("hello");
    session.set_return_to("/restaurants/new");

    let mut restored = Session::from_token(&session.to_token().unwrap(), &secret());

    assert_eq!(restored.user_id(), Some(user_id));
    assert_eq!(restored.take_return_to().as_deref(), Some("/restaurants/new"));
    assert_eq!(restored.take_flash().success, vec!["hello"]);
    // Draining empties the queue.
    assert!(restored.take_flash().is_empty());
}

#[test]
fn test_session_signed_with_another_secret_is_discarded() {
    let mut forged = Session::new("not-the-server-secret");
    forged.log_in(Uuid::new_v4());

    let restored = Session::from_token(&forged.to_token().unwrap(), &secret());

    assert_eq!(restored.user_id(), None);
}

#[test]
fn test_garbage_cookie_yields_empty_session() {
    let mut restored = Session::from_token("definitely.not.a-jwt", &secret());

    assert_eq!(restored.user_id(), None);
    assert!(restored.take_flash().is_empty());
}

#[test]
fn test_log_out_forgets_user_and_return_path() {
    let mut session = Session::new(&secret());
    session.log_in(Uuid::new_v4());
    session.set_return_to("/restaurants/new");

    session.log_out();

    assert_eq!(session.user_id(), None);
    assert_eq!(session.take_return_to(), None);
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_user_resolves_logged_in_user() {
    let repo = InMemoryRepository::new();
    let user = registered_user(&repo).await;
    let state = state_with(Arc::new(repo));

    let mut session = Session::new(&secret());
    session.log_in(user.id);
    let mut parts = parts_for("/restaurants/new", Some(&session));

    let auth_user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect("logged-in request should pass");

    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.username, "alice");
    // Cached for later stages of the same request.
    assert!(parts.extensions.get::<AuthUser>().is_some());
}

#[tokio::test]
async fn test_auth_user_redirects_anonymous_request_to_login() {
    let state = state_with(Arc::new(InMemoryRepository::new()));
    let mut parts = parts_for("/restaurants/new?from=nav", None);

    let response = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect_err("anonymous request should be rejected");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");

    let mut session = session_from(&response);
    assert_eq!(session.take_return_to().as_deref(), Some("/restaurants/new?from=nav"));
    assert_eq!(session.take_flash().error, vec![LOGIN_REQUIRED]);
}

#[tokio::test]
async fn test_auth_user_rejects_session_of_deleted_account() {
    let state = state_with(Arc::new(InMemoryRepository::new()));
    let mut session = Session::new(&secret());
    session.log_in(Uuid::new_v4());
    let mut parts = parts_for("/restaurants", Some(&session));

    let response = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect_err("unknown account should be rejected");

    assert_eq!(response.headers()[header::LOCATION], "/login");
    assert_eq!(session_from(&response).user_id(), None);
}

#[tokio::test]
async fn test_auth_user_surfaces_repository_failure() {
    let state = state_with(Arc::new(UnreachableRepo));
    let mut session = Session::new(&secret());
    session.log_in(Uuid::new_v4());
    let mut parts = parts_for("/restaurants/new", Some(&session));

    let response = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect_err("repository failure should be rejected");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let report = response.extensions().get::<ErrorReport>().unwrap();
    assert_eq!(report.message, "Oh No, Something Went Wrong!");
}

// --- Credentials ---

#[test]
fn test_password_hash_verifies_only_the_original() {
    let hash = credentials::hash_password("hunter22").unwrap();

    assert_ne!(hash, "hunter22");
    assert!(credentials::verify_password("hunter22", &hash));
    assert!(!credentials::verify_password("hunter23", &hash));
    assert!(!credentials::verify_password("hunter22", "not-a-phc-string"));
}

#[tokio::test]
async fn test_register_trims_and_rejects_blank_fields() {
    let repo = InMemoryRepository::new();

    let user = credentials::register(&repo, "  bob ", " bob@example.com ", "pw")
        .await
        .unwrap();
    assert_eq!(user.username, "bob");
    assert_eq!(user.email, "bob@example.com");

    let missing = credentials::register(&repo, "   ", "x@example.com", "pw").await;
    assert!(matches!(missing, Err(CredentialError::MissingUsername)));

    let missing = credentials::register(&repo, "carol", "c@example.com", "").await;
    assert!(matches!(missing, Err(CredentialError::MissingPassword)));
}

#[tokio::test]
async fn test_duplicate_email_is_user_facing() {
    let repo = InMemoryRepository::new();
    credentials::register(&repo, "bob", "bob@example.com", "pw")
        .await
        .unwrap();

    let err = credentials::register(&repo, "robert", "bob@example.com", "pw")
        .await
        .unwrap_err();

    assert!(err.is_user_facing());
    assert_eq!(err.to_string(), "A user with the given email is already registered");
}

#[tokio::test]
async fn test_authenticate_checks_username_and_password() {
    let repo = InMemoryRepository::new();
    let user = registered_user(&repo).await;

    let found = credentials::authenticate(&repo, "alice", "hunter22").await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    let wrong = credentials::authenticate(&repo, "alice", "nope").await.unwrap();
    assert!(wrong.is_none());

    let unknown = credentials::authenticate(&repo, "mallory", "hunter22").await.unwrap();
    assert!(unknown.is_none());
}
