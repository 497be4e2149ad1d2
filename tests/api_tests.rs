use axum::{ServiceExt, extract::Request};
use resto_find::{
    AppConfig, AppState, InMemoryRepository, JsonPresenter, create_app,
    presenter::PresenterState,
    repository::RepositoryState,
};
use reqwest::{StatusCode, header, redirect::Policy};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

/// Serves the full application over a real socket, backed by the in-memory
/// repository.
async fn spawn_app() -> TestApp {
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        presenter: Arc::new(JsonPresenter) as PresenterState,
        config: AppConfig::default(),
    };
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
            .await
            .unwrap();
    });

    TestApp { address }
}

/// Redirects are inspected, not followed.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

/// The `name=value` part of the session cookie a response sets.
fn session_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set the session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_app().await;
    let response = client()
        .get(format!("{}/restaurants", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_restaurant_lifecycle_over_http() {
    let app = spawn_app().await;
    let client = client();

    // Register (and get logged in)
    let response = client
        .post(format!("{}/register", app.address))
        .form(&[
            ("username", "alice"),
            ("email", "alice@example.com"),
            ("password", "hunter22"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let mut cookie = session_cookie(&response);

    // Create
    let response = client
        .post(format!("{}/restaurants", app.address))
        .header(header::COOKIE, &cookie)
        .form(&[
            ("restaurant[title]", "Curry Leaf"),
            ("restaurant[location]", "Kochi, KL"),
            ("restaurant[price]", "300"),
            ("restaurant[description]", "Appam and stew."),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    cookie = session_cookie(&response);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("/restaurants/"));

    // Review
    let response = client
        .post(format!("{}{}/reviews", app.address, location))
        .header(header::COOKIE, &cookie)
        .form(&[("review[body]", "Lovely"), ("review[rating]", "5")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    cookie = session_cookie(&response);

    // Show
    let page: Value = client
        .get(format!("{}{}", app.address, location))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["template"], "restaurants/show");
    assert_eq!(page["restaurant"]["title"], "Curry Leaf");
    assert_eq!(page["reviews"][0]["rating"], 5);

    // Delete through the method override
    let response = client
        .post(format!("{}{}?_method=DELETE", app.address, location))
        .header(header::COOKIE, &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/restaurants");

    let response = client
        .get(format!("{}{}", app.address, location))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}
