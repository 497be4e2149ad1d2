use axum::{
    extract::{Request, State, rejection::FormRejection},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    credentials::CredentialError, presenter::PresenterError, presenter::PresenterState,
    repository::RepoError, session::SessionError, validation::ValidationError,
};

/// Message shown whenever a failure carries nothing fit for users.
pub const GENERIC_MESSAGE: &str = "Oh No, Something Went Wrong!";

/// AppError
///
/// Every failure that reaches the terminal error stage. Business-flow negatives
/// (missing login, missing record, foreign ownership) never become an
/// `AppError`; they are answered locally with a flash message and a redirect.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Page Not Found!")]
    NotFound,

    #[error("{}", .0.body_text())]
    Form(#[from] FormRejection),

    #[error("Invalid identifier \"{0}\"")]
    MalformedId(String),

    #[error("repository failure: {0}")]
    Repository(#[from] RepoError),

    #[error("session failure: {0}")]
    Session(#[from] SessionError),

    #[error("credential failure: {0}")]
    Credentials(#[from] CredentialError),

    #[error("presentation failure: {0}")]
    Presentation(#[from] PresenterError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Form(rejection) => rejection.status(),
            AppError::MalformedId(_)
            | AppError::Repository(_)
            | AppError::Session(_)
            | AppError::Credentials(_)
            | AppError::Presentation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the user. Infrastructure failures are replaced by
    /// the generic message.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(_)
            | AppError::NotFound
            | AppError::Form(_)
            | AppError::MalformedId(_) => {
                self.to_string()
            }
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

/// ErrorReport
///
/// Attached to every response built from an `AppError` so that the
/// `render_errors` stage can turn it into the rendered error view.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let message = self.public_message();
        let mut response = (status, message.clone()).into_response();
        response
            .extensions_mut()
            .insert(ErrorReport { status, message });
        response
    }
}

/// render_errors
///
/// The terminal error stage. Any response that carries an `ErrorReport` is
/// replaced by the rendered `error` view with the same status code. If the
/// presenter itself fails, the plain-text body produced by `AppError` is kept.
pub async fn render_errors(
    State(presenter): State<PresenterState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    let message = if report.message.is_empty() {
        GENERIC_MESSAGE.to_string()
    } else {
        report.message
    };
    let bag = json!({
        "err": { "status": report.status.as_u16(), "message": message }
    });

    match presenter.render("error", &bag) {
        Ok(body) => (
            report.status,
            [(header::CONTENT_TYPE, presenter.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("error view failed to render: {}", e);
            response
        }
    }
}

/// not_found
///
/// Catch-all fallback for any path without a route, and for a known path
/// requested with a method it does not serve.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
