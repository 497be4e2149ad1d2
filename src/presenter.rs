use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::session::Session;

#[derive(Error, Debug)]
pub enum PresenterError {
    #[error("data bag for `{0}` must be a JSON object")]
    InvalidBag(String),

    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

// 1. Presenter Contract
/// Presenter
///
/// The boundary to the presentation layer. A presenter receives a template
/// identifier (e.g. `restaurants/show`) and a named data bag and produces the
/// response body. Swapping the implementation (HTML engine, JSON for API
/// clients, test doubles) does not affect the handlers.
pub trait Presenter: Send + Sync {
    fn render(&self, template: &str, bag: &Value) -> Result<String, PresenterError>;

    /// The `Content-Type` of the bodies produced by `render`.
    fn content_type(&self) -> &'static str;
}

// 2. JSON Implementation
/// JsonPresenter
///
/// Emits the data bag as a JSON document, tagged with the template it was
/// meant for:
///
/// ```json
/// { "template": "restaurants/index", "restaurants": [...], "success": [], "error": [] }
/// ```
#[derive(Clone, Default)]
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn render(&self, template: &str, bag: &Value) -> Result<String, PresenterError> {
        let Value::Object(fields) = bag else {
            return Err(PresenterError::InvalidBag(template.to_string()));
        };

        let mut document = Map::with_capacity(fields.len() + 1);
        document.insert("template".to_string(), Value::String(template.to_string()));
        document.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(serde_json::to_string(&Value::Object(document))?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// PresenterState
///
/// The shared handle to the presentation layer stored in the application state.
pub type PresenterState = Arc<dyn Presenter>;

/// render
///
/// Renders a page for the current request. The session's flash queues are
/// drained into the bag (`success`, `error`) and the logged-in user id is
/// exposed as `current_user`, so every template can show them.
pub fn render(
    presenter: &dyn Presenter,
    session: &mut Session,
    template: &str,
    bag: Value,
) -> Result<Response, PresenterError> {
    let mut fields = match bag {
        Value::Object(fields) => fields,
        Value::Null => Map::new(),
        _ => return Err(PresenterError::InvalidBag(template.to_string())),
    };

    let flash = session.take_flash();
    fields.insert("success".to_string(), Value::from(flash.success));
    fields.insert("error".to_string(), Value::from(flash.error));
    fields.insert(
        "current_user".to_string(),
        session
            .user_id()
            .map_or(Value::Null, |id| Value::String(id.to_string())),
    );

    let body = presenter.render(template, &Value::Object(fields))?;
    Ok(([(header::CONTENT_TYPE, presenter.content_type())], body).into_response())
}
