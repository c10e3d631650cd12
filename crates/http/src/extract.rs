//! Request extractors that report failures through [`AppError`].

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use garde::Validate;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::AppError;

/// JSON body that has been deserialized and then checked with `garde`.
///
/// Shape errors (missing field, wrong type) and rule violations both surface
/// as 422 with `{field, error}` details; unparseable bodies and wrong content
/// types as 400.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    T::Context: Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<serde_json::Value>::from_request(req, state)
            .await
            .map_err(json_rejection_to_error)?;

        let value: T = serde_path_to_error::deserialize(body).map_err(shape_to_error)?;
        value.validate().map_err(report_to_error)?;

        Ok(ValidatedJson(value))
    }
}

/// Path parameters, with parse failures reported as a 400 [`AppError`].
#[derive(Debug, Clone)]
pub struct ValidatedPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        Ok(ValidatedPath(value))
    }
}

fn json_rejection_to_error(rejection: JsonRejection) -> AppError {
    AppError::bad_request(rejection.body_text())
}

/// Name the offending field of a body that parsed but has the wrong shape.
fn shape_to_error(err: serde_path_to_error::Error<serde_json::Error>) -> AppError {
    let message = err.inner().to_string();
    let path = err.path().to_string();
    let field = match missing_field(&message) {
        Some(name) if path == "." => name.to_string(),
        Some(name) => format!("{path}.{name}"),
        None => path,
    };

    AppError::validation(
        vec![json!({ "field": field, "error": message })],
        "request body does not match the expected shape",
    )
}

/// serde reports a missing key against its parent, so pull the key out of the message.
fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.split('`').next()
}

/// Flatten a garde report into `{field, error}` entries.
pub fn report_to_error(report: garde::Report) -> AppError {
    let details = report
        .iter()
        .map(|(path, error)| json!({ "field": path.to_string(), "error": error.to_string() }))
        .collect();
    AppError::validation(details, "request body failed validation")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Shelf {
        #[garde(length(chars, max = 5))]
        label: String,
        #[garde(skip)]
        capacity: i64,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                post(|ValidatedJson(shelf): ValidatedJson<Shelf>| async move {
                    format!("{}:{}", shelf.label, shelf.capacity)
                }),
            )
            .route(
                "/shelves/{id}",
                get(|ValidatedPath(id): ValidatedPath<i64>| async move { id.to_string() }),
            )
    }

    async fn read(request: axum::http::Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn send(body: &'static str, content_type: &str) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::post("/")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        read(request).await
    }

    #[tokio::test]
    async fn accepts_valid_body() {
        let (status, _) = send(r#"{"label":"oak","capacity":3}"#, "application/json").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_field_is_unprocessable() {
        let (status, body) = send(r#"{"label":"oak"}"#, "application/json").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0]["field"], "capacity");
        assert!(body["error"]["details"][0]["error"]
            .as_str()
            .unwrap()
            .contains("missing field"));
    }

    #[tokio::test]
    async fn wrong_type_names_the_field() {
        let (status, body) = send(r#"{"label":"oak","capacity":"lots"}"#, "application/json").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"][0]["field"], "capacity");
    }

    #[tokio::test]
    async fn rule_violation_names_the_field() {
        let (status, body) = send(r#"{"label":"mahogany","capacity":3}"#, "application/json").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"][0]["field"], "label");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, body) = send(r#"{"label":"#, "application/json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn wrong_content_type_is_bad_request() {
        let (status, _) = send(r#"{"label":"oak","capacity":3}"#, "text/plain").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn parsed_path_parameter_reaches_handler() {
        let request = axum::http::Request::get("/shelves/12")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unparseable_path_parameter_is_a_json_bad_request() {
        let request = axum::http::Request::get("/shelves/oak")
            .body(Body::empty())
            .unwrap();
        let (status, body) = read(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["detail"].as_str().unwrap().contains("oak"));
    }
}
