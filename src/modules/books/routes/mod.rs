//! HTTP handlers for the books module.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::{AppError, ValidatedJson, ValidatedPath};
use serde_json::json;

use super::models::{Book, BookPayload, Removed};
use super::store::{BookStore, StoreError};

pub const BOOK_NOT_FOUND: &str = "Book not found";

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation(message) => AppError::conflict(
                vec![json!({ "error": message })],
                "book violates a storage constraint",
            ),
            StoreError::Storage(source) => AppError::Internal(anyhow::Error::new(source)),
        }
    }
}

/// Routes relative to the module mount point.
pub fn router(store: BookStore) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(store)
}

async fn list_books(State(store): State<BookStore>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(store.list_all().await?))
}

async fn get_book(
    State(store): State<BookStore>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> Result<Json<Book>, AppError> {
    store
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))
}

async fn create_book(
    State(store): State<BookStore>,
    ValidatedJson(payload): ValidatedJson<BookPayload>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = store.insert(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Full replace: optionals missing from the body are cleared.
async fn update_book(
    State(store): State<BookStore>,
    ValidatedPath(id): ValidatedPath<i64>,
    ValidatedJson(payload): ValidatedJson<BookPayload>,
) -> Result<Json<Book>, AppError> {
    store
        .replace(id, payload.into())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))
}

async fn delete_book(
    State(store): State<BookStore>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> Result<Json<Removed>, AppError> {
    if store.remove(id).await? {
        Ok(Json(Removed::book(id)))
    } else {
        Err(AppError::not_found(BOOK_NOT_FOUND))
    }
}
