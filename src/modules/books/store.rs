//! Data access for the `books` table.
//!
//! Reads check out a pooled connection for the duration of one statement;
//! writes run inside a transaction that is committed before the call returns.
//! Both are released on drop, so every early return gives the connection
//! back (and rolls back an uncommitted transaction).

use bookshelf_db::Database;
use sqlx::error::ErrorKind;

use super::models::{Book, BookFields};

const SELECT_ALL: &str = "SELECT id, title, author, genre, published_year, isbn, publisher, \
     page_count, language, summary FROM books ORDER BY id";

const SELECT_ONE: &str = "SELECT id, title, author, genre, published_year, isbn, publisher, \
     page_count, language, summary FROM books WHERE id = ?";

const INSERT: &str = "INSERT INTO books \
     (title, author, genre, published_year, isbn, publisher, page_count, language, summary) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
     RETURNING id, title, author, genre, published_year, isbn, publisher, \
     page_count, language, summary";

const REPLACE: &str = "UPDATE books SET \
     title = ?, author = ?, genre = ?, published_year = ?, isbn = ?, publisher = ?, \
     page_count = ?, language = ?, summary = ? \
     WHERE id = ? \
     RETURNING id, title, author, genre, published_year, isbn, publisher, \
     page_count, language, summary";

const DELETE: &str = "DELETE FROM books WHERE id = ?";

const COUNT: &str = "SELECT COUNT(*) FROM books";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The row breaks a uniqueness, check, or not-null rule of the table
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation | ErrorKind::CheckViolation | ErrorKind::NotNullViolation
            ) {
                return StoreError::ConstraintViolation(db_err.message().to_string());
            }
        }
        StoreError::Storage(err)
    }
}

/// Row shape of the `books` table.
#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    author: String,
    genre: String,
    published_year: i64,
    isbn: Option<String>,
    publisher: Option<String>,
    page_count: Option<i64>,
    language: Option<String>,
    summary: Option<String>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        Book {
            id: row.id,
            fields: BookFields {
                title: row.title,
                author: row.author,
                genre: row.genre,
                published_year: row.published_year,
                isbn: row.isbn.into(),
                publisher: row.publisher.into(),
                number_of_pages: row.page_count.into(),
                language: row.language.into(),
                summary: row.summary.into(),
            },
        }
    }
}

/// Storage client for book records.
#[derive(Clone, Debug)]
pub struct BookStore {
    db: Database,
}

impl BookStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Every stored book, in id order.
    pub async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let mut conn = self.db.pool().acquire().await?;
        let rows = sqlx::query_as::<_, BookRow>(SELECT_ALL)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let mut conn = self.db.pool().acquire().await?;
        let count: i64 = sqlx::query_scalar(COUNT).fetch_one(&mut *conn).await?;
        Ok(count)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Book>, StoreError> {
        let mut conn = self.db.pool().acquire().await?;
        let row = sqlx::query_as::<_, BookRow>(SELECT_ONE)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(Book::from))
    }

    /// Persist a new book and return it with its assigned id.
    pub async fn insert(&self, fields: BookFields) -> Result<Book, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query_as::<_, BookRow>(INSERT)
            .bind(fields.title)
            .bind(fields.author)
            .bind(fields.genre)
            .bind(fields.published_year)
            .bind(fields.isbn.into_option())
            .bind(fields.publisher.into_option())
            .bind(fields.number_of_pages.into_option())
            .bind(fields.language.into_option())
            .bind(fields.summary.into_option())
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(book_id = row.id, "book created");
        Ok(row.into())
    }

    /// Overwrite every mutable field of book `id`. `None` when it does not exist.
    pub async fn replace(&self, id: i64, fields: BookFields) -> Result<Option<Book>, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query_as::<_, BookRow>(REPLACE)
            .bind(fields.title)
            .bind(fields.author)
            .bind(fields.genre)
            .bind(fields.published_year)
            .bind(fields.isbn.into_option())
            .bind(fields.publisher.into_option())
            .bind(fields.number_of_pages.into_option())
            .bind(fields.language.into_option())
            .bind(fields.summary.into_option())
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;

        if row.is_some() {
            tracing::info!(book_id = id, "book replaced");
        }
        Ok(row.map(Book::from))
    }

    /// Delete book `id`, reporting whether it existed.
    pub async fn remove(&self, id: i64) -> Result<bool, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let result = sqlx::query(DELETE).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(book_id = id, "book removed");
        }
        Ok(removed)
    }
}
