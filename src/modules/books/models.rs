use garde::Validate;
use serde::{Deserialize, Serialize, Serializer};

/// A value that is either stored or explicitly absent.
///
/// Optional book attributes use this instead of `Option` so that a full
/// replace has to say what every field becomes; there is no "leave as is".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Present(T),
    Absent,
}

impl<T> Field<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Present(value) => Some(value),
            Field::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Field::Present(value),
            None => Field::Absent,
        }
    }
}

/// Absent serializes as `null` so every response carries every key.
impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Present(value) => serializer.serialize_some(value),
            Field::Absent => serializer.serialize_none(),
        }
    }
}

/// Every mutable attribute of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i64,
    pub isbn: Field<String>,
    pub publisher: Field<String>,
    pub number_of_pages: Field<i64>,
    pub language: Field<String>,
    pub summary: Field<String>,
}

/// A stored book: its identifier plus its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    /// Assigned by storage on insert, never changes
    pub id: i64,
    #[serde(flatten)]
    pub fields: BookFields,
}

/// Request body for creating or replacing a book.
///
/// Length limits mirror the column checks on the `books` table.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookPayload {
    #[garde(length(chars, max = 234))]
    pub title: String,
    #[garde(length(chars, max = 234))]
    pub author: String,
    #[garde(length(chars, max = 111))]
    pub genre: String,
    #[garde(skip)]
    pub published_year: i64,
    #[garde(length(chars, max = 15))]
    pub isbn: Option<String>,
    #[garde(length(chars, max = 234))]
    pub publisher: Option<String>,
    #[garde(skip)]
    pub number_of_pages: Option<i64>,
    #[garde(length(chars, max = 58))]
    pub language: Option<String>,
    #[garde(length(chars, max = 555))]
    pub summary: Option<String>,
}

impl From<BookPayload> for BookFields {
    fn from(payload: BookPayload) -> Self {
        Self {
            title: payload.title,
            author: payload.author,
            genre: payload.genre,
            published_year: payload.published_year,
            isbn: payload.isbn.into(),
            publisher: payload.publisher.into(),
            number_of_pages: payload.number_of_pages.into(),
            language: payload.language.into(),
            summary: payload.summary.into(),
        }
    }
}

/// Confirmation returned by a successful delete.
#[derive(Debug, Clone, Serialize)]
pub struct Removed {
    pub message: String,
}

impl Removed {
    pub fn book(id: i64) -> Self {
        Self {
            message: format!("Book with ID {} has been removed.", id),
        }
    }
}
