pub mod models;
pub mod routes;
pub mod store;

use async_trait::async_trait;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use store::BookStore;

/// Book catalogue: CRUD over the `books` table
pub struct BooksModule {
    store: BookStore,
}

impl BooksModule {
    pub fn new(db: Database) -> Self {
        Self {
            store: BookStore::new(db),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let count = self.store.count().await?;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            books = count,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.store.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/Book" }
                    }
                }
            })
        };
        let id_param = json!([{
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "integer", "format": "int64" }
        }]);
        let body = json!({
            "required": true,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/BookPayload" }
                }
            }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Every stored book",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": error("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": body.clone(),
                        "responses": {
                            "201": book("Created book with its assigned id"),
                            "400": error("Malformed JSON"),
                            "409": error("Duplicate ISBN or oversized value"),
                            "422": error("Validation error")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": id_param.clone(),
                        "responses": {
                            "200": book("The book"),
                            "404": error("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Replace every field of a book",
                        "tags": ["Books"],
                        "parameters": id_param.clone(),
                        "requestBody": body,
                        "responses": {
                            "200": book("Updated book"),
                            "404": error("Book not found"),
                            "409": error("Duplicate ISBN or oversized value"),
                            "422": error("Validation error")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": id_param,
                        "responses": {
                            "200": {
                                "description": "Removal confirmation",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": { "message": { "type": "string" } },
                                            "required": ["message"]
                                        }
                                    }
                                }
                            },
                            "404": error("Book not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "BookPayload": book_schema(false),
                    "Book": book_schema(true)
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id             INTEGER PRIMARY KEY AUTOINCREMENT,
                    title          TEXT    NOT NULL CHECK (length(title) <= 234),
                    author         TEXT    NOT NULL CHECK (length(author) <= 234),
                    genre          TEXT    NOT NULL CHECK (length(genre) <= 111),
                    published_year INTEGER NOT NULL,
                    isbn           TEXT    UNIQUE   CHECK (length(isbn) <= 15),
                    publisher      TEXT             CHECK (length(publisher) <= 234),
                    page_count     INTEGER,
                    language       TEXT             CHECK (length(language) <= 58),
                    summary        TEXT             CHECK (length(summary) <= 555)
                );
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// JSON schema of a book body; `with_id` adds the stored identifier.
fn book_schema(with_id: bool) -> serde_json::Value {
    let text = |max: u32, description: &str| {
        json!({ "type": "string", "maxLength": max, "description": description })
    };
    let optional_text = |max: u32, description: &str| {
        json!({ "type": ["string", "null"], "maxLength": max, "description": description })
    };

    let mut schema = json!({
        "type": "object",
        "properties": {
            "title": text(234, "Title of the book"),
            "author": text(234, "Author of the book"),
            "genre": text(111, "Genre of the book"),
            "published_year": { "type": "integer", "description": "Year of publication" },
            "isbn": optional_text(15, "ISBN, unique across the catalogue"),
            "publisher": optional_text(234, "Publisher"),
            "number_of_pages": { "type": ["integer", "null"], "description": "Page count" },
            "language": optional_text(58, "Language the book is written in"),
            "summary": optional_text(555, "Short summary")
        },
        "required": ["title", "author", "genre", "published_year"]
    });

    if with_id {
        schema["properties"]["id"] =
            json!({ "type": "integer", "format": "int64", "description": "Storage-assigned id" });
        schema["required"] = json!(["id", "title", "author", "genre", "published_year"]);
    }

    schema
}

/// Create the books module backed by the given database
pub fn create_module(db: Database) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(db))
}
