use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ValidationError, ValidationErrorKind};

/// A catalog entry. `quantity` is the number of copies the library owns,
/// `available` the number currently on the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub quantity: i64,
    pub available: i64,
    pub date_added: DateTime<Utc>,
}

impl Book {
    /// Copies currently out on loan.
    pub fn on_loan(&self) -> i64 {
        self.quantity - self.available
    }

    pub fn is_available(&self) -> bool {
        self.available > 0
    }
}

/// Fields supplied when adding or editing a book.
///
/// Also the record format for `book import` JSON files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    pub quantity: i64,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
        quantity: i64,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            genre: None,
            publication_year: None,
            quantity,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }

    /// Trim text fields and check required ones.
    ///
    /// Title, author, ISBN and a non-negative quantity are required; blank
    /// genres collapse to `None`.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
        self.isbn = self.isbn.trim().to_string();
        self.genre = self
            .genre
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        if self.title.is_empty() {
            return Err(ValidationError::missing("title"));
        }
        if self.author.is_empty() {
            return Err(ValidationError::missing("author"));
        }
        if self.isbn.is_empty() {
            return Err(ValidationError::missing("isbn"));
        }
        if self.quantity < 0 {
            return Err(
                ValidationError::new(ValidationErrorKind::Range, "must not be negative")
                    .with_field("quantity")
                    .with_comparison(">= 0", self.quantity.to_string()),
            );
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_trims_and_drops_blank_genre() {
        let book = NewBook::new("  Dune ", " Frank Herbert", "9780441172719 ", 3)
            .with_genre("   ")
            .normalized()
            .unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author, "Frank Herbert");
        assert_eq!(book.isbn, "9780441172719");
        assert_eq!(book.genre, None);
    }

    #[test]
    fn test_normalized_rejects_missing_fields() {
        let err = NewBook::new("", "A", "1", 1).normalized().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("title"));

        let err = NewBook::new("T", "A", "  ", 1).normalized().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("isbn"));

        let err = NewBook::new("T", "A", "1", -2).normalized().unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Range);
    }

    #[test]
    fn test_import_record_defaults() {
        let json = r#"{"title":"1984","author":"George Orwell","isbn":"9780451524935","quantity":3}"#;
        let book: NewBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.genre, None);
        assert_eq!(book.publication_year, None);
        assert_eq!(book.quantity, 3);
    }
}
