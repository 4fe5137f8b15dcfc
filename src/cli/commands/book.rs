//! Book Commands
//!
//! Catalog maintenance (admin) and browsing.

use std::path::Path;

use chrono::Utc;

use crate::cli::util::CommandContext;
use crate::cli::{Format, Output};
use crate::storage::CatalogStore;
use crate::types::{Book, LibraryError, NewBook, Result, ValidationError, display_timestamp};

/// Book fields accepted by `book add` and `book edit`.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct BookFields {
    #[arg(long, help = "Title")]
    pub title: Option<String>,
    #[arg(long, help = "Author")]
    pub author: Option<String>,
    #[arg(long, help = "ISBN (unique)")]
    pub isbn: Option<String>,
    #[arg(long, help = "Genre")]
    pub genre: Option<String>,
    #[arg(long, help = "Publication year")]
    pub year: Option<i32>,
    #[arg(long, short, help = "Number of copies owned")]
    pub quantity: Option<i64>,
}

impl BookFields {
    fn into_new_book(self) -> Result<NewBook> {
        Ok(NewBook {
            title: self.title.ok_or_else(|| ValidationError::missing("title"))?,
            author: self.author.ok_or_else(|| ValidationError::missing("author"))?,
            isbn: self.isbn.ok_or_else(|| ValidationError::missing("isbn"))?,
            genre: self.genre,
            publication_year: self.year,
            quantity: self.quantity.unwrap_or(1),
        })
    }

    /// Overlay the given fields onto an existing book.
    fn merge_into(self, book: &Book) -> NewBook {
        NewBook {
            title: self.title.unwrap_or_else(|| book.title.clone()),
            author: self.author.unwrap_or_else(|| book.author.clone()),
            isbn: self.isbn.unwrap_or_else(|| book.isbn.clone()),
            genre: self.genre.or_else(|| book.genre.clone()),
            publication_year: self.year.or(book.publication_year),
            quantity: self.quantity.unwrap_or(book.quantity),
        }
    }
}

pub fn add(fields: BookFields) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;

    let book = CatalogStore::new(&ctx.db).add_book(fields.into_new_book()?, Utc::now())?;
    Output::new().success(&format!("Added book {} \"{}\"", book.id, book.title));
    Ok(())
}

pub fn edit(id: i64, fields: BookFields) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;

    let catalog = CatalogStore::new(&ctx.db);
    let current = catalog.require_book(id)?;
    let book = catalog.update_book(id, fields.merge_into(&current))?;
    Output::new().success(&format!(
        "Updated book {} \"{}\" ({}/{} available)",
        book.id, book.title, book.available, book.quantity
    ));
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;

    let catalog = CatalogStore::new(&ctx.db);
    let book = catalog.require_book(id)?;
    catalog.delete_book(id)?;
    Output::new().success(&format!("Deleted book {} \"{}\"", id, book.title));
    Ok(())
}

pub fn show(id: i64, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let book = CatalogStore::new(&ctx.db).require_book(id)?;

    let out = Output::new();
    if format == Format::Json {
        return out.json(&book);
    }

    out.header(&book.title);
    out.field("ID", book.id);
    out.field("Author", &book.author);
    out.field("ISBN", &book.isbn);
    out.field("Genre", book.genre.as_deref().unwrap_or("-"));
    out.field(
        "Year",
        book.publication_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".into()),
    );
    out.field("Copies", format!("{} ({} on loan)", book.quantity, book.on_loan()));
    out.field("Available", book.available);
    out.field("Added", display_timestamp(book.date_added));
    Ok(())
}

pub fn list(format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let books = CatalogStore::new(&ctx.db).list_books()?;
    print_books(&books, format)
}

pub fn search(term: &str, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let books = CatalogStore::new(&ctx.db).search_books(term)?;
    print_books(&books, format)
}

/// Load a JSON array of books (same fields as `book add`).
pub fn import(path: &Path) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;

    let content = std::fs::read_to_string(path).map_err(|e| {
        LibraryError::Storage(format!("Cannot read {}: {}", path.display(), e))
    })?;
    let books: Vec<NewBook> = serde_json::from_str(&content)?;
    let total = books.len();

    let summary = CatalogStore::new(&ctx.db).import_books(books, Utc::now())?;
    let out = Output::new();
    out.success(&format!(
        "Imported {} of {} books from {}",
        summary.inserted,
        total,
        path.display()
    ));
    if summary.skipped > 0 {
        out.info(&format!("{} duplicate ISBN(s) skipped", summary.skipped));
    }
    if summary.invalid > 0 {
        out.warning(&format!("{} invalid record(s) skipped", summary.invalid));
    }
    Ok(())
}

pub(crate) fn print_books(books: &[Book], format: Format) -> Result<()> {
    let out = Output::new();
    if format == Format::Json {
        return out.json(books);
    }
    if books.is_empty() {
        out.info("No books found");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = books
        .iter()
        .map(|b| {
            vec![
                b.id.to_string(),
                b.title.clone(),
                b.author.clone(),
                b.genre.clone().unwrap_or_default(),
                b.publication_year.map(|y| y.to_string()).unwrap_or_default(),
                format!("{}/{}", b.available, b.quantity),
            ]
        })
        .collect();
    out.table(&["ID", "TITLE", "AUTHOR", "GENRE", "YEAR", "AVAIL"], &rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune() -> Book {
        Book {
            id: 7,
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: "9780441013593".into(),
            genre: Some("Science Fiction".into()),
            publication_year: Some(1965),
            quantity: 3,
            available: 1,
            date_added: Utc::now(),
        }
    }

    #[test]
    fn test_add_requires_core_fields() {
        let fields = BookFields {
            title: Some("Dune".into()),
            author: Some("Frank Herbert".into()),
            ..Default::default()
        };
        let err = fields.into_new_book().unwrap_err();
        assert!(matches!(err, LibraryError::Validation(ref v) if v.field.as_deref() == Some("isbn")));
    }

    #[test]
    fn test_add_defaults_to_one_copy() {
        let fields = BookFields {
            title: Some("Dune".into()),
            author: Some("Frank Herbert".into()),
            isbn: Some("123".into()),
            ..Default::default()
        };
        assert_eq!(fields.into_new_book().unwrap().quantity, 1);
    }

    #[test]
    fn test_edit_keeps_unspecified_fields() {
        let fields = BookFields {
            quantity: Some(5),
            genre: Some("Classic".into()),
            ..Default::default()
        };
        let merged = fields.merge_into(&dune());
        assert_eq!(merged.title, "Dune");
        assert_eq!(merged.isbn, "9780441013593");
        assert_eq!(merged.genre.as_deref(), Some("Classic"));
        assert_eq!(merged.publication_year, Some(1965));
        assert_eq!(merged.quantity, 5);
    }
}
