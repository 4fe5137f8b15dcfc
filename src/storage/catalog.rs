//! Book catalog persistence.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use super::Database;
use crate::types::{
    Book, LibraryError, NewBook, Result, ValidationError, ValidationErrorKind, format_timestamp,
    is_unique_violation, timestamp_column,
};

const BOOK_COLUMNS: &str =
    "id, title, author, isbn, genre, publication_year, quantity, available, date_added";

/// Counts for a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Records whose ISBN already exists
    pub skipped: usize,
    /// Records that failed validation
    pub invalid: usize,
}

/// Catalog-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub titles: i64,
    pub copies: i64,
    pub available: i64,
}

pub struct CatalogStore<'a> {
    db: &'a Database,
}

impl<'a> CatalogStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add a book. All copies start on the shelf.
    pub fn add_book(&self, book: NewBook, now: DateTime<Utc>) -> Result<Book> {
        let book = book.normalized()?;
        let conn = self.db.connection()?;
        let id = insert_book(&conn, &book, now)?;
        tracing::info!("Added book {} '{}' (isbn {})", id, book.title, book.isbn);
        require_book(&conn, id)
    }

    /// Replace a book's details.
    ///
    /// `available` is recomputed as `quantity - active loans`; lowering the
    /// quantity below the number of copies currently out is rejected.
    pub fn update_book(&self, id: i64, book: NewBook) -> Result<Book> {
        let book = book.normalized()?;
        self.db.transaction(move |conn| {
            require_book(conn, id)?;
            let active = active_loan_count(conn, id)?;
            if book.quantity < active {
                return Err(ValidationError::new(
                    ValidationErrorKind::Consistency,
                    "cannot be lower than the number of copies on loan",
                )
                .with_field("quantity")
                .with_comparison(format!(">= {}", active), book.quantity.to_string())
                .into());
            }

            conn.execute(
                "UPDATE books
                 SET title = ?1, author = ?2, isbn = ?3, genre = ?4,
                     publication_year = ?5, quantity = ?6, available = ?7
                 WHERE id = ?8",
                params![
                    book.title,
                    book.author,
                    book.isbn,
                    book.genre,
                    book.publication_year,
                    book.quantity,
                    book.quantity - active,
                    id,
                ],
            )
            .map_err(|e| duplicate_isbn_or(e, &book.isbn))?;

            tracing::info!("Updated book {} (active loans {})", id, active);
            require_book(conn, id)
        })
    }

    /// Delete a book and its returned borrowing history.
    ///
    /// Refused while any copy is still on loan.
    pub fn delete_book(&self, id: i64) -> Result<()> {
        self.db.transaction(move |conn| {
            require_book(conn, id)?;
            let active = active_loan_count(conn, id)?;
            if active > 0 {
                return Err(LibraryError::ActiveLoans {
                    book_id: id,
                    active,
                });
            }

            let history = conn.execute("DELETE FROM borrowings WHERE book_id = ?1", params![id])?;
            conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
            tracing::info!("Deleted book {} ({} history rows)", id, history);
            Ok(())
        })
    }

    pub fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let conn = self.db.connection()?;
        find_book(&conn, id)
    }

    /// Like [`get_book`](Self::get_book) but a missing book is an error.
    pub fn require_book(&self, id: i64) -> Result<Book> {
        let conn = self.db.connection()?;
        require_book(&conn, id)
    }

    /// All books ordered by title.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM books ORDER BY title COLLATE NOCASE, id",
            BOOK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let books = stmt
            .query_map([], map_book)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(books)
    }

    /// Case-insensitive substring search over title, author, genre and ISBN.
    pub fn search_books(&self, term: &str) -> Result<Vec<Book>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.list_books();
        }

        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM books
             WHERE instr(lower(title), ?1) > 0
                OR instr(lower(author), ?1) > 0
                OR instr(lower(coalesce(genre, '')), ?1) > 0
                OR instr(lower(isbn), ?1) > 0
             ORDER BY title COLLATE NOCASE, id",
            BOOK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let books = stmt
            .query_map(params![term], map_book)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!("search_books '{}' returned {} rows", term, books.len());
        Ok(books)
    }

    /// Books with at least one copy on the shelf, optionally filtered by a
    /// title/author substring.
    pub fn available_books(&self, filter: Option<&str>) -> Result<Vec<Book>> {
        let conn = self.db.connection()?;
        let sql = format!(
            "SELECT {} FROM books WHERE available > 0 ORDER BY title COLLATE NOCASE, id",
            BOOK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let books: Vec<Book> = stmt
            .query_map([], map_book)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let books = match filter.map(|f| f.trim().to_lowercase()) {
            Some(f) if !f.is_empty() => books
                .into_iter()
                .filter(|b| {
                    b.title.to_lowercase().contains(&f) || b.author.to_lowercase().contains(&f)
                })
                .collect(),
            _ => books,
        };
        tracing::debug!("available_books returned {} books", books.len());
        Ok(books)
    }

    /// Insert many books in one transaction, skipping duplicate ISBNs and
    /// invalid records.
    pub fn import_books(&self, books: Vec<NewBook>, now: DateTime<Utc>) -> Result<ImportSummary> {
        self.db.transaction(move |conn| {
            let mut summary = ImportSummary::default();
            for book in books {
                let book = match book.normalized() {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!("Skipping invalid import record: {}", e);
                        summary.invalid += 1;
                        continue;
                    }
                };
                match insert_book(conn, &book, now) {
                    Ok(_) => summary.inserted += 1,
                    Err(LibraryError::Duplicate { .. }) => {
                        tracing::debug!("Skipping duplicate isbn {}", book.isbn);
                        summary.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            tracing::info!(
                "Imported {} books ({} duplicates, {} invalid)",
                summary.inserted,
                summary.skipped,
                summary.invalid
            );
            Ok(summary)
        })
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.db.connection()?;
        let stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(quantity), 0), COALESCE(SUM(available), 0) FROM books",
            [],
            |row| {
                Ok(CatalogStats {
                    titles: row.get(0)?,
                    copies: row.get(1)?,
                    available: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }
}

// =============================================================================
// Connection-level helpers (usable inside transactions)
// =============================================================================

pub(crate) fn map_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        genre: row.get(4)?,
        publication_year: row.get(5)?,
        quantity: row.get(6)?,
        available: row.get(7)?,
        date_added: timestamp_column(row, 8)?,
    })
}

pub(crate) fn find_book(conn: &Connection, id: i64) -> Result<Option<Book>> {
    let sql = format!("SELECT {} FROM books WHERE id = ?1", BOOK_COLUMNS);
    Ok(conn.query_row(&sql, params![id], map_book).optional()?)
}

pub(crate) fn require_book(conn: &Connection, id: i64) -> Result<Book> {
    find_book(conn, id)?.ok_or_else(|| LibraryError::not_found("Book", id))
}

/// Number of unreturned borrowings for a book.
pub(crate) fn active_loan_count(conn: &Connection, book_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM borrowings WHERE book_id = ?1 AND return_date IS NULL",
        params![book_id],
        |row| row.get(0),
    )?)
}

fn insert_book(conn: &Connection, book: &NewBook, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO books
         (title, author, isbn, genre, publication_year, quantity, available, date_added)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)",
        params![
            book.title,
            book.author,
            book.isbn,
            book.genre,
            book.publication_year,
            book.quantity,
            format_timestamp(now),
        ],
    )
    .map_err(|e| duplicate_isbn_or(e, &book.isbn))?;
    Ok(conn.last_insert_rowid())
}

fn duplicate_isbn_or(err: rusqlite::Error, isbn: &str) -> LibraryError {
    if is_unique_violation(&err) {
        LibraryError::duplicate("Book with ISBN", isbn)
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup() -> Database {
        let db = Database::open_in_memory().expect("Failed to open database");
        db.initialize().expect("Failed to initialize");
        db
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn dune() -> NewBook {
        NewBook::new("Dune", "Frank Herbert", "9780441172719", 3)
            .with_genre("Science Fiction")
            .with_year(1965)
    }

    #[test]
    fn test_add_and_get_book() {
        let db = setup();
        let store = CatalogStore::new(&db);

        let book = store.add_book(dune(), now()).unwrap();
        assert_eq!(book.quantity, 3);
        assert_eq!(book.available, 3);
        assert_eq!(book.date_added, now());
        assert_eq!(book.genre.as_deref(), Some("Science Fiction"));

        let fetched = store.get_book(book.id).unwrap().unwrap();
        assert_eq!(fetched, book);
        assert!(store.get_book(999).unwrap().is_none());
        assert!(matches!(
            store.require_book(999),
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_isbn_rejected() {
        let db = setup();
        let store = CatalogStore::new(&db);
        store.add_book(dune(), now()).unwrap();

        let err = store
            .add_book(NewBook::new("Other", "Someone", "9780441172719", 1), now())
            .unwrap_err();
        assert!(matches!(err, LibraryError::Duplicate { .. }));
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let db = setup();
        let store = CatalogStore::new(&db);
        store.add_book(dune(), now()).unwrap();
        store
            .add_book(
                NewBook::new("The Hobbit", "J.R.R. Tolkien", "9780547928227", 6)
                    .with_genre("Fantasy"),
                now(),
            )
            .unwrap();
        store
            .add_book(NewBook::new("100% Wolf", "Jayne Lyons", "9781925563207", 1), now())
            .unwrap();

        assert_eq!(store.search_books("HERBERT").unwrap().len(), 1);
        assert_eq!(store.search_books("fantasy").unwrap()[0].title, "The Hobbit");
        assert_eq!(store.search_books("928227").unwrap().len(), 1);
        // LIKE wildcards are matched literally
        assert_eq!(store.search_books("%").unwrap().len(), 1);
        assert_eq!(store.search_books("  ").unwrap().len(), 3);
    }

    #[test]
    fn test_list_books_ordered_by_title() {
        let db = setup();
        let store = CatalogStore::new(&db);
        store
            .add_book(NewBook::new("zebra", "A", "1", 1), now())
            .unwrap();
        store
            .add_book(NewBook::new("Apple", "B", "2", 1), now())
            .unwrap();

        let titles: Vec<_> = store
            .list_books()
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Apple", "zebra"]);
    }

    #[test]
    fn test_available_books_excludes_empty_shelves() {
        let db = setup();
        let store = CatalogStore::new(&db);
        store.add_book(dune(), now()).unwrap();
        store
            .add_book(NewBook::new("Reference Only", "Staff", "3", 0), now())
            .unwrap();

        let available = store.available_books(None).unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].title, "Dune");
        assert_eq!(store.available_books(Some("frank")).unwrap().len(), 1);
        assert!(store.available_books(Some("tolkien")).unwrap().is_empty());
    }

    #[test]
    fn test_available_filter_matches_title_and_author_only() {
        let db = setup();
        let store = CatalogStore::new(&db);
        store.add_book(dune(), now()).unwrap();

        assert_eq!(store.available_books(Some("  DUNE ")).unwrap().len(), 1);
        assert_eq!(store.available_books(Some("herbert")).unwrap().len(), 1);
        assert!(store.available_books(Some("science")).unwrap().is_empty());
        assert!(store.available_books(Some("9780441172719")).unwrap().is_empty());
    }

    #[test]
    fn test_update_recomputes_available_from_active_loans() {
        let db = setup();
        let store = CatalogStore::new(&db);
        let book = store.add_book(dune(), now()).unwrap();

        db.execute(
            "INSERT INTO users (username, password_hash) VALUES ('alice', 'x')",
            &[],
        )
        .unwrap();
        db.execute(
            "INSERT INTO borrowings (book_id, username, borrow_date, due_date)
             VALUES (?1, 'alice', '2025-01-01T09:00:00Z', '2025-01-15T09:00:00Z')",
            &[&book.id],
        )
        .unwrap();
        db.execute("UPDATE books SET available = 2 WHERE id = ?1", &[&book.id])
            .unwrap();

        let updated = store
            .update_book(book.id, NewBook::new("Dune", "Frank Herbert", "9780441172719", 5))
            .unwrap();
        assert_eq!(updated.quantity, 5);
        assert_eq!(updated.available, 4);
        assert_eq!(updated.genre, None);

        let err = store
            .update_book(book.id, NewBook::new("Dune", "Frank Herbert", "9780441172719", 0))
            .unwrap_err();
        assert!(matches!(err, LibraryError::Validation(_)));

        let err = store.delete_book(book.id).unwrap_err();
        assert!(matches!(err, LibraryError::ActiveLoans { active: 1, .. }));
    }

    #[test]
    fn test_delete_book_removes_history() {
        let db = setup();
        let store = CatalogStore::new(&db);
        let book = store.add_book(dune(), now()).unwrap();
        db.execute(
            "INSERT INTO users (username, password_hash) VALUES ('alice', 'x')",
            &[],
        )
        .unwrap();
        db.execute(
            "INSERT INTO borrowings (book_id, username, borrow_date, due_date, return_date)
             VALUES (?1, 'alice', '2025-01-01T09:00:00Z', '2025-01-15T09:00:00Z',
                     '2025-01-10T09:00:00Z')",
            &[&book.id],
        )
        .unwrap();

        store.delete_book(book.id).unwrap();
        assert!(store.get_book(book.id).unwrap().is_none());
        assert!(matches!(
            store.delete_book(book.id),
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_import_skips_duplicates_and_invalid() {
        let db = setup();
        let store = CatalogStore::new(&db);
        store.add_book(dune(), now()).unwrap();

        let summary = store
            .import_books(
                vec![
                    dune(),
                    NewBook::new("1984", "George Orwell", "9780451524935", 3),
                    NewBook::new("", "Nobody", "0000", 1),
                    NewBook::new("1984 (copy)", "George Orwell", "9780451524935", 1),
                ],
                now(),
            )
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                inserted: 1,
                skipped: 2,
                invalid: 1
            }
        );

        let stats = store.stats().unwrap();
        assert_eq!(stats.titles, 2);
        assert_eq!(stats.copies, 6);
        assert_eq!(stats.available, 6);
    }
}
