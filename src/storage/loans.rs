//! Borrowing history queries.
//!
//! Writes that touch availability live in the circulation service, which
//! runs them inside a single transaction; this store covers reads plus
//! fine bookkeeping.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use crate::types::{
    Loan, LoanView, Result, log_filter_warn, optional_timestamp_column, timestamp_column,
};

const LOAN_VIEW_SELECT: &str = "SELECT b.id, b.book_id, b.username, bk.title, bk.author,
        b.borrow_date, b.due_date, b.return_date, b.fine
 FROM borrowings b
 JOIN books bk ON b.book_id = bk.id";

/// Per-book borrow totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowCount {
    pub book_id: i64,
    pub borrows: i64,
}

/// Active-loan and fine totals for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanStats {
    pub active: i64,
    pub overdue: i64,
    pub total_fines: i64,
}

pub struct LoanStore<'a> {
    db: &'a Database,
}

impl<'a> LoanStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get_loan(&self, id: i64) -> Result<Option<Loan>> {
        let conn = self.db.connection()?;
        find_loan(&conn, id)
    }

    /// Full borrowing history for a user, newest first.
    pub fn user_history(&self, username: &str) -> Result<Vec<LoanView>> {
        let rows = self.query_views(
            &format!(
                "{} WHERE b.username = ?1 ORDER BY b.borrow_date DESC, b.id DESC",
                LOAN_VIEW_SELECT
            ),
            params![username],
        )?;
        tracing::debug!("user_history for {} returned {} rows", username, rows.len());
        Ok(rows)
    }

    /// Unreturned loans for a user, newest first.
    pub fn open_loans(&self, username: &str) -> Result<Vec<LoanView>> {
        let rows = self.query_views(
            &format!(
                "{} WHERE b.username = ?1 AND b.return_date IS NULL
                 ORDER BY b.borrow_date DESC, b.id DESC",
                LOAN_VIEW_SELECT
            ),
            params![username],
        )?;
        tracing::debug!("open_loans for {} returned {} rows", username, rows.len());
        Ok(rows)
    }

    /// Every borrowing, grouped by user, newest first within a user.
    pub fn all_loans(&self) -> Result<Vec<LoanView>> {
        self.query_views(
            &format!(
                "{} ORDER BY b.username, b.borrow_date DESC, b.id DESC",
                LOAN_VIEW_SELECT
            ),
            [],
        )
    }

    /// Borrowings carrying a fine, by user then due date.
    pub fn fined_loans(&self) -> Result<Vec<LoanView>> {
        self.query_views(
            &format!(
                "{} WHERE b.fine > 0 ORDER BY b.username, b.due_date, b.id",
                LOAN_VIEW_SELECT
            ),
            [],
        )
    }

    /// `(id, due_date)` of every unreturned loan.
    ///
    /// Rows with unparseable dates are logged and skipped.
    pub fn open_due_dates(&self) -> Result<Vec<(i64, DateTime<Utc>)>> {
        let conn = self.db.connection()?;
        let mut stmt =
            conn.prepare("SELECT id, due_date FROM borrowings WHERE return_date IS NULL")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, timestamp_column(row, 1)?)))?
            .filter_map(|r| log_filter_warn(r, "reading open loan due date"))
            .collect();
        Ok(rows)
    }

    /// Distinct `(username, book_id)` pairs that were ever borrowed.
    pub fn interactions(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare("SELECT DISTINCT username, book_id FROM borrowings")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Every book with its borrow count, most borrowed first, ties by id.
    pub fn popularity(&self) -> Result<Vec<BorrowCount>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT bk.id, COUNT(b.id) AS borrows
             FROM books bk
             LEFT JOIN borrowings b ON b.book_id = bk.id
             GROUP BY bk.id
             ORDER BY borrows DESC, bk.id",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(BorrowCount {
                    book_id: row.get(0)?,
                    borrows: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Result<LoanStats> {
        let conn = self.db.connection()?;
        let stats = conn.query_row(
            "SELECT
                COALESCE(SUM(return_date IS NULL), 0),
                COALESCE(SUM(return_date IS NULL AND due_date < ?1), 0),
                COALESCE(SUM(fine), 0)
             FROM borrowings",
            params![crate::types::format_timestamp(now)],
            |row| {
                Ok(LoanStats {
                    active: row.get(0)?,
                    overdue: row.get(1)?,
                    total_fines: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    fn query_views<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<LoanView>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map_loan_view)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// =============================================================================
// Connection-level helpers (usable inside transactions)
// =============================================================================

fn map_loan_view(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoanView> {
    Ok(LoanView {
        id: row.get(0)?,
        book_id: row.get(1)?,
        username: row.get(2)?,
        title: row.get(3)?,
        author: row.get(4)?,
        borrow_date: timestamp_column(row, 5)?,
        due_date: timestamp_column(row, 6)?,
        return_date: optional_timestamp_column(row, 7)?,
        fine: row.get(8)?,
    })
}

fn map_loan(row: &rusqlite::Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: row.get(0)?,
        book_id: row.get(1)?,
        username: row.get(2)?,
        borrow_date: timestamp_column(row, 3)?,
        due_date: timestamp_column(row, 4)?,
        return_date: optional_timestamp_column(row, 5)?,
        fine: row.get(6)?,
    })
}

pub(crate) fn find_loan(conn: &Connection, id: i64) -> Result<Option<Loan>> {
    Ok(conn
        .query_row(
            "SELECT id, book_id, username, borrow_date, due_date, return_date, fine
             FROM borrowings WHERE id = ?1",
            params![id],
            map_loan,
        )
        .optional()?)
}

pub(crate) fn set_fine(conn: &Connection, id: i64, fine: i64) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE borrowings SET fine = ?1 WHERE id = ?2 AND fine != ?1",
        params![fine, id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.execute(
            "INSERT INTO users (username, password_hash) VALUES ('alice', 'x'), ('bob', 'x')",
            &[],
        )
        .unwrap();
        db.execute(
            "INSERT INTO books (id, title, author, isbn, quantity, available, date_added) VALUES
             (1, 'Dune', 'Frank Herbert', 'i1', 2, 2, '2025-01-01T00:00:00Z'),
             (2, 'Emma', 'Jane Austen', 'i2', 2, 2, '2025-01-01T00:00:00Z'),
             (3, 'Ulysses', 'James Joyce', 'i3', 2, 2, '2025-01-01T00:00:00Z')",
            &[],
        )
        .unwrap();
        db
    }

    fn borrow(db: &Database, book_id: i64, user: &str, day: u32, returned: bool, fine: i64) {
        let borrowed = format!("2025-01-{:02}T10:00:00Z", day);
        let due = format!("2025-01-{:02}T10:00:00Z", day + 14);
        let ret = returned.then(|| format!("2025-01-{:02}T12:00:00Z", day + 1));
        db.execute(
            "INSERT INTO borrowings (book_id, username, borrow_date, due_date, return_date, fine)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            &[&book_id, &user, &borrowed, &due, &ret, &fine],
        )
        .unwrap();
    }

    #[test]
    fn test_history_and_open_loans_newest_first() {
        let db = setup();
        borrow(&db, 1, "alice", 1, true, 0);
        borrow(&db, 2, "alice", 3, false, 0);
        borrow(&db, 3, "bob", 2, false, 0);

        let store = LoanStore::new(&db);
        let history = store.user_history("alice").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].title, "Emma");
        assert!(history[1].return_date.is_some());

        let open = store.open_loans("alice").unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].book_id, 2);

        let all = store.all_loans().unwrap();
        let users: Vec<_> = all.iter().map(|l| l.username.as_str()).collect();
        assert_eq!(users, vec!["alice", "alice", "bob"]);

        assert_eq!(store.open_due_dates().unwrap().len(), 2);
    }

    #[test]
    fn test_popularity_includes_unborrowed_books() {
        let db = setup();
        let store = LoanStore::new(&db);

        let counts = store.popularity().unwrap();
        assert_eq!(counts.iter().map(|c| c.book_id).collect::<Vec<_>>(), vec![1, 2, 3]);

        borrow(&db, 3, "alice", 1, true, 0);
        borrow(&db, 3, "bob", 2, true, 0);
        borrow(&db, 2, "bob", 3, true, 0);
        borrow(&db, 3, "alice", 4, false, 0);

        let counts = store.popularity().unwrap();
        assert_eq!(counts[0], BorrowCount { book_id: 3, borrows: 3 });
        assert_eq!(counts[1], BorrowCount { book_id: 2, borrows: 1 });
        assert_eq!(counts[2], BorrowCount { book_id: 1, borrows: 0 });

        let mut pairs = store.interactions().unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("alice".to_string(), 3),
                ("bob".to_string(), 2),
                ("bob".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_fined_loans_and_stats() {
        let db = setup();
        borrow(&db, 1, "bob", 1, true, 30);
        borrow(&db, 2, "alice", 2, true, 50);
        borrow(&db, 3, "alice", 3, false, 0);

        let store = LoanStore::new(&db);
        let fined = store.fined_loans().unwrap();
        assert_eq!(fined.len(), 2);
        assert_eq!(fined[0].username, "alice");
        assert_eq!(fined[1].fine, 30);

        let now = crate::types::parse_timestamp("2025-02-01T00:00:00Z").unwrap();
        let stats = store.stats(now).unwrap();
        assert_eq!(
            stats,
            LoanStats {
                active: 1,
                overdue: 1,
                total_fines: 80
            }
        );
    }
}
