//! Borrow and return transactions.

use std::sync::Arc;

use rusqlite::params;
use tracing::{debug, info};

use super::{Clock, LoanPolicy, SystemClock};
use crate::storage::loans::{find_loan, set_fine};
use crate::storage::{AccountStore, LoanStore, SharedDatabase};
use crate::types::{
    FinesReport, LibraryError, Loan, LoanView, Result, ReturnReceipt, format_timestamp,
};

/// Circulation desk: moves copies between the shelf and borrowers.
///
/// Every availability change happens inside one IMMEDIATE transaction with a
/// conditional update, so concurrent borrowers can never drive `available`
/// below zero or above `quantity`.
pub struct Circulation {
    db: SharedDatabase,
    policy: LoanPolicy,
    clock: Arc<dyn Clock>,
}

impl Circulation {
    pub fn new(db: SharedDatabase, policy: LoanPolicy) -> Self {
        Self::with_clock(db, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(db: SharedDatabase, policy: LoanPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { db, policy, clock }
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    /// Lend one copy of `book_id` to `username`.
    pub fn borrow(&self, book_id: i64, username: &str) -> Result<Loan> {
        if AccountStore::new(&self.db).get_user(username)?.is_none() {
            return Err(LibraryError::not_found("User", username));
        }

        let now = self.clock.now();
        let due = self.policy.due_date(now);
        let borrowed_at = format_timestamp(now);
        let due_at = format_timestamp(due);

        let loan = self.db.transaction(|conn| {
            let taken = conn.execute(
                "UPDATE books SET available = available - 1 WHERE id = ?1 AND available > 0",
                params![book_id],
            )?;
            if taken == 0 {
                // Missing and fully lent-out books look the same to a borrower
                return Err(LibraryError::BookUnavailable { book_id });
            }

            conn.execute(
                "INSERT INTO borrowings (book_id, username, borrow_date, due_date, fine)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![book_id, username, borrowed_at, due_at],
            )?;
            let id = conn.last_insert_rowid();

            find_loan(conn, id)?.ok_or_else(|| LibraryError::not_found("Borrowing record", id))
        })?;

        info!(
            "{} borrowed book {} (borrowing {}, due {})",
            username, book_id, loan.id, loan.due_date
        );
        Ok(loan)
    }

    /// Close a borrowing, charging any overdue fine and reshelving the copy.
    pub fn return_book(&self, borrowing_id: i64) -> Result<ReturnReceipt> {
        self.close_loan(borrowing_id, None)
    }

    /// Like [`Circulation::return_book`], but refuses with
    /// [`LibraryError::UnconfirmedFine`] when the fine computed at return time
    /// exceeds `accepted_fine`. The loan stays open in that case.
    pub fn return_book_within(
        &self,
        borrowing_id: i64,
        accepted_fine: i64,
    ) -> Result<ReturnReceipt> {
        self.close_loan(borrowing_id, Some(accepted_fine))
    }

    fn close_loan(&self, borrowing_id: i64, accepted_fine: Option<i64>) -> Result<ReturnReceipt> {
        let now = self.clock.now();
        let returned_at = format_timestamp(now);
        let policy = &self.policy;

        let receipt = self.db.transaction(|conn| {
            let loan = find_loan(conn, borrowing_id)?
                .ok_or_else(|| LibraryError::not_found("Borrowing record", borrowing_id))?;
            if !loan.is_open() {
                return Err(LibraryError::AlreadyReturned { borrowing_id });
            }

            let fine = policy.fine(loan.due_date, now);
            if accepted_fine.is_some_and(|accepted| fine > accepted) {
                return Err(LibraryError::UnconfirmedFine { borrowing_id, fine });
            }
            let closed = conn.execute(
                "UPDATE borrowings SET return_date = ?1, fine = ?2
                 WHERE id = ?3 AND return_date IS NULL",
                params![returned_at, fine, borrowing_id],
            )?;
            if closed == 0 {
                return Err(LibraryError::AlreadyReturned { borrowing_id });
            }

            conn.execute(
                "UPDATE books SET available = available + 1
                 WHERE id = ?1 AND available < quantity",
                params![loan.book_id],
            )?;

            Ok(ReturnReceipt {
                borrowing_id,
                book_id: loan.book_id,
                returned_at: now,
                fine,
            })
        })?;

        info!(
            "Borrowing {} returned (book {}, fine {})",
            receipt.borrowing_id, receipt.book_id, receipt.fine
        );
        Ok(receipt)
    }

    /// Fine the borrowing would carry if it were returned now.
    pub fn preview_fine(&self, borrowing_id: i64) -> Result<i64> {
        let loan = LoanStore::new(&self.db)
            .get_loan(borrowing_id)?
            .ok_or_else(|| LibraryError::not_found("Borrowing record", borrowing_id))?;
        if !loan.is_open() {
            return Err(LibraryError::AlreadyReturned { borrowing_id });
        }
        Ok(self.policy.fine(loan.due_date, self.clock.now()))
    }

    /// Recompute the accrued fine of every open borrowing. Returns the number
    /// of rows whose stored fine changed.
    pub fn refresh_fines(&self) -> Result<usize> {
        let now = self.clock.now();
        let fines: Vec<(i64, i64)> = LoanStore::new(&self.db)
            .open_due_dates()?
            .into_iter()
            .map(|(id, due)| (id, self.policy.fine(due, now)))
            .collect();

        let updated = self.db.transaction(|conn| {
            let mut updated = 0;
            for (id, fine) in &fines {
                updated += set_fine(conn, *id, *fine)?;
            }
            Ok(updated)
        })?;

        debug!("Refreshed fines on {} open borrowings", updated);
        Ok(updated)
    }

    pub fn user_borrowings(&self, username: &str) -> Result<Vec<LoanView>> {
        LoanStore::new(&self.db).user_history(username)
    }

    pub fn open_borrowings(&self, username: &str) -> Result<Vec<LoanView>> {
        LoanStore::new(&self.db).open_loans(username)
    }

    pub fn fines_report(&self) -> Result<FinesReport> {
        Ok(FinesReport::from_entries(LoanStore::new(&self.db).fined_loans()?))
    }

    pub fn all_borrowings(&self) -> Result<Vec<LoanView>> {
        LoanStore::new(&self.db).all_loans()
    }
}
