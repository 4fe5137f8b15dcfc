//! Circulation Commands
//!
//! Borrowing, returns, loan listings and fines.

use crate::circulation::LoanPolicy;
use crate::cli::util::CommandContext;
use crate::cli::{Format, Output};
use crate::storage::{CatalogStore, LoanStore};
use crate::types::{
    LibraryError, LoanView, Result, ValidationError, ValidationErrorKind, display_timestamp,
};

pub fn borrow(book_id: i64) -> Result<()> {
    let ctx = CommandContext::load()?;
    let user = ctx.current_user()?;

    let loan = ctx.circulation().borrow(book_id, &user.username)?;
    let book = CatalogStore::new(&ctx.db).require_book(book_id)?;
    Output::new().success(&format!(
        "Borrowed \"{}\" (borrowing {}). Due {}",
        book.title,
        loan.id,
        display_timestamp(loan.due_date)
    ));
    Ok(())
}

/// Return a borrowed book. Overdue returns need `--pay-fine`.
pub fn return_book(borrowing_id: i64, pay_fine: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let user = ctx.current_user()?;
    let circulation = ctx.circulation();

    let loan = LoanStore::new(&ctx.db)
        .get_loan(borrowing_id)?
        .ok_or_else(|| LibraryError::not_found("Borrowing record", borrowing_id))?;
    if loan.username != user.username && !user.is_admin {
        return Err(LibraryError::PermissionDenied(format!(
            "borrowing {} belongs to another user",
            borrowing_id
        )));
    }

    let fine = circulation.preview_fine(borrowing_id)?;
    if fine > 0 && !pay_fine {
        return Err(refuse_unpaid(circulation.policy(), fine));
    }

    // The fine can grow between the preview and the return, so an
    // unconfirmed return is capped at what was shown.
    let returned = if pay_fine {
        circulation.return_book(borrowing_id)
    } else {
        circulation.return_book_within(borrowing_id, fine)
    };
    let receipt = match returned {
        Err(LibraryError::UnconfirmedFine { fine, .. }) => {
            return Err(refuse_unpaid(circulation.policy(), fine));
        }
        other => other?,
    };
    let mut message = "Book returned successfully".to_string();
    if receipt.fine > 0 {
        message.push_str(&format!(
            ". Fine: {}",
            circulation.policy().format_amount(receipt.fine)
        ));
    }
    Output::new().success(&message);
    Ok(())
}

fn refuse_unpaid(policy: &LoanPolicy, fine: i64) -> LibraryError {
    Output::new().warning(&format!(
        "This book is overdue. Fine: {}",
        policy.format_amount(fine)
    ));
    ValidationError::new(
        ValidationErrorKind::Consistency,
        "re-run with --pay-fine to confirm payment and return the book",
    )
    .with_field("pay_fine")
    .into()
}

/// The logged-in user's borrowings.
pub fn loans(open_only: bool, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let user = ctx.current_user()?;
    let circulation = ctx.circulation();
    circulation.refresh_fines()?;

    let loans = if open_only {
        circulation.open_borrowings(&user.username)?
    } else {
        circulation.user_borrowings(&user.username)?
    };

    let out = Output::new();
    if format == Format::Json {
        return out.json(&loans);
    }
    if loans.is_empty() {
        out.info(if open_only {
            "No books on loan"
        } else {
            "No borrowing history"
        });
        return Ok(());
    }

    let policy = circulation.policy();
    out.table(
        &["ID", "TITLE", "AUTHOR", "BORROWED", "DUE", "RETURNED", "FINE"],
        &loans
            .iter()
            .map(|l| loan_row(l, &policy.format_amount(l.fine)))
            .collect::<Vec<_>>(),
    );
    Ok(())
}

/// Books with at least one copy on the shelf.
pub fn available(search: Option<&str>, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let books = CatalogStore::new(&ctx.db).available_books(search)?;
    super::book::print_books(&books, format)
}

/// Every borrowing carrying a fine (admin only).
pub fn fines(refresh: bool, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;
    let circulation = ctx.circulation();

    if refresh {
        let updated = circulation.refresh_fines()?;
        tracing::info!("Recomputed fines on {} open borrowing(s)", updated);
    }
    let report = circulation.fines_report()?;

    let out = Output::new();
    if format == Format::Json {
        return out.json(&report);
    }
    if report.entries.is_empty() {
        out.info("No fines recorded");
        return Ok(());
    }

    let policy = circulation.policy();
    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|l| {
            let mut row = vec![l.username.clone()];
            row.extend(loan_row(l, &policy.format_amount(l.fine)));
            row
        })
        .collect();
    out.table(
        &[
            "USER", "ID", "TITLE", "AUTHOR", "BORROWED", "DUE", "RETURNED", "FINE",
        ],
        &rows,
    );
    out.field("Total", policy.format_amount(report.total));
    Ok(())
}

fn loan_row(loan: &LoanView, fine: &str) -> Vec<String> {
    vec![
        loan.id.to_string(),
        loan.title.clone(),
        loan.author.clone(),
        display_timestamp(loan.borrow_date),
        display_timestamp(loan.due_date),
        loan.return_date
            .map(display_timestamp)
            .unwrap_or_else(|| "on loan".to_string()),
        fine.to_string(),
    ]
}
