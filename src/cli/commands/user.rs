//! User Commands
//!
//! Registration, login sessions and the admin user report.

use secrecy::SecretString;

use crate::cli::util::CommandContext;
use crate::cli::{Format, Output};
use crate::types::{Result, ValidationError, ValidationErrorKind, display_timestamp};

/// Password from the flag/env value, or an interactive prompt.
fn resolve_password(password: Option<String>, confirm: bool) -> Result<SecretString> {
    if let Some(p) = password {
        return Ok(SecretString::from(p));
    }

    let term = console::Term::stderr();
    term.write_str("Password: ")?;
    let first = term.read_secure_line()?;
    if confirm {
        term.write_str("Confirm password: ")?;
        let second = term.read_secure_line()?;
        if first != second {
            return Err(ValidationError::new(
                ValidationErrorKind::Consistency,
                "passwords do not match",
            )
            .with_field("password")
            .into());
        }
    }
    Ok(SecretString::from(first))
}

pub fn register(username: &str, password: Option<String>, admin: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let auth = ctx.auth();

    // Only needed to authorize creating an admin
    let caller = if admin { ctx.current_user().ok() } else { None };
    let password = resolve_password(password, true)?;
    let user = auth.register(username, &password, admin, caller.as_ref())?;

    Output::new().success(&format!(
        "Registered {} as {}",
        user.username,
        user.role()
    ));
    Ok(())
}

pub fn login(username: &str, password: Option<String>) -> Result<()> {
    let ctx = CommandContext::load()?;
    let password = resolve_password(password, false)?;
    let session = ctx.auth().login(username, &password)?;
    ctx.save_session(&session.token)?;

    Output::new().success(&format!(
        "Logged in as {} (until {})",
        session.username,
        display_timestamp(session.expires_at)
    ));
    Ok(())
}

pub fn logout() -> Result<()> {
    let ctx = CommandContext::load()?;
    let out = Output::new();
    match ctx.read_session()? {
        Some(token) => {
            ctx.auth().logout(&token)?;
            ctx.clear_session()?;
            out.success("Logged out");
        }
        None => out.info("Not logged in"),
    }
    Ok(())
}

pub fn whoami(format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    let user = ctx.current_user()?;
    match format {
        Format::Json => Output::new().json(&user),
        Format::Text => {
            println!("{} ({})", user.username, user.role());
            Ok(())
        }
    }
}

/// All registered users (admin only)
pub fn list(format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;
    let users = ctx.auth().list_users()?;

    let out = Output::new();
    if format == Format::Json {
        return out.json(&users);
    }

    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| vec![u.username.clone(), u.role().to_string()])
        .collect();
    out.table(&["USERNAME", "ROLE"], &rows);
    Ok(())
}

/// Borrowing history for one user or for everyone (admin only)
pub fn report(username: Option<&str>, format: Format) -> Result<()> {
    let ctx = CommandContext::load()?;
    ctx.require_admin()?;
    let circulation = ctx.circulation();
    circulation.refresh_fines()?;

    let loans = match username {
        Some(name) => circulation.user_borrowings(name)?,
        None => circulation.all_borrowings()?,
    };

    let out = Output::new();
    if format == Format::Json {
        return out.json(&loans);
    }
    if loans.is_empty() {
        out.info("No borrowings recorded");
        return Ok(());
    }

    let policy = circulation.policy();
    let rows: Vec<Vec<String>> = loans
        .iter()
        .map(|l| {
            vec![
                l.username.clone(),
                l.id.to_string(),
                l.title.clone(),
                display_timestamp(l.borrow_date),
                display_timestamp(l.due_date),
                l.return_date
                    .map(display_timestamp)
                    .unwrap_or_else(|| "on loan".to_string()),
                policy.format_amount(l.fine),
            ]
        })
        .collect();
    out.table(
        &["USER", "ID", "TITLE", "BORROWED", "DUE", "RETURNED", "FINE"],
        &rows,
    );
    Ok(())
}
