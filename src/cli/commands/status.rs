//! Status Command
//!
//! Summarize the catalog, circulation and login state.

use chrono::Utc;

use crate::cli::util::{CommandContext, is_initialized};
use crate::cli::{Format, Output};
use crate::storage::{AccountStore, CatalogStore, LoanStore};
use crate::types::Result;

pub fn run(format: Format) -> Result<()> {
    let root = std::env::current_dir()?;

    if !is_initialized(&root) {
        if format == Format::Json {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            println!("Library Status");
            println!("══════════════════════════════════════");
            println!("Not initialized. Run 'libris init' first.");
        }
        // Informational, not an error
        return Ok(());
    }

    let ctx = CommandContext::load_at(&root)?;
    let catalog = CatalogStore::new(&ctx.db).stats()?;
    let loans = LoanStore::new(&ctx.db).stats(Utc::now())?;
    let users = AccountStore::new(&ctx.db).count_users()?;
    let logged_in = ctx.current_user().ok();
    let policy = ctx.circulation().policy().clone();

    if format == Format::Json {
        let status = serde_json::json!({
            "status": "initialized",
            "library": ctx.config.library.name,
            "schema_version": ctx.db.schema_version()?,
            "catalog": {
                "titles": catalog.titles,
                "copies": catalog.copies,
                "available": catalog.available,
            },
            "loans": {
                "active": loans.active,
                "overdue": loans.overdue,
                "total_fines": loans.total_fines,
            },
            "users": users,
            "logged_in": logged_in,
        });
        return Output::new().json(&status);
    }

    let out = Output::new();
    println!("Library Status");
    println!("══════════════════════════════════════");
    out.field("Library", &ctx.config.library.name);
    out.field(
        "User",
        logged_in
            .map(|u| format!("{} ({})", u.username, u.role()))
            .unwrap_or_else(|| "not logged in".to_string()),
    );

    out.section("Catalog");
    out.field("Titles", catalog.titles);
    out.field("Copies", catalog.copies);
    out.field("On shelf", catalog.available);

    out.section("Circulation");
    out.field("Active", loans.active);
    out.field("Overdue", loans.overdue);
    out.field("Fines", policy.format_amount(loans.total_fines));
    out.field("Members", users);

    Ok(())
}
