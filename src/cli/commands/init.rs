//! Init Command
//!
//! Create a library workspace in the current directory.

use crate::cli::Output;
use crate::cli::util::{create_database, is_initialized};
use crate::config::ConfigLoader;
use crate::types::{LibraryError, Result};

pub fn run(name: Option<String>, force: bool) -> Result<()> {
    let root = std::env::current_dir()?;

    if is_initialized(&root) && !force {
        return Err(LibraryError::Config(
            "Already initialized. Use --force to re-run initialization.".to_string(),
        ));
    }

    let library_name = name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Library")
            .to_string()
    });

    let libris_dir = ConfigLoader::init_project(&root, Some(&library_name))?;

    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    // Reload so an existing project config (with --force) decides the db path
    let config = ConfigLoader::load_from(&root)?;
    let db = create_database(&libris_dir, &config.database)?;

    let out = Output::new();
    out.success("Initialized library in .libris/");
    out.field("Library", &config.library.name);
    out.field("Schema", db.schema_version()?);
    println!();
    println!("Next steps:");
    println!("  1. libris user register <name> --admin   (first account may be an admin)");
    println!("  2. libris user login <name>");
    println!("  3. libris book add ... or libris book import books.json");

    Ok(())
}
