use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libris::LibraryError;
use libris::cli::Format;
use libris::cli::commands::{self, book::BookFields};

#[derive(Parser)]
#[command(name = "libris")]
#[command(version, about = "Library management: catalog, loans, fines and recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a library in the current directory
    Init {
        #[arg(long, help = "Library name (defaults to the directory name)")]
        name: Option<String>,
        #[arg(long, short, help = "Re-run initialization on an existing library")]
        force: bool,
    },

    /// Show library status
    Status {
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Accounts and login
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Catalog
    Book {
        #[command(subcommand)]
        action: BookAction,
    },

    /// Borrow a book as the logged-in user
    Borrow {
        #[arg(help = "Book ID")]
        book_id: i64,
    },

    /// Return a borrowed book
    Return {
        #[arg(help = "Borrowing ID (see 'libris loans')")]
        borrowing_id: i64,
        #[arg(long, help = "Confirm payment of an overdue fine")]
        pay_fine: bool,
    },

    /// Show your borrowings
    Loans {
        #[arg(long, help = "Only books still on loan")]
        open: bool,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List books with copies on the shelf
    Available {
        #[arg(long, short, help = "Filter by title or author")]
        search: Option<String>,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Fines report (admin)
    Fines {
        #[arg(long, help = "Recompute fines on open loans first")]
        refresh: bool,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Recommend books based on borrowing history
    Recommend {
        #[arg(long, short = 'n', help = "Number of recommendations")]
        limit: Option<usize>,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an account
    Register {
        username: String,
        #[arg(long, env = "LIBRIS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long, help = "Create an admin (first admin, or by an admin)")]
        admin: bool,
    },
    /// Log in and remember the session
    Login {
        username: String,
        #[arg(long, env = "LIBRIS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// End the current session
    Logout,
    /// Show the logged-in user
    Whoami {
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List users (admin)
    List {
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Borrowing report for one or all users (admin)
    Report {
        username: Option<String>,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Subcommand)]
enum BookAction {
    /// Add a book (admin)
    Add {
        #[command(flatten)]
        fields: BookFields,
    },
    /// Edit a book; unspecified fields are kept (admin)
    Edit {
        id: i64,
        #[command(flatten)]
        fields: BookFields,
    },
    /// Delete a book without active loans (admin)
    Delete { id: i64 },
    /// Show one book
    Show {
        id: i64,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List the catalog
    List {
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Search title, author, genre and ISBN
    Search {
        term: String,
        #[arg(short = 'f', long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Import books from a JSON array (admin)
    Import { path: PathBuf },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mlibris encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<LibraryError>() {
                Some(err) if err.is_domain() => tracing::debug!("Command refused: {:?}", err),
                _ => tracing::error!("Command failed: {:?}", e),
            }
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { name, force } => commands::init::run(name, force)?,
        Commands::Status { format } => commands::status::run(format)?,
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => commands::config::show(global, format)?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => commands::config::init(global, force)?,
        },
        Commands::User { action } => match action {
            UserAction::Register {
                username,
                password,
                admin,
            } => commands::user::register(&username, password, admin)?,
            UserAction::Login { username, password } => {
                commands::user::login(&username, password)?
            }
            UserAction::Logout => commands::user::logout()?,
            UserAction::Whoami { format } => commands::user::whoami(format)?,
            UserAction::List { format } => commands::user::list(format)?,
            UserAction::Report { username, format } => {
                commands::user::report(username.as_deref(), format)?
            }
        },
        Commands::Book { action } => match action {
            BookAction::Add { fields } => commands::book::add(fields)?,
            BookAction::Edit { id, fields } => commands::book::edit(id, fields)?,
            BookAction::Delete { id } => commands::book::delete(id)?,
            BookAction::Show { id, format } => commands::book::show(id, format)?,
            BookAction::List { format } => commands::book::list(format)?,
            BookAction::Search { term, format } => commands::book::search(&term, format)?,
            BookAction::Import { path } => commands::book::import(&path)?,
        },
        Commands::Borrow { book_id } => commands::circulation::borrow(book_id)?,
        Commands::Return {
            borrowing_id,
            pay_fine,
        } => commands::circulation::return_book(borrowing_id, pay_fine)?,
        Commands::Loans { open, format } => commands::circulation::loans(open, format)?,
        Commands::Available { search, format } => {
            commands::circulation::available(search.as_deref(), format)?
        }
        Commands::Fines { refresh, format } => commands::circulation::fines(refresh, format)?,
        Commands::Recommend { limit, format } => commands::recommend::run(limit, format)?,
    }

    Ok(())
}
