//! Config Command
//!
//! Usage:
//!   libris config show [-g] [-f json]
//!   libris config path
//!   libris config init [-g] [--force]

use crate::cli::{Format, Output};
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(global: bool, format: Format) -> Result<()> {
    let root = std::env::current_dir()?;

    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global Config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'libris config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
    } else {
        ConfigLoader::show_config(&root, format == Format::Json)?;
    }
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path(&std::env::current_dir()?);
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let out = Output::new();
    if global {
        let dir = ConfigLoader::init_global(force)?;
        out.success("Initialized global configuration");
        out.field("Directory", dir.display());
        return Ok(());
    }

    let root = std::env::current_dir()?;
    let name = root.file_name().and_then(|n| n.to_str()).unwrap_or("Library");
    let dir = ConfigLoader::init_project(&root, Some(name))?;
    out.success("Initialized project configuration");
    out.field("Directory", dir.display());
    out.field("Config", ConfigLoader::project_config_path(&root).display());
    Ok(())
}
