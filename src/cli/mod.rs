pub mod commands;
pub mod ui;
pub mod util;

pub use ui::{Format, Output};
pub use util::{CommandContext, is_initialized, require_initialized};
