mod output;

pub use output::{Format, Output};
