//! Command-line interface for sumika.

mod commands;
pub mod helpers;

pub use commands::{is_verbose, run};
