//! Listing and display formatting

mod table;
mod time;

pub use table::{config_table, ls_table};
pub use time::{format_created, normalize_created, parse_created};
