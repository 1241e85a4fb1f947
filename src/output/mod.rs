//! Output of a run.
//!
//! - [`csv`] - the utilization snapshot as CSV on stdout
//! - [`terminal`] - headroom overview and run summary with colors

mod csv;
mod terminal;

pub use csv::{escape_csv_field, print_records, write_records};
pub use terminal::{format_field, print_overview, print_summary, tier_counts};
