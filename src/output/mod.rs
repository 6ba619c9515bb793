//! Report output
//!
//! - `text`: console report
//! - `json`: JSON report file

pub mod json;
pub mod text;

pub use json::{build_json_report, write_json_output, JsonReport};
pub use text::print_results;
