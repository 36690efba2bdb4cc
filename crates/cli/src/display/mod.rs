pub mod formatter;

pub use formatter::{print_json, print_lines};
