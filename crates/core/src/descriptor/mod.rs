//! Descriptor model and the parser that produces it

mod parser;
mod target;

pub use parser::DescriptorParser;
pub use target::{BuildTarget, Descriptor, ROOT_TARGET_KIND, split_target};
