//! Repository configuration for buildgraph

mod settings;

pub use settings::{CONFIG_FILE_NAME, Config};
