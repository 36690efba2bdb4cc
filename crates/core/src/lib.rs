//! buildgraph - Fast, fault-tolerant BUILD descriptor parsing and dependency resolution
//!
//! This crate provides functionality to:
//! - Execute Pants-style BUILD descriptors in a sandbox that tolerates unknown symbols
//! - Collect the targets each descriptor declares and memoize the results per buildpath
//! - Expand dependency graphs breadth-first up to a requested depth
//! - Discover descriptors and top-level projects in a repository
pub mod cache;
pub mod cancel;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod repository;
pub mod resolver;
pub mod sandbox;
pub mod syntax;

// Re-export commonly used types
pub use error::{DescriptorError, Error, Result, ScriptError};

pub use cache::DescriptorCache;
pub use cancel::CancellationToken;
pub use config::Config;
pub use descriptor::{BuildTarget, Descriptor, DescriptorParser, ROOT_TARGET_KIND, split_target};
pub use repository::{ParseSummary, Repository};
pub use resolver::{DependencyGraph, DependencyResolver, UnresolvedReference};
pub use sandbox::{Sandbox, Stub, Value};
